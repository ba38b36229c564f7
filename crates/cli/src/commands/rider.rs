//! Rider commands: payout account, verification documents and jobs.

use clap::Subcommand;
use swiftdrop_client::backend::AuthSession;
use swiftdrop_client::db::{DeliveryRepository, RiderRepository};
use swiftdrop_client::models::{AccountNumber, Delivery, RiderBankDetails};
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::{DeliveryId, DeliveryStatus, DocumentKind, Role};

use super::{session, truncate};

#[derive(Subcommand)]
pub enum RiderAction {
    /// Show the payout account, or set it when all fields are given
    Bank {
        #[arg(long, requires_all = ["account", "name"])]
        bank: Option<String>,
        /// 10-digit NUBAN account number
        #[arg(long, requires_all = ["bank", "name"])]
        account: Option<String>,
        /// Name on the account
        #[arg(long, requires_all = ["bank", "account"])]
        name: Option<String>,
    },
    /// List verification documents, or submit one with --kind and --url
    Documents {
        #[arg(long, requires = "url")]
        kind: Option<DocumentKind>,
        /// Where the uploaded file lives
        #[arg(long, requires = "kind")]
        url: Option<String>,
    },
    /// Open jobs, or your own with --mine
    Jobs {
        #[arg(long)]
        mine: bool,
    },
    /// Take an open job
    Take { id: DeliveryId },
    /// Update a job you hold
    Status { id: DeliveryId, status: DeliveryStatus },
}

pub async fn run(state: &AppState, action: &RiderAction) -> Result<(), ClientError> {
    let session = rider_session(state).await?;
    let backend = state.backend_for(&session);
    let riders = RiderRepository::new(&backend);
    let deliveries = DeliveryRepository::new(&backend);

    match action {
        RiderAction::Bank {
            bank: Some(bank),
            account: Some(account),
            name: Some(name),
        } => {
            let account_number = AccountNumber::parse(account)
                .map_err(|e| ClientError::BadRequest(e.to_string()))?;
            let saved = riders
                .save_bank_details(&RiderBankDetails {
                    rider_id: session.user.id,
                    bank_name: bank.trim().to_string(),
                    account_number,
                    account_name: name.trim().to_string(),
                })
                .await?;
            state.toasts().success(format!(
                "Payouts will go to {} {}",
                saved.bank_name,
                saved.account_number.masked()
            ));
        }
        RiderAction::Bank { .. } => match riders.bank_details(session.user.id).await? {
            Some(details) => println!(
                "{}  {}  {}",
                details.bank_name,
                details.account_number.masked(),
                details.account_name
            ),
            None => println!("No payout account yet"),
        },
        RiderAction::Documents {
            kind: Some(kind),
            url: Some(url),
        } => {
            riders.submit_document(session.user.id, *kind, url).await?;
            state.toasts().success("Document submitted for review");
        }
        RiderAction::Documents { .. } => {
            let documents = riders.documents(session.user.id).await?;
            if documents.is_empty() {
                println!("No documents submitted");
            }
            for doc in documents {
                println!(
                    "{:<22}  {:<14}  {}",
                    doc.kind.to_string(),
                    doc.status.badge().to_string(),
                    doc.notes.as_deref().unwrap_or("")
                );
            }
        }
        RiderAction::Jobs { mine } => {
            let jobs = if *mine {
                deliveries.list_for_rider(session.user.id).await?
            } else {
                deliveries.list_open().await?
            };
            print_jobs(&jobs);
        }
        RiderAction::Take { id } => {
            let job = deliveries.assign(*id, session.user.id).await?;
            state.toasts().success(format!(
                "Job taken: pick up at {}",
                job.pickup_address
            ));
        }
        RiderAction::Status { id, status } => {
            let job = deliveries.update_status(*id, *status).await?;
            state
                .toasts()
                .success(format!("Job {} is now {}", job.id, job.status.badge().label));
        }
    }
    Ok(())
}

async fn rider_session(state: &AppState) -> Result<AuthSession, ClientError> {
    let session = session(state).await?;
    if session.role() != Some(Role::Rider) {
        return Err(ClientError::Unauthorized(
            "Only riders can use rider commands".to_string(),
        ));
    }
    Ok(session)
}

fn print_jobs(jobs: &[Delivery]) {
    if jobs.is_empty() {
        println!("No jobs");
        return;
    }
    for job in jobs {
        println!(
            "{}  {:<16}  {:>10}  {} → {}",
            job.id,
            job.status.badge().to_string(),
            job.fee.to_string(),
            truncate(&job.pickup_address, 24),
            truncate(&job.dropoff_address, 24)
        );
    }
}
