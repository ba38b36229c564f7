//! Admin area commands.

use clap::Subcommand;
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::{DocumentId, DocumentStatus};

use super::orders::print_orders;
use super::{parse_email, password};

#[derive(Subcommand)]
pub enum AdminAction {
    /// Sign in to the admin area
    SignIn {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "SWIFTDROP_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Leave the admin area and sign out
    SignOut,
    /// Recent orders across all customers
    Orders,
    /// Rider documents waiting for review
    Documents,
    /// Approve or reject a rider document
    Review {
        id: DocumentId,
        /// approved or rejected
        status: DocumentStatus,
        #[arg(long)]
        notes: Option<String>,
    },
}

pub async fn run(state: &AppState, action: &AdminAction) -> Result<(), ClientError> {
    let admin = state.admin();
    match action {
        AdminAction::SignIn { email, password: raw } => {
            let session = admin.sign_in(&parse_email(email)?, &password(raw)).await?;
            state.toasts().success(format!(
                "Admin session started for {}",
                session.user.email.as_deref().unwrap_or("admin")
            ));
        }
        AdminAction::SignOut => {
            admin.sign_out().await?;
            state.toasts().info("Signed out of the admin area");
        }
        AdminAction::Orders => print_orders(&admin.recent_orders().await?),
        AdminAction::Documents => {
            let documents = admin.pending_documents().await?;
            if documents.is_empty() {
                println!("Nothing to review");
            }
            for doc in documents {
                println!(
                    "{}  {}  {:<22}  {}",
                    doc.id,
                    doc.rider_id,
                    doc.kind.to_string(),
                    doc.file_url
                );
            }
        }
        AdminAction::Review { id, status, notes } => {
            let doc = admin
                .review_document(*id, *status, notes.as_deref())
                .await?;
            state
                .toasts()
                .success(format!("Document {}: {}", doc.id, doc.status.badge().label));
        }
    }
    Ok(())
}
