//! Student delivery plans.

use clap::Args;
use swiftdrop_client::payments::PaymentProvider;
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::StudentPlan;

use super::checkout::{Purpose, remember};
use super::session;

#[derive(Args)]
pub struct SubscribeArgs {
    /// monthly or semester
    plan: Option<StudentPlan>,

    /// paystack or squad
    #[arg(long, default_value = "paystack")]
    provider: PaymentProvider,
}

pub async fn run(state: &AppState, args: &SubscribeArgs) -> Result<(), ClientError> {
    let session = session(state).await?;
    let service = state.subscriptions();

    let Some(plan) = args.plan else {
        let now = chrono::Utc::now();
        match service.current(&session).await? {
            Some(current) => println!(
                "{} plan, {} days left (until {})",
                current.plan,
                current.days_remaining(now),
                current.expires_at.format("%d %b %Y")
            ),
            None => println!("No active student plan"),
        }
        for plan in [StudentPlan::Monthly, StudentPlan::Semester] {
            println!(
                "  {:<9} {:>10}  {} days",
                plan.to_string(),
                service.price(plan).to_string(),
                plan.duration_days()
            );
        }
        return Ok(());
    };

    let checkout = service.begin(args.provider, plan, &session)?;
    remember(state, &checkout, Purpose::Subscription { plan })?;
    Ok(())
}
