//! Account commands.

use clap::Subcommand;
use swiftdrop_client::backend::SignUpOutcome;
use swiftdrop_client::db::{ProfileRepository, SubscriptionRepository};
use swiftdrop_client::error::{clear_sentry_user, set_sentry_user};
use swiftdrop_client::models::ProfileUpdate;
use swiftdrop_client::{AppState, ClientError};
use swiftdrop_core::{PhoneNumber, Role};

use super::{parse_email, password, session};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in with email and password
    SignIn {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "SWIFTDROP_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    SignUp {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "SWIFTDROP_PASSWORD", hide_env_values = true)]
        password: String,
        /// Full name shown to vendors and riders
        #[arg(short, long)]
        name: String,
        /// customer, vendor or rider
        #[arg(short, long, default_value = "customer")]
        role: Role,
    },
    /// Sign out and forget the session
    SignOut,
    /// Show the signed-in user
    Whoami,
    /// Update your name or phone number
    Profile {
        #[arg(short, long)]
        name: Option<String>,
        /// Nigerian number, e.g. 0803 123 4567
        #[arg(short, long)]
        phone: Option<String>,
    },
}

pub async fn run(state: &AppState, action: &AuthAction) -> Result<(), ClientError> {
    match action {
        AuthAction::SignIn { email, password: raw } => {
            let email = parse_email(email)?;
            let session = state.auth().sign_in(&email, &password(raw)).await?;
            set_sentry_user(&session.user.id, session.user.email.as_deref());
            state.toasts().success(format!(
                "Signed in as {}",
                session.user.full_name.as_deref().unwrap_or(email.as_str())
            ));
        }
        AuthAction::SignUp {
            email,
            password: raw,
            name,
            role,
        } => {
            if *role == Role::Admin {
                return Err(ClientError::BadRequest(
                    "Admin accounts cannot be created here".to_string(),
                ));
            }
            let email = parse_email(email)?;
            match state
                .auth()
                .sign_up(&email, &password(raw), name, *role)
                .await?
            {
                SignUpOutcome::SignedIn(session) => {
                    set_sentry_user(&session.user.id, session.user.email.as_deref());
                    state.toasts().success(format!("Welcome to SwiftDrop, {name}"));
                }
                SignUpOutcome::ConfirmationRequired(_) => {
                    state
                        .toasts()
                        .info(format!("Check {email} to confirm your account, then sign in"));
                }
            }
        }
        AuthAction::SignOut => {
            state.flags().clear_admin_session();
            state.auth().sign_out().await?;
            clear_sentry_user();
            state.toasts().info("Signed out");
        }
        AuthAction::Whoami => {
            let session = session(state).await?;
            let backend = state.backend_for(&session);
            let profile = ProfileRepository::new(&backend).get(session.user.id).await?;

            let name = profile
                .as_ref()
                .map(|p| p.display_name().to_string())
                .or_else(|| session.user.full_name.clone())
                .unwrap_or_else(|| "(no name)".to_string());
            println!("{name}");
            println!("  id:    {}", session.user.id);
            if let Some(email) = &session.user.email {
                println!("  email: {email}");
            }
            if let Some(role) = session.role() {
                println!("  role:  {role}");
            }
            if let Some(phone) = profile.as_ref().and_then(|p| p.phone.as_deref()) {
                println!("  phone: {phone}");
            }
            if state.flags().is_admin_session() {
                println!("  admin session active");
            }

            let now = chrono::Utc::now();
            if let Some(plan) = SubscriptionRepository::new(&backend)
                .active_for(session.user.id, now)
                .await?
            {
                println!(
                    "  student plan: {} ({} days left)",
                    plan.plan,
                    plan.days_remaining(now)
                );
            }
        }
        AuthAction::Profile { name, phone } => {
            let session = session(state).await?;
            let update = ProfileUpdate {
                full_name: name.as_deref().map(str::trim).map(String::from),
                phone: phone
                    .as_deref()
                    .map(PhoneNumber::parse)
                    .transpose()
                    .map_err(|e| ClientError::BadRequest(e.to_string()))?,
                avatar_url: None,
            };
            let backend = state.backend_for(&session);
            let profile = ProfileRepository::new(&backend)
                .update(session.user.id, &update)
                .await?;
            state
                .toasts()
                .success(format!("Profile updated for {}", profile.display_name()));
        }
    }
    Ok(())
}
