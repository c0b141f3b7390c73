//! `stashflow user`: Register or show users.

use super::{resolve_user, runtime};
use clap::Subcommand;
use stashflow_core::model::User;
use stashflow_security::LocalTokenIssuer;

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user by chat / external id
    Add {
        external_id: String,
        /// Display name (defaults to the external id)
        #[arg(long)]
        username: Option<String>,
    },
    /// Show a registered user
    Show { external_id: String },
}

pub async fn run(cmd: UserCommand) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime().await?;
    match cmd {
        UserCommand::Add {
            external_id,
            username,
        } => {
            let username = username.unwrap_or_else(|| external_id.clone());
            let user = rt.service.register_user(&external_id, &username).await?;
            println!("✅ User #{} registered as {} ({})", user.id, user.username, user.external_id);
        }
        UserCommand::Show { external_id } => {
            let user = resolve_user(&rt.service, &external_id).await?;
            println!("#{}  {}  external id {}  since {}", user.id, user.username, user.external_id, user.created_at.format("%Y-%m-%d"));
            let issuer = LocalTokenIssuer::from_config(&rt.config.identity);
            println!("   token: {}", token_status(issuer.as_ref(), &user));
        }
    }
    Ok(())
}

fn token_status(issuer: Option<&LocalTokenIssuer>, user: &User) -> &'static str {
    match issuer {
        Some(issuer) if issuer.verify(&user.external_id, &user.auth_token) => "signed",
        Some(_) => "not signed by the configured secret",
        None => "unchecked (no token secret configured)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stashflow_core::model::UserId;

    fn user(token: &str) -> User {
        User {
            id: UserId(1),
            external_id: "100".into(),
            username: "alice".into(),
            auth_token: token.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn token_status_checks_the_signature() {
        let issuer = LocalTokenIssuer::new("hunter2");
        let signed = issuer.issue("100").unwrap();

        assert_eq!(token_status(Some(&issuer), &user(&signed)), "signed");
        assert_eq!(
            token_status(Some(&issuer), &user("placeholder_100_abc")),
            "not signed by the configured secret"
        );
        assert!(token_status(None, &user(&signed)).starts_with("unchecked"));
    }
}
