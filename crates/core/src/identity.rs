//! Identity provider trait: issue-or-lookup of an opaque per-user token.
//!
//! Registration is not allowed to block onboarding: callers fall back to a
//! locally generated placeholder when the provider fails (see
//! `stashflow_security::identity::resolve_token`).

use async_trait::async_trait;

use crate::error::IdentityError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name for logs (e.g., "local", "remote").
    fn name(&self) -> &str;

    /// Return the token for `external_id`, registering the user if needed.
    async fn register(&self, external_id: &str, username: &str) -> Result<String, IdentityError>;
}
