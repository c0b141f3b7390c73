//! Identity tokens: HMAC-signed per-user tokens and the onboarding fallback.
//!
//! A token is `hex(HMAC-SHA256(secret, external_id))`, so the same user
//! always gets the same token and it can be verified without storage.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use stashflow_config::IdentityConfig;
use stashflow_core::error::IdentityError;
use stashflow_core::identity::IdentityProvider;

type HmacSha256 = Hmac<Sha256>;

/// Issues tokens locally from a shared secret.
pub struct LocalTokenIssuer {
    secret: Vec<u8>,
}

impl std::fmt::Debug for LocalTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTokenIssuer")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl LocalTokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// `None` when no secret is configured.
    pub fn from_config(config: &IdentityConfig) -> Option<Self> {
        config
            .token_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(Self::new)
    }

    fn mac(&self) -> Result<HmacSha256, IdentityError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| IdentityError::Unavailable(format!("bad token secret: {e}")))
    }

    /// Compute the token for an external id.
    pub fn issue(&self, external_id: &str) -> Result<String, IdentityError> {
        let mut mac = self.mac()?;
        mac.update(external_id.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of a token against an external id.
    pub fn verify(&self, external_id: &str, token: &str) -> bool {
        let Ok(raw) = hex::decode(token) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(external_id.as_bytes());
        mac.verify_slice(&raw).is_ok()
    }
}

#[async_trait]
impl IdentityProvider for LocalTokenIssuer {
    fn name(&self) -> &str {
        "local"
    }

    async fn register(&self, external_id: &str, _username: &str) -> Result<String, IdentityError> {
        if external_id.trim().is_empty() {
            return Err(IdentityError::Rejected {
                external_id: external_id.into(),
                reason: "empty external id".into(),
            });
        }
        self.issue(external_id)
    }
}

/// Get a token for a new user, never failing.
///
/// Provider errors (or no provider at all) yield a locally generated
/// placeholder so onboarding can continue.
pub async fn resolve_token(
    provider: Option<&dyn IdentityProvider>,
    external_id: &str,
    username: &str,
) -> String {
    if let Some(provider) = provider {
        match provider.register(external_id, username).await {
            Ok(token) => return token,
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    external_id,
                    "Identity registration failed, using placeholder token: {e}"
                );
            }
        }
    }
    placeholder_token(external_id)
}

fn placeholder_token(external_id: &str) -> String {
    format!("placeholder_{external_id}_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DownProvider;

    #[async_trait]
    impl IdentityProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        async fn register(&self, _: &str, _: &str) -> Result<String, IdentityError> {
            Err(IdentityError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn tokens_are_stable_and_verifiable() {
        let issuer = LocalTokenIssuer::new("s3cret");
        let a = issuer.issue("100").unwrap();
        assert_eq!(a, issuer.issue("100").unwrap());
        assert_eq!(a.len(), 64);
        assert!(issuer.verify("100", &a));
        assert!(!issuer.verify("101", &a));
        assert!(!issuer.verify("100", "not-hex"));

        let other = LocalTokenIssuer::new("different");
        assert!(!other.verify("100", &a));
    }

    #[test]
    fn from_config_requires_secret() {
        assert!(LocalTokenIssuer::from_config(&IdentityConfig::default()).is_none());
        let config = IdentityConfig {
            token_secret: Some("abc".into()),
        };
        assert!(LocalTokenIssuer::from_config(&config).is_some());
    }

    #[test]
    fn debug_hides_secret() {
        let issuer = LocalTokenIssuer::new("s3cret");
        assert!(!format!("{issuer:?}").contains("s3cret"));
    }

    #[tokio::test]
    async fn resolve_uses_provider_when_available() {
        let issuer = LocalTokenIssuer::new("s3cret");
        let token = resolve_token(Some(&issuer), "100", "alice").await;
        assert!(issuer.verify("100", &token));
    }

    #[tokio::test]
    async fn resolve_falls_back_to_placeholder() {
        let token = resolve_token(Some(&DownProvider), "100", "alice").await;
        assert!(token.starts_with("placeholder_100_"));

        let token = resolve_token(None, "200", "bob").await;
        assert!(token.starts_with("placeholder_200_"));
    }
}
