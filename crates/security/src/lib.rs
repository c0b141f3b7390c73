//! Security module for Stashflow: audit trail, sender allowlists, and identity tokens.
//!
//! Provides:
//! - **Audit logging**: Best-effort record of financial events, written by a
//!   background task with bounded retry
//! - **Allowlists**: Sender validation per channel
//! - **Identity**: HMAC-signed per-user tokens with a placeholder fallback

pub mod allowlist;
pub mod audit;
pub mod identity;

pub use allowlist::{AllowlistPolicy, SenderCheckResult};
pub use audit::{
    AuditEntry, AuditError, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink,
};
pub use identity::{LocalTokenIssuer, resolve_token};
