//! Error types for the Stashflow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Stashflow operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Identity errors ---
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    // --- Caller errors ---
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} {id} does not belong to this user")]
    OwnershipMismatch { kind: &'static str, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn not_owned(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Error::OwnershipMismatch {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Unauthorized sender: {sender_id} on {channel}")]
    Unauthorized { channel: String, sender_id: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid callback payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity service unavailable: {0}")]
    Unavailable(String),

    #[error("Registration rejected for {external_id}: {reason}")]
    Rejected { external_id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_kind_and_id() {
        let err = Error::not_found("goal", 42);
        assert_eq!(err.to_string(), "goal not found: 42");
    }

    #[test]
    fn store_error_converts_into_top_level() {
        let err: Error = StoreError::Conflict("monthly_contributions".into()).into();
        assert!(matches!(err, Error::Store(StoreError::Conflict(_))));
        assert!(err.to_string().contains("monthly_contributions"));
    }

    #[test]
    fn channel_error_displays_correctly() {
        let err = Error::Channel(ChannelError::DeliveryFailed {
            channel: "telegram".into(),
            reason: "chat not found".into(),
        });
        assert!(err.to_string().contains("telegram"));
        assert!(err.to_string().contains("chat not found"));
    }
}
