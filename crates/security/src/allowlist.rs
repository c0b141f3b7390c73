//! Allowlist policy: which chat senders may drive the payday dialog.

use stashflow_config::ChannelConfig;

/// Result of checking a sender against the allowlist.
#[derive(Debug, Clone, PartialEq)]
pub enum SenderCheckResult {
    /// Sender is allowed
    Allowed,
    /// Sender is denied
    Denied { sender_id: String, reason: String },
}

impl SenderCheckResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SenderCheckResult::Allowed)
    }
}

/// Unified allowlist policy enforcement.
pub struct AllowlistPolicy;

impl AllowlistPolicy {
    /// Check if a sender is allowed for a given channel configuration.
    ///
    /// Rules:
    /// - If `allowed_users` is empty → deny all (secure by default)
    /// - If `allowed_users` contains `"*"` → allow all
    /// - Otherwise, sender must be in the list
    pub fn check_sender(config: &ChannelConfig, sender_id: &str) -> SenderCheckResult {
        if !config.enabled {
            return SenderCheckResult::Denied {
                sender_id: sender_id.into(),
                reason: "Channel is disabled".into(),
            };
        }

        Self::check_list(&config.allowed_users, sender_id)
    }

    /// Same rules against a bare list.
    pub fn check_list(allowed_users: &[String], sender_id: &str) -> SenderCheckResult {
        if allowed_users.is_empty() {
            return SenderCheckResult::Denied {
                sender_id: sender_id.into(),
                reason: "No users configured (deny by default)".into(),
            };
        }

        if allowed_users.iter().any(|u| u == "*" || u == sender_id) {
            SenderCheckResult::Allowed
        } else {
            SenderCheckResult::Denied {
                sender_id: sender_id.into(),
                reason: format!(
                    "Sender '{}' not in allowlist ({} users configured)",
                    sender_id,
                    allowed_users.len()
                ),
            }
        }
    }
}
