//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects Stashflow to a messaging platform (Telegram, the local
//! terminal, an in-memory sink for tests). The scheduler pushes payday
//! notifications through it; inbound button presses come back as
//! `ChannelMessage`s carrying callback data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tappable button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub label: String,
    /// Opaque payload echoed back when the button is pressed.
    pub data: String,
}

impl Control {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Rows of buttons, rendered top to bottom.
pub type Controls = Vec<Vec<Control>>;

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The text content (empty for button presses)
    #[serde(default)]
    pub content: String,

    /// The chat/DM identifier within the channel
    pub chat_id: String,

    /// Payload of a pressed control, if this is a button press
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Send a message, optionally with controls, to a specific chat.
    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        controls: Option<&Controls>,
    ) -> std::result::Result<(), ChannelError>;

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_press_roundtrips_through_json() {
        let msg = ChannelMessage {
            channel_id: ChannelId("telegram".into()),
            sender_id: "12345".into(),
            sender_name: Some("Alice".into()),
            content: String::new(),
            chat_id: "12345".into(),
            callback_data: Some("payday:done:3".into()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChannelMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.callback_data.as_deref(), Some("payday:done:3"));
    }

    #[test]
    fn control_constructor() {
        let c = Control::new("Done", "payday:done:1");
        assert_eq!(c.label, "Done");
        assert_eq!(c.data, "payday:done:1");
    }
}
