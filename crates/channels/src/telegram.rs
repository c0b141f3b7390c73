//! Telegram channel adapter (stub).
//!
//! Implements the Channel trait for the Telegram Bot API. Controls are
//! rendered as an inline keyboard payload; delivery is logged rather than
//! sent over HTTP. Inbound messages and button presses arrive through an
//! in-process injector.
//!
//! A logged send returns `Ok`, so a payday tick counts it as notified.

use async_trait::async_trait;
use serde_json::json;
use stashflow_config::ChannelConfig;
use stashflow_core::channel::{Channel, ChannelId, ChannelMessage, Controls};
use stashflow_core::error::ChannelError;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Telegram's cap on message text length.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Allowed user IDs. Empty = deny all, ["*"] = allow all.
    pub allowed_users: Vec<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .finish()
    }
}

impl TelegramConfig {
    /// Build from `[channels_config.telegram]`; `None` without a token.
    pub fn from_channel_config(config: &ChannelConfig) -> Option<Self> {
        let bot_token = config.token.clone().filter(|t| !t.is_empty())?;
        Some(Self {
            bot_token,
            allowed_users: config.allowed_users.clone(),
        })
    }
}

/// Inline keyboard markup for a set of controls.
pub fn inline_keyboard(controls: &Controls) -> serde_json::Value {
    let rows: Vec<Vec<serde_json::Value>> = controls
        .iter()
        .map(|row| {
            row.iter()
                .map(|c| json!({ "text": c.label, "callback_data": c.data }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    channel_id: ChannelId,
    /// Sender for injecting inbound messages.
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("telegram".into()),
            inject_tx: tokio::sync::Mutex::new(None),
        }
    }

    /// Inject a message as if it came from Telegram.
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    /// Inject a button press from `sender_id`.
    pub async fn inject_callback(&self, sender_id: &str, data: &str) -> Result<(), ChannelError> {
        self.inject_message(ChannelMessage {
            channel_id: self.channel_id.clone(),
            sender_id: sender_id.into(),
            sender_name: None,
            content: String::new(),
            chat_id: sender_id.into(),
            callback_data: Some(data.into()),
        })
        .await
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!("Telegram channel starting (stub mode)");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        controls: Option<&Controls>,
    ) -> Result<(), ChannelError> {
        if chat_id.trim().is_empty() {
            return Err(ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: "empty chat id".into(),
            });
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: format!("message longer than {MAX_MESSAGE_CHARS} characters"),
            });
        }

        let reply_markup = controls.map(inline_keyboard);
        info!(
            chat_id = %chat_id,
            content_len = content.len(),
            buttons = controls.map(|c| c.iter().map(Vec::len).sum::<usize>()).unwrap_or(0),
            "Telegram send (stub)"
        );
        debug!(reply_markup = ?reply_markup, "Telegram reply markup");
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        if self.config.allowed_users.is_empty() {
            return false;
        }
        if self.config.allowed_users.iter().any(|u| u == "*") {
            return true;
        }
        self.config.allowed_users.iter().any(|u| u == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(!self.config.bot_token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashflow_core::channel::Control;

    fn test_config() -> TelegramConfig {
        TelegramConfig {
            bot_token: "test-token-123".into(),
            allowed_users: vec!["*".into()],
        }
    }

    #[test]
    fn channel_name_and_id() {
        let ch = TelegramChannel::new(test_config());
        assert_eq!(ch.name(), "telegram");
        assert_eq!(ch.id().0, "telegram");
    }

    #[test]
    fn allowlist_specific() {
        let ch = TelegramChannel::new(TelegramConfig {
            bot_token: "tok".into(),
            allowed_users: vec!["100".into(), "200".into()],
        });
        assert!(ch.is_allowed("100"));
        assert!(!ch.is_allowed("300"));
    }

    #[test]
    fn allowlist_empty_denies() {
        let ch = TelegramChannel::new(TelegramConfig {
            bot_token: "tok".into(),
            allowed_users: vec![],
        });
        assert!(!ch.is_allowed("anyone"));
    }

    #[test]
    fn config_requires_token() {
        let mut cfg = ChannelConfig {
            enabled: true,
            allowed_users: vec!["*".into()],
            token: None,
        };
        assert!(TelegramConfig::from_channel_config(&cfg).is_none());
        cfg.token = Some("123:abc".into());
        assert_eq!(
            TelegramConfig::from_channel_config(&cfg).unwrap().bot_token,
            "123:abc"
        );
    }

    #[test]
    fn keyboard_layout() {
        let controls = vec![
            vec![
                Control::new("Apply 500", "payday:apply:1:2:500"),
                Control::new("Other", "payday:custom:1:2"),
            ],
            vec![Control::new("Done", "payday:done:1")],
        ];
        let markup = inline_keyboard(&controls);
        assert_eq!(markup["inline_keyboard"][0][1]["callback_data"], "payday:custom:1:2");
        assert_eq!(markup["inline_keyboard"][1][0]["text"], "Done");
    }

    #[tokio::test]
    async fn injected_callback_arrives() {
        let ch = TelegramChannel::new(test_config());
        let mut rx = ch.start().await.unwrap();
        ch.inject_callback("100", "payday:done:1").await.unwrap();

        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received.callback_data.as_deref(), Some("payday:done:1"));
        assert_eq!(received.chat_id, "100");
    }

    #[tokio::test]
    async fn logged_send_counts_as_delivered() {
        let ch = TelegramChannel::new(test_config());
        let controls = vec![vec![Control::new("Done", "payday:done:1")]];
        assert!(ch.send("100", "Payday!", Some(&controls)).await.is_ok());
    }

    #[tokio::test]
    async fn send_rejects_oversized_text() {
        let ch = TelegramChannel::new(test_config());
        assert!(ch.send("100", "hello", None).await.is_ok());
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(ch.send("100", &long, None).await.is_err());
    }

    #[tokio::test]
    async fn stop_closes_injector() {
        let ch = TelegramChannel::new(test_config());
        let _rx = ch.start().await.unwrap();
        ch.stop().await.unwrap();
        assert!(ch.inject_callback("100", "payday:done:1").await.is_err());
    }
}
