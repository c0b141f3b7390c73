//! Chat channel implementations for Stashflow.
//!
//! Each channel delivers payday notifications with their controls and
//! relays button presses back as callback data.
//!
//! Available channels:
//! - **Telegram**: Telegram Bot API (stub transport)
//! - **CLI**: stdout/stdin for the local user
//! - **Memory**: records sends, for tests and dry runs

pub mod callback;
pub mod cli;
pub mod memory;
pub mod telegram;

pub use callback::PaydayAction;
pub use cli::CliChannel;
pub use memory::{MemoryChannel, SentMessage};
pub use telegram::{TelegramChannel, TelegramConfig};

use stashflow_config::AppConfig;
use stashflow_core::channel::Channel;
use std::sync::Arc;

/// Pick the delivery channel from configuration.
///
/// Telegram when it is enabled and has a token, otherwise the terminal.
pub fn from_config(config: &AppConfig) -> Arc<dyn Channel> {
    if let Some(telegram) = config
        .channel("telegram")
        .and_then(TelegramConfig::from_channel_config)
    {
        tracing::info!("Using telegram channel");
        return Arc::new(TelegramChannel::new(telegram));
    }
    tracing::info!("No chat channel configured, printing notifications to the terminal");
    Arc::new(CliChannel::new())
}
