//! CLI channel: payday notifications on the terminal.
//!
//! Writes messages and their controls to stdout. Lines read from stdin that
//! look like a callback payload (`payday:...`) are delivered as button
//! presses; anything else is plain text (for example a custom amount).

use async_trait::async_trait;
use stashflow_core::channel::{Channel, ChannelId, ChannelMessage, Controls};
use stashflow_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::callback::PaydayAction;

/// Terminal channel for the local user.
pub struct CliChannel {
    id: ChannelId,
    /// External id that terminal input is attributed to.
    sender_id: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::as_user("local_user")
    }

    /// Attribute terminal input to the registered user `external_id`.
    pub fn as_user(external_id: impl Into<String>) -> Self {
        Self {
            id: ChannelId("cli".into()),
            sender_id: external_id.into(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-text rendering of a message and its controls.
pub fn render(content: &str, controls: Option<&Controls>) -> String {
    let mut out = content.to_string();
    if let Some(controls) = controls {
        for row in controls {
            let line: Vec<String> = row
                .iter()
                .map(|c| format!("[{}] {}", c.label, c.data))
                .collect();
            out.push('\n');
            out.push_str(&line.join("   "));
        }
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();
        let sender_id = self.sender_id.clone();

        tokio::spawn(async move {
            let reader = BufReader::new(io::stdin());
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
                            break;
                        }

                        let (content, callback_data) = if PaydayAction::matches(&line) {
                            (String::new(), Some(line))
                        } else {
                            (line, None)
                        };

                        let msg = ChannelMessage {
                            channel_id: channel_id.clone(),
                            sender_id: sender_id.clone(),
                            sender_name: Some("User".into()),
                            content,
                            chat_id: sender_id.clone(),
                            callback_data,
                        };

                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        controls: Option<&Controls>,
    ) -> Result<(), ChannelError> {
        println!("── to {chat_id} ──\n{}", render(content, controls));
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // local user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashflow_core::channel::Control;

    #[test]
    fn cli_channel_properties() {
        let ch = CliChannel::new();
        assert_eq!(ch.name(), "cli");
        assert!(ch.is_allowed("anyone"));
    }

    #[test]
    fn render_lists_controls_per_row() {
        let controls = vec![
            vec![Control::new("Apply 500", "payday:apply:1:2:500")],
            vec![Control::new("Done", "payday:done:1")],
        ];
        let text = render("Payday!", Some(&controls));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Payday!");
        assert_eq!(lines[1], "[Apply 500] payday:apply:1:2:500");
        assert_eq!(lines[2], "[Done] payday:done:1");
    }
}
