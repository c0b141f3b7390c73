//! In-memory channel: records every send.
//!
//! Used by tests and `stashflow tick --dry-run` style runs. Can be told to
//! fail the next N sends to exercise delivery-failure paths.

use async_trait::async_trait;
use stashflow_core::channel::{Channel, ChannelId, ChannelMessage, Controls};
use stashflow_core::error::ChannelError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// One recorded outbound message.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: String,
    pub content: String,
    pub controls: Option<Controls>,
}

pub struct MemoryChannel {
    id: ChannelId,
    sent: Mutex<Vec<SentMessage>>,
    fail_next: AtomicUsize,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("memory".into()),
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
            inject_tx: tokio::sync::Mutex::new(None),
        }
    }

    /// Make the next `n` sends fail with `DeliveryFailed`.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Inject an inbound message.
    pub async fn inject(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into())),
            None => Err(ChannelError::ConnectionLost("Channel not started".into())),
        }
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn name(&self) -> &str {
        "memory"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        controls: Option<&Controls>,
    ) -> Result<(), ChannelError> {
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ChannelError::DeliveryFailed {
                channel: "memory".into(),
                reason: "simulated failure".into(),
            });
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                chat_id: chat_id.into(),
                content: content.into(),
                controls: controls.cloned(),
            });
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sends() {
        let ch = MemoryChannel::new();
        ch.send("100", "hello", None).await.unwrap();
        let sent = ch.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, "100");
        assert!(sent[0].controls.is_none());
    }

    #[tokio::test]
    async fn simulated_failures_count_down() {
        let ch = MemoryChannel::new();
        ch.fail_next(2);
        assert!(ch.send("1", "a", None).await.is_err());
        assert!(ch.send("1", "b", None).await.is_err());
        assert!(ch.send("1", "c", None).await.is_ok());
        assert_eq!(ch.sent_count(), 1);
    }
}
