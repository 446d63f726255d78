//! The chat gateway seam.
//!
//! A [`Gateway`] delivers inbound [`MessageEvent`]s and accepts outbound
//! [`Alert`]s. The host never talks to a platform API directly; swapping the
//! gateway swaps the platform. Two implementations ship here: an in-process
//! channel pair for embedding and tests, and a line-oriented console gateway
//! for running the host interactively.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use sable_types::{Alert, AlertKind, MessageEvent, SableError};

/// Inbound/outbound message transport for one chat platform.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// The next inbound message, or `None` once the gateway has shut down.
    async fn next_message(&self) -> Option<MessageEvent>;

    /// Deliver an alert to a channel. Returns the platform id of the sent
    /// message, so the host can schedule its deletion.
    async fn send_alert(&self, channel: &str, alert: &Alert) -> Result<String, SableError>;

    /// Delete a previously seen message.
    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<(), SableError>;
}

/// What an [`InProcessGateway`] did on behalf of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    Sent {
        channel: String,
        message_id: String,
        alert: Alert,
    },
    Deleted {
        channel: String,
        message_id: String,
    },
}

/// A gateway backed by in-process channels, for embedding the host and for
/// integration tests. Dropping the inbound sender shuts the host down.
pub struct InProcessGateway {
    inbound: Mutex<mpsc::UnboundedReceiver<MessageEvent>>,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    next_id: AtomicU64,
}

impl InProcessGateway {
    /// Build a gateway plus the ends the embedding side keeps: a sender for
    /// inbound messages and a receiver observing everything sent or deleted.
    pub fn channel() -> (
        Self,
        mpsc::UnboundedSender<MessageEvent>,
        mpsc::UnboundedReceiver<OutboundEvent>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let gateway = Self {
            inbound: Mutex::new(inbound_rx),
            outbound: outbound_tx,
            next_id: AtomicU64::new(1),
        };
        (gateway, inbound_tx, outbound_rx)
    }
}

#[async_trait]
impl Gateway for InProcessGateway {
    async fn next_message(&self) -> Option<MessageEvent> {
        self.inbound.lock().await.recv().await
    }

    async fn send_alert(&self, channel: &str, alert: &Alert) -> Result<String, SableError> {
        let message_id = format!("out-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.outbound
            .send(OutboundEvent::Sent {
                channel: channel.to_string(),
                message_id: message_id.clone(),
                alert: alert.clone(),
            })
            .map_err(|_| SableError::Gateway("outbound channel closed".into()))?;
        Ok(message_id)
    }

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<(), SableError> {
        self.outbound
            .send(OutboundEvent::Deleted {
                channel: channel.to_string(),
                message_id: message_id.to_string(),
            })
            .map_err(|_| SableError::Gateway("outbound channel closed".into()))
    }
}

/// A gateway reading commands line-by-line from stdin and rendering alerts to
/// stdout. Every line is a message from the `console` author in the `console`
/// channel; deletion is a no-op since printed output cannot be recalled.
pub struct ConsoleGateway {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    next_id: AtomicU64,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for ConsoleGateway {
    async fn next_message(&self) -> Option<MessageEvent> {
        let mut lines = self.lines.lock().await;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let id = format!("console-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
                    return Some(MessageEvent::new(id, "console", "console", line));
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "failed reading from stdin");
                    return None;
                }
            }
        }
    }

    async fn send_alert(&self, _channel: &str, alert: &Alert) -> Result<String, SableError> {
        let tag = match alert.kind {
            AlertKind::Info => "INFO",
            AlertKind::Success => "OK",
            AlertKind::Error => "ERROR",
        };
        let mut rendered = format!("[{tag}] {}: {}", alert.title, alert.description);
        for field in &alert.fields {
            rendered.push_str(&format!("\n  {}: {}", field.name, field.value));
        }
        println!("{rendered}");
        Ok(format!("console-out-{}", self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn delete_message(&self, _channel: &str, _message_id: &str) -> Result<(), SableError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_process_gateway_round_trips() {
        let (gateway, inbound, mut outbound) = InProcessGateway::channel();

        inbound
            .send(MessageEvent::new("m1", "general", "alice", "!help"))
            .unwrap();
        let message = gateway.next_message().await.unwrap();
        assert_eq!(message.content, "!help");

        let alert = Alert::info("Help", "topics");
        let id = gateway.send_alert("general", &alert).await.unwrap();
        gateway.delete_message("general", &id).await.unwrap();

        match outbound.recv().await.unwrap() {
            OutboundEvent::Sent { channel, message_id, alert } => {
                assert_eq!(channel, "general");
                assert_eq!(message_id, id);
                assert_eq!(alert.title, "Help");
            }
            other => panic!("expected Sent, got {other:?}"),
        }
        assert_eq!(
            outbound.recv().await.unwrap(),
            OutboundEvent::Deleted {
                channel: "general".into(),
                message_id: id,
            }
        );
    }

    #[tokio::test]
    async fn closed_inbound_ends_the_gateway() {
        let (gateway, inbound, _outbound) = InProcessGateway::channel();
        drop(inbound);
        assert!(gateway.next_message().await.is_none());
    }
}
