//! Inbound message events delivered by the chat gateway.

use serde::{Deserialize, Serialize};

/// An inbound chat message, as delivered by the gateway.
///
/// The gateway connection itself (sharding, reconnection, rate limiting) is
/// outside this core; the dispatcher only ever sees these events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEvent {
    /// Platform identifier of the message, used for scheduled deletion.
    pub id: String,
    /// Channel the message was posted in.
    pub channel: String,
    /// Stable identifier of the author (the permission actor).
    pub author: String,
    /// Raw message text.
    pub content: String,
}

impl MessageEvent {
    /// Build a message event.
    pub fn new(
        id: impl Into<String>,
        channel: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel: channel.into(),
            author: author.into(),
            content: content.into(),
        }
    }
}
