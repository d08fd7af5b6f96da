//! Realtime push envelopes.

use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::error::SyncError;
use crate::message::{Message, WireMessage};

/// Prefix of every per-user chat topic.
pub const CHAT_TOPIC_PREFIX: &str = "chat.";

/// Topic carrying new-message events for `user_id`.
///
/// Derived from the raw numeric id, so it is guessable: receiving an event
/// on this topic proves nothing about who it was meant for.
pub fn chat_topic(user_id: UserId) -> String {
    format!("{CHAT_TOPIC_PREFIX}{user_id}")
}

/// Payload of a realtime new-message event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub message: WireMessage,
    pub receiver_id: UserId,
}

/// An accepted inbound message, classified, as handed to bound handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub message: Message,
    /// Decode problem found while classifying the content, if any.
    pub notice: Option<SyncError>,
}
