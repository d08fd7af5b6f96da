//! Chat message types for buyer/seller product conversations.
//!
//! The server transmits message content as an untagged string that may be
//! plain text, an uploaded image filename, or text carrying an embedded
//! product reference token. [`MessageContent::classify`] turns that string
//! into a tagged variant once, at ingestion; nothing downstream re-parses it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use std::fmt;

use crate::error::SyncError;
use crate::session::SessionId;
use crate::{MessageId, ProductId, UserId};

/// Opening delimiter of an embedded product reference, e.g. `[[product:42]]`.
pub const PRODUCT_REF_OPEN: &str = "[[product:";

/// Closing delimiter of an embedded product reference.
pub const PRODUCT_REF_CLOSE: &str = "]]";

/// File extensions the server produces for uploaded chat images.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Classified message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    /// Filename of an uploaded image, resolved through the image cache.
    Image { file_name: String },
    /// Text that links to another product listing.
    ProductReference { product_id: ProductId, text: String },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }

    /// Classify a raw content string from the wire.
    ///
    /// Returns `DecodeFailed` when a product reference token is present but
    /// malformed (unterminated or with a non-numeric id).
    pub fn classify(raw: &str) -> Result<Self, SyncError> {
        if let Some(start) = raw.find(PRODUCT_REF_OPEN) {
            let after = &raw[start + PRODUCT_REF_OPEN.len()..];
            let end = after.find(PRODUCT_REF_CLOSE).ok_or_else(|| {
                SyncError::DecodeFailed(format!("unterminated product reference in {raw:?}"))
            })?;
            let id_part = after[..end].trim();
            let product_id: ProductId = id_part.parse().map_err(|_| {
                SyncError::DecodeFailed(format!("invalid product id '{id_part}' in reference"))
            })?;

            let before = raw[..start].trim();
            let rest = after[end + PRODUCT_REF_CLOSE.len()..].trim();
            let text = match (before.is_empty(), rest.is_empty()) {
                (true, _) => rest.to_string(),
                (false, true) => before.to_string(),
                (false, false) => format!("{before} {rest}"),
            };

            return Ok(MessageContent::ProductReference { product_id, text });
        }

        let trimmed = raw.trim();
        if is_image_file_name(trimmed) {
            return Ok(MessageContent::Image {
                file_name: trimmed.to_string(),
            });
        }

        Ok(MessageContent::text(raw))
    }

    /// Render back to the string form the server stores.
    pub fn to_wire(&self) -> String {
        match self {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Image { file_name } => file_name.clone(),
            MessageContent::ProductReference { product_id, text } if text.is_empty() => {
                format!("{PRODUCT_REF_OPEN}{product_id}{PRODUCT_REF_CLOSE}")
            }
            MessageContent::ProductReference { product_id, text } => {
                format!("{text} {PRODUCT_REF_OPEN}{product_id}{PRODUCT_REF_CLOSE}")
            }
        }
    }

    /// Short human-readable preview for lists and logs.
    pub fn preview(&self) -> String {
        match self {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Image { file_name } => format!("[image] {file_name}"),
            MessageContent::ProductReference { product_id, text } => {
                format!("[product #{product_id}] {text}")
            }
        }
    }
}

fn is_image_file_name(s: &str) -> bool {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// A message exactly as the REST API and realtime events deliver it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: MessageId,
    pub session: SessionId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub product_id: ProductId,
    #[serde(alias = "message")]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Servers send this as either a boolean or a 0/1 integer.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub read: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// A chat message with classified content.
///
/// Unique by `id`. Conversations are ordered by `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session: SessionId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub product_id: ProductId,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub read: bool,
}

impl Message {
    /// Convert a wire message, classifying its content.
    ///
    /// A malformed product reference never drops the message: the content
    /// degrades to plain text and the decode error is returned alongside so
    /// the caller can show a dismissible notice.
    pub fn from_wire(wire: WireMessage) -> (Self, Option<SyncError>) {
        let (content, notice) = match MessageContent::classify(&wire.content) {
            Ok(content) => (content, None),
            Err(err) => (MessageContent::text(wire.content.clone()), Some(err)),
        };

        let message = Self {
            id: wire.id,
            session: wire.session,
            sender_id: wire.sender_id,
            receiver_id: wire.receiver_id,
            product_id: wire.product_id,
            content,
            created_at: wire.created_at,
            updated_at: wire.updated_at.unwrap_or(wire.created_at),
            read: wire.read,
        };
        (message, notice)
    }
}

/// Identifies one conversation from the local user's point of view.
///
/// Used as the durable cache key: one message array per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub product_id: ProductId,
    pub self_id: UserId,
    pub peer_id: UserId,
}

impl ConversationKey {
    pub fn new(product_id: ProductId, self_id: UserId, peer_id: UserId) -> Self {
        Self {
            product_id,
            self_id,
            peer_id,
        }
    }

    /// Stable string form used by durable storage.
    pub fn storage_key(&self) -> String {
        format!(
            "product:{}:self:{}:peer:{}",
            self.product_id, self.self_id, self.peer_id
        )
    }

    /// Whether `message` belongs to this conversation (either direction).
    pub fn contains(&self, message: &Message) -> bool {
        message.product_id == self.product_id
            && ((message.sender_id == self.self_id && message.receiver_id == self.peer_id)
                || (message.sender_id == self.peer_id && message.receiver_id == self.self_id))
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Content the local user is about to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageDraft {
    Text(String),
    Image {
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

impl MessageDraft {
    pub fn is_empty(&self) -> bool {
        match self {
            MessageDraft::Text(text) => text.trim().is_empty(),
            MessageDraft::Image { bytes, .. } => bytes.is_empty(),
        }
    }
}

/// A fully addressed outbound message (the multipart POST body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub session: SessionId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub product_id: ProductId,
    pub draft: MessageDraft,
}
