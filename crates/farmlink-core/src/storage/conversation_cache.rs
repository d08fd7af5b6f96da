//! Conversation cache trait.
//!
//! Durable write-through mirror of each conversation's message list, read
//! on cold start before any network round trip completes. Implementations
//! live in farmlink-infra.

use farmlink_types::error::RepositoryError;
use farmlink_types::message::{ConversationKey, Message};

/// Trait for per-conversation durable message storage.
///
/// Stores one ordered message array per [`ConversationKey`]. Uses RPITIT
/// (native async fn in traits, Rust 2024 edition).
pub trait ConversationCache: Send + Sync {
    /// Load the cached messages. Returns an empty list for an unknown key.
    fn load(
        &self,
        key: &ConversationKey,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Replace the cached messages for a key (upsert).
    fn store(
        &self,
        key: &ConversationKey,
        messages: &[Message],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Drop the cached messages for a key. No-op if the key does not exist.
    fn clear(
        &self,
        key: &ConversationKey,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
