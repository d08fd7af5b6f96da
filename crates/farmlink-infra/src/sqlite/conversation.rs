//! SQLite conversation cache implementation.
//!
//! Implements `ConversationCache` from `farmlink-core`. Each conversation is
//! one row holding the full message array as JSON text, replaced wholesale
//! on every store.

use chrono::Utc;
use sqlx::Row;

use farmlink_core::storage::ConversationCache;
use farmlink_types::error::RepositoryError;
use farmlink_types::message::{ConversationKey, Message};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationCache`.
pub struct SqliteConversationCache {
    pool: DatabasePool,
}

impl SqliteConversationCache {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl ConversationCache for SqliteConversationCache {
    async fn load(&self, key: &ConversationKey) -> Result<Vec<Message>, RepositoryError> {
        let row = sqlx::query("SELECT messages FROM conversation_cache WHERE key = ?")
            .bind(key.storage_key())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };

        let json: String = row
            .try_get("messages")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        serde_json::from_str(&json)
            .map_err(|e| RepositoryError::Serialization(format!("invalid cached messages: {e}")))
    }

    async fn store(&self, key: &ConversationKey, messages: &[Message]) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(messages)
            .map_err(|e| RepositoryError::Serialization(format!("failed to serialize messages: {e}")))?;

        sqlx::query(
            r#"INSERT INTO conversation_cache (key, product_id, self_id, peer_id, messages, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET messages = excluded.messages, updated_at = excluded.updated_at"#,
        )
        .bind(key.storage_key())
        .bind(key.product_id)
        .bind(key.self_id)
        .bind(key.peer_id)
        .bind(&json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tracing::debug!(conversation = %key, count = messages.len(), "stored conversation cache");
        Ok(())
    }

    async fn clear(&self, key: &ConversationKey) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM conversation_cache WHERE key = ?")
            .bind(key.storage_key())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}
