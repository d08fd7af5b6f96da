//! Per-conversation message store.
//!
//! `MessageStore` owns the authoritative in-memory message list for one
//! conversation for the lifetime of a screen. Three independent paths feed
//! it -- REST fetches (`load`), realtime events (`ingest`) and outbound acks
//! (`send`) -- and all of them go through the same id-keyed merge, so they
//! may complete in any interleaving. Every merge that changes the list is
//! written through to the [`ConversationCache`] before it returns.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use farmlink_types::error::SyncError;
use farmlink_types::message::{ConversationKey, Message, MessageDraft, OutgoingMessage, WireMessage};
use farmlink_types::session::SessionId;

use crate::api::MarketplaceApi;
use crate::storage::ConversationCache;

use super::merge::merge_messages;

/// Deduplicated, persisted message list for one conversation.
pub struct MessageStore<A: MarketplaceApi, C: ConversationCache> {
    key: ConversationKey,
    api: Arc<A>,
    cache: Arc<C>,
    messages: Mutex<Vec<Message>>,
    /// Dismissible problems (decode, durable write) awaiting display.
    notices: std::sync::Mutex<Vec<SyncError>>,
    /// Cancelled when the owning screen goes away; merges stop afterwards.
    liveness: CancellationToken,
}

impl<A: MarketplaceApi, C: ConversationCache> MessageStore<A, C> {
    pub fn new(key: ConversationKey, api: Arc<A>, cache: Arc<C>) -> Self {
        Self {
            key,
            api,
            cache,
            messages: Mutex::new(Vec::new()),
            notices: std::sync::Mutex::new(Vec::new()),
            liveness: CancellationToken::new(),
        }
    }

    /// Tie this store to an externally owned liveness token.
    pub fn with_liveness(mut self, liveness: CancellationToken) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn is_live(&self) -> bool {
        !self.liveness.is_cancelled()
    }

    /// Snapshot of the current list, ordered by `(created_at, id)`.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    pub(crate) fn record_notice(&self, notice: SyncError) {
        self.lock_notices().push(notice);
    }

    /// Drain the pending dismissible notices.
    pub fn take_notices(&self) -> Vec<SyncError> {
        std::mem::take(&mut *self.lock_notices())
    }

    /// Seed the in-memory list from the durable cache (cold start).
    ///
    /// Does not touch the network and does not write back. An unreadable
    /// cache is recorded as a notice and leaves the list as it was.
    #[instrument(skip(self), fields(conversation = %self.key))]
    pub async fn hydrate(&self) -> Result<Vec<Message>, SyncError> {
        self.ensure_live()?;
        let cached = match self.cache.load(&self.key).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(error = %err, "failed to read conversation cache");
                self.lock_notices().push(err.into());
                return Ok(self.messages().await);
            }
        };

        let mut messages = self.messages.lock().await;
        self.ensure_live()?;
        let key = self.key;
        *messages = merge_messages(&messages, cached.into_iter().filter(|m| key.contains(m)));
        debug!(count = messages.len(), "hydrated conversation from cache");
        Ok(messages.clone())
    }

    /// Fetch the full history over REST and merge it.
    #[instrument(skip(self), fields(conversation = %self.key))]
    pub async fn load(&self) -> Result<Vec<Message>, SyncError> {
        self.ensure_live()?;
        let wire = self
            .api
            .fetch_messages(self.key.product_id, self.key.self_id, self.key.peer_id)
            .await?;

        let incoming: Vec<Message> = wire.into_iter().map(|w| self.decode(w)).collect();
        self.merge(incoming).await
    }

    /// Merge one message from a realtime event or an ack.
    ///
    /// Returns `Ok(false)` without touching the list when the message
    /// belongs to a different conversation.
    pub async fn ingest(&self, message: Message) -> Result<bool, SyncError> {
        if !self.key.contains(&message) {
            return Ok(false);
        }
        self.merge(vec![message]).await?;
        Ok(true)
    }

    /// Classify and merge a raw wire message.
    pub async fn ingest_wire(&self, wire: WireMessage) -> Result<bool, SyncError> {
        let message = self.decode(wire);
        self.ingest(message).await
    }

    /// Post a message to the peer and merge the server's ack.
    #[instrument(skip(self, draft), fields(conversation = %self.key, %session))]
    pub async fn send(&self, draft: MessageDraft, session: SessionId) -> Result<Message, SyncError> {
        self.ensure_live()?;
        if draft.is_empty() {
            return Err(SyncError::ValidationFailed("message is empty".to_string()));
        }

        let outgoing = OutgoingMessage {
            session,
            sender_id: self.key.self_id,
            receiver_id: self.key.peer_id,
            product_id: self.key.product_id,
            draft,
        };
        let ack = self.api.post_message(&outgoing).await?;
        let message = self.decode(ack);
        debug!(message_id = message.id, "message acknowledged");

        self.merge(vec![message.clone()]).await?;
        Ok(message)
    }

    /// Drop the conversation from memory and from the durable cache.
    #[instrument(skip(self), fields(conversation = %self.key))]
    pub async fn forget(&self) -> Result<(), SyncError> {
        let mut messages = self.messages.lock().await;
        self.cache.clear(&self.key).await?;
        messages.clear();
        debug!("conversation cache cleared");
        Ok(())
    }

    async fn merge(&self, incoming: Vec<Message>) -> Result<Vec<Message>, SyncError> {
        let mut messages = self.messages.lock().await;
        // Checked under the lock so nothing lands after the screen is gone.
        self.ensure_live()?;

        let merged = merge_messages(&messages, incoming);
        if merged == *messages {
            return Ok(merged);
        }
        *messages = merged;

        if let Err(err) = self.cache.store(&self.key, &messages).await {
            warn!(conversation = %self.key, error = %err, "failed to write conversation cache");
            self.lock_notices().push(err.into());
        }
        Ok(messages.clone())
    }

    fn decode(&self, wire: WireMessage) -> Message {
        let (message, notice) = Message::from_wire(wire);
        if let Some(notice) = notice {
            debug!(message_id = message.id, error = %notice, "message content degraded to text");
            self.lock_notices().push(notice);
        }
        message
    }

    fn ensure_live(&self) -> Result<(), SyncError> {
        if self.liveness.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn lock_notices(&self) -> std::sync::MutexGuard<'_, Vec<SyncError>> {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
