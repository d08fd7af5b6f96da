//! Conversation screen lifecycle.
//!
//! A `ConversationScreen` is the unit of liveness for one open conversation:
//! it owns the [`MessageStore`], binds a handler on the user's
//! [`RealtimeChannel`], and on `unmount()` cancels everything so no late
//! fetch or push can mutate state afterwards.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use farmlink_types::error::SyncError;
use farmlink_types::message::{ConversationKey, Message, MessageDraft};
use farmlink_types::realtime::InboundMessage;
use farmlink_types::session::SessionId;

use crate::api::MarketplaceApi;
use crate::realtime::RealtimeChannel;
use crate::storage::ConversationCache;

use super::store::MessageStore;

pub struct ConversationScreen<A: MarketplaceApi, C: ConversationCache> {
    store: Arc<MessageStore<A, C>>,
    liveness: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<A, C> ConversationScreen<A, C>
where
    A: MarketplaceApi + 'static,
    C: ConversationCache + 'static,
{
    /// Open a conversation: hydrate from the durable cache, then start
    /// listening on `channel`.
    ///
    /// The initial REST fetch is left to the caller (`refresh()`), so its
    /// error can be surfaced.
    pub async fn mount(
        key: ConversationKey,
        api: Arc<A>,
        cache: Arc<C>,
        channel: &RealtimeChannel,
    ) -> Result<Self, SyncError> {
        if channel.user_id() != key.self_id {
            return Err(SyncError::ValidationFailed(format!(
                "realtime channel belongs to user {}, conversation to user {}",
                channel.user_id(),
                key.self_id
            )));
        }

        let liveness = CancellationToken::new();
        let store = Arc::new(MessageStore::new(key, api, cache).with_liveness(liveness.clone()));
        store.hydrate().await?;

        let rx = channel.bind()?;
        let listener = tokio::spawn(listen(store.clone(), rx, liveness.clone()));
        info!(conversation = %key, "conversation screen mounted");

        Ok(Self {
            store,
            liveness,
            listener: Mutex::new(Some(listener)),
        })
    }

    pub fn key(&self) -> &ConversationKey {
        self.store.key()
    }

    pub fn store(&self) -> &MessageStore<A, C> {
        &self.store
    }

    pub fn is_mounted(&self) -> bool {
        !self.liveness.is_cancelled()
    }

    /// Full REST reconciliation.
    pub async fn refresh(&self) -> Result<Vec<Message>, SyncError> {
        self.store.load().await
    }

    pub async fn send(&self, draft: MessageDraft, session: SessionId) -> Result<Message, SyncError> {
        self.store.send(draft, session).await
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.store.messages().await
    }

    /// Cancel the screen's liveness and unbind its realtime handler.
    /// In-flight operations complete with `Cancelled`. Idempotent.
    pub async fn unmount(&self) {
        self.liveness.cancel();

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(listener) = listener {
            if let Err(err) = listener.await {
                warn!(conversation = %self.key(), error = %err, "conversation listener task failed");
            }
            info!(conversation = %self.key(), "conversation screen unmounted");
        }
    }
}

impl<A: MarketplaceApi, C: ConversationCache> Drop for ConversationScreen<A, C> {
    fn drop(&mut self) {
        self.liveness.cancel();
    }
}

async fn listen<A, C>(
    store: Arc<MessageStore<A, C>>,
    mut rx: broadcast::Receiver<InboundMessage>,
    liveness: CancellationToken,
) where
    A: MarketplaceApi,
    C: ConversationCache,
{
    loop {
        let received = tokio::select! {
            _ = liveness.cancelled() => break,
            received = rx.recv() => received,
        };

        match received {
            Ok(InboundMessage { message, notice }) => {
                let message_id = message.id;
                match store.ingest(message).await {
                    Ok(true) => {
                        if let Some(notice) = notice {
                            store.record_notice(notice);
                        }
                        debug!(message_id, "realtime message merged, reconciling");
                    }
                    Ok(false) => continue,
                    Err(SyncError::Cancelled) => break,
                    Err(err) => {
                        warn!(message_id, error = %err, "failed to merge realtime message");
                        continue;
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "realtime handler lagged, reconciling");
            }
            Err(RecvError::Closed) => {
                debug!("realtime channel closed");
                break;
            }
        }

        // The push is only a hint; the REST fetch is authoritative.
        match store.load().await {
            Ok(_) => {}
            Err(SyncError::Cancelled) => break,
            Err(err) => warn!(error = %err, "reconciliation fetch failed"),
        }
    }
}
