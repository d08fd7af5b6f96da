//! In-memory fakes of the core ports, shared by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, mpsc};

use farmlink_types::approval::{ApprovalRequest, ApprovalRequestId};
use farmlink_types::error::{RepositoryError, SyncError};
use farmlink_types::message::{ConversationKey, Message, MessageDraft, OutgoingMessage, WireMessage};
use farmlink_types::offer::NewOffer;
use farmlink_types::realtime::RealtimeEvent;
use farmlink_types::session::SessionId;
use farmlink_types::{MessageId, ProductId, UserId};

use crate::api::MarketplaceApi;
use crate::realtime::transport::{EventStream, RealtimeTransport};
use crate::storage::ConversationCache;

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

pub fn wire_message(
    id: MessageId,
    sender_id: UserId,
    receiver_id: UserId,
    product_id: ProductId,
    content: &str,
    secs: i64,
) -> WireMessage {
    WireMessage {
        id,
        session: SessionId(1),
        sender_id,
        receiver_id,
        product_id,
        content: content.to_string(),
        created_at: ts(secs),
        updated_at: None,
        read: false,
    }
}

pub fn message(
    id: MessageId,
    sender_id: UserId,
    receiver_id: UserId,
    product_id: ProductId,
    content: &str,
    secs: i64,
) -> Message {
    Message::from_wire(wire_message(id, sender_id, receiver_id, product_id, content, secs)).0
}

#[derive(Default)]
pub struct FakeState {
    pub sessions: HashMap<(ProductId, UserId, UserId), SessionId>,
    pub max_session: i64,
    pub messages: Vec<WireMessage>,
    pub next_message_id: MessageId,
    pub offers: Vec<NewOffer>,
    pub requests: Vec<ApprovalRequest>,
    pub stock: HashMap<ProductId, u32>,
    pub approved: Vec<ApprovalRequestId>,
    pub declined: Vec<ApprovalRequestId>,
    /// Returned (once) by the next call of any kind.
    pub fail_next: Option<SyncError>,
    /// Returned (once) by the next offer POST.
    pub fail_offer: Option<SyncError>,
    pub calls: Vec<&'static str>,
    /// When set, `fetch_messages` waits for a notification before answering.
    pub fetch_gate: Option<Arc<Notify>>,
}

#[derive(Default)]
pub struct FakeMarketplace {
    pub state: Mutex<FakeState>,
}

impl FakeMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(f: impl FnOnce(&mut FakeState)) -> Self {
        let fake = Self::new();
        f(&mut fake.state.lock().unwrap());
        fake
    }

    pub fn fail_next(&self, err: SyncError) {
        self.state.lock().unwrap().fail_next = Some(err);
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == name)
            .count()
    }

    /// Store a message server-side, as if another client had posted it.
    pub fn seed_message(&self, wire: WireMessage) {
        let mut state = self.state.lock().unwrap();
        state.next_message_id = state.next_message_id.max(wire.id);
        state
            .sessions
            .insert((wire.product_id, wire.sender_id, wire.receiver_id), wire.session);
        state
            .sessions
            .insert((wire.product_id, wire.receiver_id, wire.sender_id), wire.session);
        state.max_session = state.max_session.max(wire.session.0);
        state.messages.push(wire);
    }

    fn enter(&self, call: &'static str) -> Result<std::sync::MutexGuard<'_, FakeState>, SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

impl MarketplaceApi for FakeMarketplace {
    async fn find_session(
        &self,
        product_id: ProductId,
        sender_id: UserId,
        receiver_id: UserId,
    ) -> Result<Option<SessionId>, SyncError> {
        let state = self.enter("find_session")?;
        Ok(state.sessions.get(&(product_id, sender_id, receiver_id)).copied())
    }

    async fn max_session(&self) -> Result<SessionId, SyncError> {
        let state = self.enter("max_session")?;
        Ok(SessionId(state.max_session))
    }

    async fn fetch_messages(
        &self,
        product_id: ProductId,
        sender_id: UserId,
        receiver_id: UserId,
    ) -> Result<Vec<WireMessage>, SyncError> {
        let gate = self.state.lock().unwrap().fetch_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let state = self.enter("fetch_messages")?;
        Ok(state
            .messages
            .iter()
            .filter(|m| {
                m.product_id == product_id
                    && ((m.sender_id == sender_id && m.receiver_id == receiver_id)
                        || (m.sender_id == receiver_id && m.receiver_id == sender_id))
            })
            .cloned()
            .collect())
    }

    async fn post_message(&self, message: &OutgoingMessage) -> Result<WireMessage, SyncError> {
        let mut state = self.enter("post_message")?;
        state.next_message_id += 1;
        let id = state.next_message_id;
        let content = match &message.draft {
            MessageDraft::Text(text) => text.clone(),
            MessageDraft::Image { file_name, .. } => file_name.clone(),
        };
        let wire = WireMessage {
            id,
            session: message.session,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            product_id: message.product_id,
            content,
            created_at: ts(1_000 + id),
            updated_at: None,
            read: false,
        };
        state.sessions.insert(
            (message.product_id, message.sender_id, message.receiver_id),
            message.session,
        );
        state.sessions.insert(
            (message.product_id, message.receiver_id, message.sender_id),
            message.session,
        );
        state.max_session = state.max_session.max(message.session.0);
        state.messages.push(wire.clone());
        Ok(wire)
    }

    async fn post_offer(&self, offer: &NewOffer) -> Result<(), SyncError> {
        let mut state = self.enter("post_offer")?;
        if let Some(err) = state.fail_offer.take() {
            return Err(err);
        }
        state.offers.push(offer.clone());
        Ok(())
    }

    async fn approval_requests(&self, user_id: UserId) -> Result<Vec<ApprovalRequest>, SyncError> {
        let state = self.enter("approval_requests")?;
        Ok(state
            .requests
            .iter()
            .filter(|r| r.seller_id == user_id)
            .cloned()
            .collect())
    }

    async fn approve_request(&self, request_id: ApprovalRequestId) -> Result<(), SyncError> {
        let mut state = self.enter("approve_request")?;
        let index = state
            .requests
            .iter()
            .position(|r| r.id == request_id)
            .ok_or(SyncError::ServerRejected {
                status: 404,
                message: "request not found".to_string(),
            })?;
        let request = state.requests[index].clone();
        let available = state.stock.get(&request.product_id).copied().unwrap_or(0);
        if request.requested_quantity > available {
            return Err(SyncError::ServerRejected {
                status: 400,
                message: format!(
                    "insufficient quantity: requested {}, available {available}",
                    request.requested_quantity
                ),
            });
        }
        state
            .stock
            .insert(request.product_id, available - request.requested_quantity);
        state.requests.remove(index);
        state.approved.push(request_id);
        Ok(())
    }

    async fn decline_request(&self, request_id: ApprovalRequestId) -> Result<(), SyncError> {
        let mut state = self.enter("decline_request")?;
        state.requests.retain(|r| r.id != request_id);
        state.declined.push(request_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryConversationCache {
    entries: Mutex<HashMap<String, Vec<Message>>>,
    pub writes: AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl MemoryConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: &ConversationKey) -> Vec<Message> {
        self.entries
            .lock()
            .unwrap()
            .get(&key.storage_key())
            .cloned()
            .unwrap_or_default()
    }
}

impl ConversationCache for MemoryConversationCache {
    async fn load(&self, key: &ConversationKey) -> Result<Vec<Message>, RepositoryError> {
        Ok(self.get(key))
    }

    async fn store(&self, key: &ConversationKey, messages: &[Message]) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk I/O error".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.storage_key(), messages.to_vec());
        Ok(())
    }

    async fn clear(&self, key: &ConversationKey) -> Result<(), RepositoryError> {
        self.entries.lock().unwrap().remove(&key.storage_key());
        Ok(())
    }
}

type EventSender = mpsc::UnboundedSender<Result<RealtimeEvent, SyncError>>;

/// Realtime transport whose events are pushed by the test.
#[derive(Default)]
pub struct FakeTransport {
    subscribers: Mutex<Vec<(String, EventSender)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every live subscriber of `topic`.
    pub fn push(&self, topic: &str, event: Result<RealtimeEvent, SyncError>) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|(_, tx)| !tx.is_closed());
        for (t, tx) in subscribers.iter() {
            if t == topic {
                let _ = tx.send(event.clone());
            }
        }
    }

    pub fn live_subscriptions(&self, topic: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, tx)| t == topic && !tx.is_closed())
            .count()
    }
}

impl RealtimeTransport for FakeTransport {
    fn subscribe(&self, topic: &str) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push((topic.to_string(), tx));
        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }
}
