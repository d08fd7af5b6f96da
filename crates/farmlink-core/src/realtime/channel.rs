//! Per-user realtime chat channel.
//!
//! `RealtimeChannel` subscribes to `chat.<userId>` on a [`RealtimeTransport`]
//! and runs a pump task that re-checks each event's receiver against the
//! local user, classifies the message content, and broadcasts accepted
//! messages to every bound handler. Built on `tokio::sync::broadcast`, so a
//! handler that falls behind sees `Lagged` and should reconcile over REST.

use std::sync::Mutex;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use farmlink_types::UserId;
use farmlink_types::error::SyncError;
use farmlink_types::message::Message;
use farmlink_types::realtime::{InboundMessage, chat_topic};

use super::transport::{EventStream, RealtimeTransport};

/// Buffered messages per bound handler before it starts lagging.
const HANDLER_BUFFER: usize = 256;

/// A live subscription to one user's chat topic.
///
/// Authorization is advisory: the topic name is derived from the numeric
/// user id, so the pump drops events whose receiver is not the local user
/// but cannot stop a third party from subscribing to the same topic.
pub struct RealtimeChannel {
    user_id: UserId,
    topic: String,
    sender: Mutex<Option<broadcast::Sender<InboundMessage>>>,
    cancel: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeChannel {
    /// Subscribe to `user_id`'s chat topic and start the pump task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<T: RealtimeTransport + ?Sized>(transport: &T, user_id: UserId) -> Self {
        let topic = chat_topic(user_id);
        let stream = transport.subscribe(&topic);
        let (sender, _) = broadcast::channel(HANDLER_BUFFER);
        let cancel = CancellationToken::new();

        let pump = tokio::spawn(run_pump(
            stream,
            user_id,
            topic.clone(),
            sender.clone(),
            cancel.clone(),
        ));

        info!(%topic, "subscribed to realtime channel");

        Self {
            user_id,
            topic,
            sender: Mutex::new(Some(sender)),
            cancel,
            pump: Mutex::new(Some(pump)),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the pump is still running.
    ///
    /// Turns false after `unsubscribe()` or when the transport fails or
    /// closes. There is no automatic resubscription.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Bind a new handler. It receives every message accepted from now on.
    ///
    /// Returns `Cancelled` once the channel has been unsubscribed.
    pub fn bind(&self) -> Result<broadcast::Receiver<InboundMessage>, SyncError> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(SyncError::Cancelled)
    }

    /// Number of currently bound handlers.
    pub fn handler_count(&self) -> usize {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    /// Stop the pump, drop the transport subscription, and unbind every
    /// handler (their receivers observe `Closed`). Idempotent.
    pub async fn unsubscribe(&self) {
        self.cancel.cancel();

        let pump = self
            .pump
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(pump) = pump {
            if let Err(err) = pump.await {
                warn!(topic = %self.topic, error = %err, "realtime pump task failed");
            }
        }

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if sender.is_some() {
            info!(topic = %self.topic, "unsubscribed from realtime channel");
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

async fn run_pump(
    mut stream: EventStream,
    user_id: UserId,
    topic: String,
    sender: broadcast::Sender<InboundMessage>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                if event.receiver_id != user_id || event.message.receiver_id != user_id {
                    warn!(
                        %topic,
                        envelope_receiver = event.receiver_id,
                        message_receiver = event.message.receiver_id,
                        "dropping realtime event addressed to another user"
                    );
                    continue;
                }

                let (message, notice) = Message::from_wire(event.message);
                if let Some(notice) = &notice {
                    debug!(message_id = message.id, error = %notice, "realtime message content degraded to text");
                }
                debug!(%topic, message_id = message.id, "accepted realtime message");

                // No bound handlers is fine: the next REST fetch picks it up.
                let _ = sender.send(InboundMessage { message, notice });
            }
            Some(Err(err)) => {
                warn!(%topic, error = %err, "realtime transport failed, ending subscription");
                break;
            }
            None => {
                debug!(%topic, "realtime stream closed");
                break;
            }
        }
    }

    cancel.cancel();
}
