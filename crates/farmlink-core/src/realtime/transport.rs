//! RealtimeTransport trait definition.
//!
//! Returns a boxed stream (not RPITIT) so subscriptions can be moved into a
//! spawned pump task and dropped to unsubscribe.

use std::pin::Pin;

use futures_util::Stream;

use farmlink_types::error::SyncError;
use farmlink_types::realtime::RealtimeEvent;

/// Stream of decoded realtime events for one topic.
///
/// Ends when the transport closes; an `Err` item reports a transport
/// failure and is the last item. Dropping the stream unsubscribes.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RealtimeEvent, SyncError>> + Send + 'static>>;

/// Publish/subscribe transport (SSE, websocket, hosted push service).
///
/// Delivery is at most once with no ordering guarantee across events.
/// Reconnection, if any, is the transport's business; the application
/// layer tolerates gaps through REST reconciliation.
pub trait RealtimeTransport: Send + Sync {
    /// Subscribe to `topic`.
    fn subscribe(&self, topic: &str) -> EventStream;
}
