//! Conversation merge.
//!
//! Overlays incoming messages onto an existing list keyed by message id,
//! then materializes the result ordered by `(created_at, id)`. The order is a
//! function of the message set alone, so applying a realtime event before or
//! after a full fetch converges to the same list, and re-applying a message
//! that is already present is a no-op.

use std::collections::HashMap;

use farmlink_types::MessageId;
use farmlink_types::message::Message;

/// Merge `incoming` into `existing`.
///
/// For a duplicate id the copy with the higher [`precedence`] wins, so the
/// winner depends only on the two payloads and never on arrival order.
pub fn merge_messages<I>(existing: &[Message], incoming: I) -> Vec<Message>
where
    I: IntoIterator<Item = Message>,
{
    let mut by_id: HashMap<MessageId, Message> =
        existing.iter().map(|m| (m.id, m.clone())).collect();

    for message in incoming {
        match by_id.get(&message.id) {
            Some(current) if precedence(current) >= precedence(&message) => {}
            _ => {
                by_id.insert(message.id, message);
            }
        }
    }

    let mut merged: Vec<Message> = by_id.into_values().collect();
    merged.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    merged
}

/// Total order between two copies of one message: later `updated_at`
/// first, then read over unread, then the remaining fields.
fn precedence(message: &Message) -> impl Ord + use<> {
    (
        message.updated_at,
        message.read,
        message.created_at,
        message.session,
        message.sender_id,
        message.receiver_id,
        message.product_id,
        message.content.to_wire(),
        message.content.preview(),
    )
}
