//! Realtime new-message delivery.
//!
//! - `RealtimeTransport`: port for a publish/subscribe topic stream
//! - `RealtimeChannel`: per-user subscription that filters inbound events
//!   and broadcasts accepted messages to bound handlers

pub mod channel;
pub mod transport;

pub use channel::RealtimeChannel;
pub use transport::{EventStream, RealtimeTransport};
