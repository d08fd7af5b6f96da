//! Realtime transports.

pub mod sse;

pub use sse::SseTransport;
