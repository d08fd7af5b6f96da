//! Durable local storage ports.

pub mod conversation_cache;

pub use conversation_cache::ConversationCache;
