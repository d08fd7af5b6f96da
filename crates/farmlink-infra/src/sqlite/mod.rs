//! SQLite storage layer.
//!
//! Conversation cache backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod conversation;
pub mod pool;
