//! Shared domain types for the Farmlink marketplace client.
//!
//! This crate contains the domain types used across the conversation sync
//! and offer engine: products, sessions, chat messages, offers, approval
//! requests, realtime envelopes, client configuration, and the error
//! taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod approval;
pub mod config;
pub mod error;
pub mod message;
pub mod offer;
pub mod product;
pub mod realtime;
pub mod session;

/// Identifier of a marketplace user (buyer or seller).
pub type UserId = i64;

/// Identifier of a product listing.
pub type ProductId = i64;

/// Server-assigned identifier of a chat message.
pub type MessageId = i64;
