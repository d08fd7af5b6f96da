//! Conversation sync and offer-negotiation engine for Farmlink.
//!
//! This crate defines the "ports" (traits for the marketplace REST API,
//! durable conversation cache, realtime transport and image fetcher) that
//! the infrastructure layer implements, plus the engine built on them. It
//! depends only on `farmlink-types` -- never on `farmlink-infra` or any
//! HTTP/database crate.

pub mod api;
pub mod approval;
pub mod chat;
pub mod media;
pub mod offer;
pub mod realtime;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
