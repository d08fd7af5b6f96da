//! Marketplace REST client.

pub mod client;
pub mod error;
mod wire;

pub use client::HttpMarketplaceClient;
