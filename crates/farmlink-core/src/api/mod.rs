//! Marketplace REST API port.
//!
//! The engine talks to the backend only through [`MarketplaceApi`]; the
//! reqwest-based adapter lives in farmlink-infra.

pub mod marketplace;

pub use marketplace::MarketplaceApi;
