//! Infrastructure layer for Farmlink.
//!
//! Implements the ports defined in `farmlink-core`: the marketplace REST
//! client and SSE realtime transport (reqwest), the HTTP image fetcher, the
//! SQLite conversation cache, plus config and token loading.

pub mod auth;
pub mod config;
pub mod http;
pub mod media;
pub mod realtime;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod test_server;
