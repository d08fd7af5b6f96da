//! Client configuration types for Farmlink.
//!
//! `ClientConfig` represents `config.toml` in the data directory. Every
//! field has a default so an empty or partial file is valid.

use serde::{Deserialize, Serialize};

use std::time::Duration;

use crate::session::SessionAllocation;

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the marketplace REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Fixed client-side timeout for every REST call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Strategy used when a conversation has no session yet.
    #[serde(default)]
    pub session_allocation: SessionAllocation,

    #[serde(default)]
    pub image_cache: ImageCacheConfig,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base that relative image references are joined to.
    pub fn image_base_url(&self) -> &str {
        self.image_cache.base_url.as_deref().unwrap_or(&self.base_url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            session_allocation: SessionAllocation::default(),
            image_cache: ImageCacheConfig::default(),
        }
    }
}

/// Image cache limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCacheConfig {
    /// Maximum parallel downloads across distinct URIs.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Maximum mapped images before least-recently-used eviction.
    /// `None` keeps every image for the process lifetime.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Host that relative image references resolve against. Defaults to
    /// the API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_max_concurrent_downloads() -> usize {
    4
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_entries: None,
            base_url: None,
        }
    }
}
