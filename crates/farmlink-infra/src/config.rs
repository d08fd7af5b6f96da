//! Client configuration loader for Farmlink.
//!
//! Reads `config.toml` from the data directory (`~/.farmlink/` by default)
//! and deserializes it into [`ClientConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use farmlink_types::config::ClientConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV_VAR: &str = "FARMLINK_DATA_DIR";

/// Resolve the data directory: `FARMLINK_DATA_DIR`, else `~/.farmlink`,
/// else `./.farmlink` when there is no home directory.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV_VAR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".farmlink")
}

/// Directory holding cached chat and product images.
pub fn image_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("images")
}

/// Load client configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`ClientConfig::default()`].
/// - Unreadable or unparseable file: logs a warning and returns the default.
pub async fn load_client_config(data_dir: &Path) -> ClientConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ClientConfig::default();
        }
    };

    match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ClientConfig::default()
        }
    }
}
