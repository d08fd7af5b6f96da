//! HttpImageFetcher -- concrete [`ImageFetcher`] for the marketplace image host.

use tracing::debug;

use farmlink_core::media::ImageFetcher;
use farmlink_types::config::ClientConfig;
use farmlink_types::error::SyncError;

use crate::http::error::{status_error, transport_error};

/// Plain GET of image bytes. Images are public, so no token is sent.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpImageFetcher {
    pub fn new(config: &ClientConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::NetworkUnavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.image_base_url().trim_end_matches('/').to_string(),
        })
    }

    /// Absolute `http(s)` references are used as-is; anything else is a path
    /// on the image host.
    pub fn resolve(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            format!("{}/{}", self.base_url, uri.trim_start_matches('/'))
        }
    }
}

impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, SyncError> {
        let url = self.resolve(uri);
        debug!(%url, "downloading image");

        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use farmlink_core::media::ImageCache;
    use farmlink_types::config::ImageCacheConfig;

    use crate::test_server;

    fn fetcher(image_base_url: &str) -> HttpImageFetcher {
        let config = ClientConfig {
            image_cache: ImageCacheConfig {
                base_url: Some(format!("{image_base_url}/")),
                ..ImageCacheConfig::default()
            },
            ..ClientConfig::default()
        };
        HttpImageFetcher::new(&config).unwrap()
    }

    #[test]
    fn test_resolve() {
        let fetcher = fetcher("https://img.example.com");
        assert_eq!(
            fetcher.resolve("/uploads/a.jpg"),
            "https://img.example.com/uploads/a.jpg"
        );
        assert_eq!(
            fetcher.resolve("1714557600_maize.jpg"),
            "https://img.example.com/1714557600_maize.jpg"
        );
        assert_eq!(
            fetcher.resolve("http://cdn.example.com/b.png"),
            "http://cdn.example.com/b.png"
        );
    }

    #[test]
    fn test_defaults_to_api_base() {
        let config = ClientConfig {
            base_url: "https://market.example.com/api/".to_string(),
            ..ClientConfig::default()
        };
        let fetcher = HttpImageFetcher::new(&config).unwrap();
        assert_eq!(fetcher.resolve("x.jpg"), "https://market.example.com/api/x.jpg");
    }

    #[tokio::test]
    async fn test_fetch_bytes() {
        let server = test_server::spawn().await;
        let bytes = fetcher(&server.image_base_url)
            .fetch("products/maize.jpg")
            .await
            .unwrap();
        assert_eq!(bytes, b"image:products/maize.jpg");
    }

    #[tokio::test]
    async fn test_missing_image_is_rejected() {
        let server = test_server::spawn().await;
        let err = fetcher(&server.image_base_url)
            .fetch("products/missing.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ServerRejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_cache_downloads_once_over_http() {
        let server = test_server::spawn().await;
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(
            fetcher(&server.image_base_url),
            dir.path(),
            &ImageCacheConfig::default(),
        );

        let (a, b) = tokio::join!(cache.get("1714557600_maize.jpg"), cache.get("1714557600_maize.jpg"));
        let path = a.unwrap();
        assert_eq!(path, b.unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"image:1714557600_maize.jpg");

        cache.get("1714557600_maize.jpg").await.unwrap();
        assert_eq!(server.recorded.lock().unwrap().image_hits, 1);
    }
}
