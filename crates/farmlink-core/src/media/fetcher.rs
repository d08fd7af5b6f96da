//! ImageFetcher trait definition.

use farmlink_types::error::SyncError;

/// Downloads the raw bytes behind a remote image reference.
///
/// `uri` is whatever the server stored: an absolute URL or a path relative
/// to the image host. Resolving it is the implementation's business.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> impl std::future::Future<Output = Result<Vec<u8>, SyncError>> + Send;
}
