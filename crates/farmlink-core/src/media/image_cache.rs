//! Memoized, single-flight image cache.
//!
//! Maps a remote image reference to a file under the cache root. Concurrent
//! `get` calls for the same URI share one spawned load, a semaphore caps
//! parallel downloads across URIs, and files already on disk from an earlier
//! run are adopted without a transfer. Entries are never revalidated: image
//! filenames are treated as content-addressed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use farmlink_types::config::ImageCacheConfig;
use farmlink_types::error::SyncError;

use super::fetcher::ImageFetcher;

type Flight = Shared<BoxFuture<'static, Result<PathBuf, SyncError>>>;

enum Slot {
    Ready { path: PathBuf, last_used: u64 },
    Loading(Flight),
}

struct Inner<F> {
    fetcher: F,
    root: PathBuf,
    entries: DashMap<String, Slot>,
    downloads: Semaphore,
    max_entries: Option<usize>,
    clock: AtomicU64,
}

/// Shareable image cache handle. Clones share the same entries.
pub struct ImageCache<F: ImageFetcher> {
    inner: Arc<Inner<F>>,
}

impl<F: ImageFetcher> Clone for ImageCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Local filename for a remote image reference.
///
/// Scheme, host, query and fragment are dropped; path separators are
/// flattened to `_` and anything outside `[A-Za-z0-9._-]` becomes `_`, so
/// `products/abc.jpg` and `https://cdn/x/products/abc.jpg` map to
/// `products_abc.jpg` and `x_products_abc.jpg`.
pub fn local_file_name(uri: &str) -> Result<String, SyncError> {
    let without_scheme = match uri.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or(""),
        None => uri,
    };
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .trim_matches(|c| c == '/' || c == '\\');

    let name: String = path
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => c,
            _ => '_',
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        return Err(SyncError::ValidationFailed(format!(
            "image reference {uri:?} has no usable file name"
        )));
    }
    Ok(name)
}

impl<F: ImageFetcher + 'static> ImageCache<F> {
    pub fn new(fetcher: F, root: impl Into<PathBuf>, config: &ImageCacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                root: root.into(),
                entries: DashMap::new(),
                downloads: Semaphore::new(config.max_concurrent_downloads.max(1)),
                max_entries: config.max_entries,
                clock: AtomicU64::new(0),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    /// Number of URIs resolved to a local file.
    pub fn cached_count(&self) -> usize {
        self.inner
            .entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Ready { .. }))
            .count()
    }

    /// Local path for `uri`, downloading it at most once.
    ///
    /// Every caller sharing a failed load sees the error; the entry is then
    /// cleared so the next call starts over.
    #[instrument(skip(self))]
    pub async fn get(&self, uri: &str) -> Result<PathBuf, SyncError> {
        let file_name = local_file_name(uri)?;

        let flight = match self.inner.entries.entry(uri.to_string()) {
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                Slot::Ready { path, last_used } => {
                    *last_used = self.inner.tick();
                    return Ok(path.clone());
                }
                Slot::Loading(flight) => {
                    debug!("joining in-flight image load");
                    flight.clone()
                }
            },
            Entry::Vacant(vacant) => {
                let path = self.inner.root.join(&file_name);
                let flight = Inner::start(Arc::clone(&self.inner), uri.to_string(), path);
                vacant.insert(Slot::Loading(flight.clone()));
                flight
            }
        };

        flight.await
    }
}

impl<F: ImageFetcher + 'static> Inner<F> {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Spawn the load so it runs to completion, records its outcome and
    /// releases its download permit even if every caller stops waiting.
    fn start(inner: Arc<Self>, uri: String, path: PathBuf) -> Flight {
        let task = tokio::spawn(async move {
            let result = inner.load(&uri, &path).await;
            inner.finish(&uri, &result).await;
            result
        });

        task.map(|joined| {
            joined.unwrap_or_else(|err| {
                Err(SyncError::Storage(format!("image download task failed: {err}")))
            })
        })
        .boxed()
        .shared()
    }

    async fn load(&self, uri: &str, path: &Path) -> Result<PathBuf, SyncError> {
        match fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => {
                debug!(path = %path.display(), "adopted image already on disk");
                return Ok(path.to_path_buf());
            }
            Ok(_) => {
                if let Err(err) = fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %err, "failed to remove empty cached image");
                }
                return Err(SyncError::DecodeFailed(format!(
                    "cached image {} is empty",
                    path.display()
                )));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(SyncError::Storage(err.to_string())),
        }

        let _permit = self
            .downloads
            .acquire()
            .await
            .map_err(|_| SyncError::Cancelled)?;

        let bytes = self.fetcher.fetch(uri).await?;
        if bytes.is_empty() {
            return Err(SyncError::DecodeFailed(format!("image {uri} has an empty body")));
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = self
            .root
            .join(format!(".{file_name}.{}.part", Uuid::now_v7()));

        fs::write(&temp, &bytes)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;
        if let Err(err) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(SyncError::Storage(err.to_string()));
        }

        info!(uri, path = %path.display(), bytes = bytes.len(), "downloaded image");
        Ok(path.to_path_buf())
    }

    async fn finish(&self, uri: &str, result: &Result<PathBuf, SyncError>) {
        match result {
            Ok(path) => {
                self.entries.insert(
                    uri.to_string(),
                    Slot::Ready {
                        path: path.clone(),
                        last_used: self.tick(),
                    },
                );
                for evicted in self.evict_over_capacity(uri) {
                    if let Err(err) = fs::remove_file(&evicted).await {
                        warn!(path = %evicted.display(), error = %err, "failed to remove evicted image");
                    }
                }
            }
            Err(err) => {
                debug!(uri, error = %err, "image load failed, clearing entry");
                self.entries
                    .remove_if(uri, |_, slot| matches!(slot, Slot::Loading(_)));
            }
        }
    }

    /// Drop least-recently-used ready entries beyond `max_entries`, never
    /// `keep`. Returns the files to delete.
    fn evict_over_capacity(&self, keep: &str) -> Vec<PathBuf> {
        let Some(max_entries) = self.max_entries else {
            return Vec::new();
        };

        let mut ready: Vec<(String, u64)> = self
            .entries
            .iter()
            .filter_map(|entry| match entry.value() {
                Slot::Ready { last_used, .. } => Some((entry.key().clone(), *last_used)),
                Slot::Loading(_) => None,
            })
            .collect();
        if ready.len() <= max_entries {
            return Vec::new();
        }

        let excess = ready.len() - max_entries;
        ready.sort_by_key(|(_, last_used)| *last_used);

        ready
            .into_iter()
            .filter(|(key, _)| key != keep)
            .take(excess)
            .filter_map(|(key, _)| {
                match self
                    .entries
                    .remove_if(&key, |_, slot| matches!(slot, Slot::Ready { .. }))
                {
                    Some((_, Slot::Ready { path, .. })) => {
                        debug!(uri = %key, "evicted image");
                        Some(path)
                    }
                    _ => None,
                }
            })
            .collect()
    }
}
