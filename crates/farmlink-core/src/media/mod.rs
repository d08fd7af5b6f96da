//! Remote image download and local file cache.

pub mod fetcher;
pub mod image_cache;

pub use fetcher::ImageFetcher;
pub use image_cache::{ImageCache, local_file_name};
