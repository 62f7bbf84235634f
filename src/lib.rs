//! Cached now-playing thumbnail generation.
//!
//! [`ThumbnailCache::get_or_generate`] turns a [`TrackDescriptor`] into the
//! path of a rendered card under the cache directory, reusing the file on
//! later calls and returning an empty string when no card can be produced.

pub mod compositor;
pub mod config;
pub mod error;
pub mod geometry;
pub mod image_fetcher;
pub mod image_pipeline;
pub mod text;
pub mod thumbnail_cache;
pub mod track;

pub use compositor::Compositor;
pub use config::ThumbnailConfig;
pub use error::{GenerationStage, ThumbnailError};
pub use image_fetcher::{ImageFetcher, UreqImageFetcher};
pub use text::{FontSet, TextPainter};
pub use thumbnail_cache::ThumbnailCache;
pub use track::TrackDescriptor;
