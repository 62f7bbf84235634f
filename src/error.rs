//! Failure taxonomy for thumbnail generation, one enum per stage.

use std::path::PathBuf;

use thiserror::Error;

/// Stage of the generation pipeline a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Fetch,
    Render,
    Persist,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("track has no thumbnail url")]
    MissingUrl,

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("reading response from {url} failed: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("response from {url} exceeded {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("response from {url} is not a decodable image")]
    Decode { url: String },

    #[error("fetch task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("source image has unusable dimensions {width}x{height}")]
    EmptySource { width: u32, height: u32 },

    #[error("render task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("artifact {} missing after write", .0.display())]
    Missing(PathBuf),

    #[error("persist task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse font {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("persist failed: {0}")]
    Persist(#[from] PersistError),

    /// Another request for the same track was generating and failed.
    #[error("concurrent generation failed at {0:?} stage")]
    Shared(GenerationStage),
}

impl ThumbnailError {
    pub fn stage(&self) -> GenerationStage {
        match self {
            ThumbnailError::Fetch(_) => GenerationStage::Fetch,
            ThumbnailError::Render(_) => GenerationStage::Render,
            ThumbnailError::Persist(_) => GenerationStage::Persist,
            ThumbnailError::Shared(stage) => *stage,
        }
    }
}
