//! Disk-backed artifact cache deciding whether a track card is reused or rendered.
//!
//! Artifacts live at `{cache_dir}/{track_id}.png` and are never rewritten once
//! present. Concurrent requests for the same uncached track share one
//! fetch/render; every failure collapses to an empty path at the outer boundary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task;

use crate::compositor::Compositor;
use crate::config::ThumbnailConfig;
use crate::error::{FetchError, GenerationStage, PersistError, RenderError, ThumbnailError};
use crate::image_fetcher::{ImageFetcher, UreqImageFetcher};
use crate::image_pipeline::save_png_atomic;
use crate::text::TextPainter;
use crate::track::TrackDescriptor;

type Outcome = Result<PathBuf, GenerationStage>;
type InFlightMap = Arc<Mutex<HashMap<String, watch::Sender<Option<Outcome>>>>>;

fn lock_in_flight(
    in_flight: &Mutex<HashMap<String, watch::Sender<Option<Outcome>>>>,
) -> MutexGuard<'_, HashMap<String, watch::Sender<Option<Outcome>>>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Claim {
    Leader(InFlightGuard),
    Follower(watch::Receiver<Option<Outcome>>),
}

/// Owns one in-flight key. Dropping it without an outcome (cancellation)
/// releases the key and wakes followers so they can retry.
struct InFlightGuard {
    key: String,
    in_flight: InFlightMap,
    outcome: Option<Outcome>,
}

impl InFlightGuard {
    fn finish(mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let sender = lock_in_flight(&self.in_flight).remove(&self.key);
        if let (Some(sender), Some(outcome)) = (sender, self.outcome.take()) {
            sender.send_replace(Some(outcome));
        }
    }
}

async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Thumbnail cache gate.
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    fetcher: Arc<dyn ImageFetcher>,
    compositor: Compositor,
    in_flight: InFlightMap,
}

impl ThumbnailCache {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        fetcher: Arc<dyn ImageFetcher>,
        compositor: Compositor,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            fetcher,
            compositor,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Gate backed by the HTTP fetcher and a compositor using `text`.
    pub fn from_config(config: &ThumbnailConfig, text: Arc<dyn TextPainter>) -> Self {
        Self::new(
            config.cache_dir.clone(),
            Arc::new(UreqImageFetcher::from_config(config)),
            Compositor::new(text, config),
        )
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn artifact_path(&self, track: &TrackDescriptor) -> PathBuf {
        track.artifact_path(&self.cache_dir)
    }

    /// Path of the track's artifact, or an empty string when none could be produced.
    pub async fn get_or_generate(&self, track: &TrackDescriptor) -> String {
        match self.try_get_or_generate(track).await {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(ThumbnailError::Fetch(FetchError::MissingUrl)) => {
                debug!("Track {} has no thumbnail url", track.track_id);
                String::new()
            }
            Err(err) if err.stage() == GenerationStage::Fetch => {
                warn!("Thumbnail generation error for track {}: {}", track.track_id, err);
                String::new()
            }
            Err(err) => {
                error!("Thumbnail generation error for track {}: {}", track.track_id, err);
                String::new()
            }
        }
    }

    /// Like [`Self::get_or_generate`] but reports which stage failed.
    pub async fn try_get_or_generate(
        &self,
        track: &TrackDescriptor,
    ) -> Result<PathBuf, ThumbnailError> {
        let target = self.artifact_path(track);
        loop {
            if artifact_exists(&target).await {
                debug!("Thumbnail cache hit for track {}", track.track_id);
                return Ok(target);
            }
            let url = track.thumbnail_url().ok_or(FetchError::MissingUrl)?.to_string();

            match self.claim(&track.track_id) {
                Claim::Leader(guard) => {
                    let result = self.lead(track, url, &target).await;
                    guard.finish(match &result {
                        Ok(path) => Ok(path.clone()),
                        Err(err) => Err(err.stage()),
                    });
                    return result;
                }
                Claim::Follower(mut receiver) => {
                    debug!(
                        "Waiting on in-flight thumbnail generation for track {}",
                        track.track_id
                    );
                    let outcome = match receiver.wait_for(Option::is_some).await {
                        Ok(outcome) => (*outcome).clone(),
                        Err(_) => None,
                    };
                    match outcome {
                        Some(Ok(path)) => return Ok(path),
                        Some(Err(stage)) => return Err(ThumbnailError::Shared(stage)),
                        // Leader was cancelled before finishing.
                        None => continue,
                    }
                }
            }
        }
    }

    fn claim(&self, key: &str) -> Claim {
        let mut in_flight = lock_in_flight(&self.in_flight);
        if let Some(sender) = in_flight.get(key) {
            return Claim::Follower(sender.subscribe());
        }
        let (sender, _) = watch::channel(None);
        in_flight.insert(key.to_string(), sender);
        Claim::Leader(InFlightGuard {
            key: key.to_string(),
            in_flight: Arc::clone(&self.in_flight),
            outcome: None,
        })
    }

    /// Generation path of a claimed key. A previous leader may have written the
    /// artifact and released the key after this caller's existence check.
    async fn lead(
        &self,
        track: &TrackDescriptor,
        url: String,
        target: &Path,
    ) -> Result<PathBuf, ThumbnailError> {
        if artifact_exists(target).await {
            debug!(
                "Thumbnail for track {} appeared while claiming; reusing it",
                track.track_id
            );
            return Ok(target.to_path_buf());
        }
        self.generate(track, url, target).await
    }

    async fn generate(
        &self,
        track: &TrackDescriptor,
        url: String,
        target: &Path,
    ) -> Result<PathBuf, ThumbnailError> {
        let fetcher = Arc::clone(&self.fetcher);
        let cover = task::spawn_blocking(move || fetcher.fetch(&url))
            .await
            .map_err(|err| FetchError::Task(err.to_string()))??;

        let compositor = self.compositor.clone();
        let owned_track = track.clone();
        let canvas = task::spawn_blocking(move || compositor.render(&owned_track, &cover))
            .await
            .map_err(|err| RenderError::Task(err.to_string()))??;

        let owned_target = target.to_path_buf();
        task::spawn_blocking(move || save_png_atomic(&canvas, &owned_target))
            .await
            .map_err(|err| PersistError::Task(err.to_string()))??;

        if !artifact_exists(target).await {
            return Err(PersistError::Missing(target.to_path_buf()).into());
        }
        info!(
            "Generated thumbnail for track {} at {}",
            track.track_id,
            target.display()
        );
        Ok(target.to_path_buf())
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        lock_in_flight(&self.in_flight).len()
    }
}
