//! Track descriptor supplied by callers and its display rules.

use std::path::{Path, PathBuf};

/// Metadata for one track, owned by the caller.
///
/// `track_id` doubles as the artifact filename stem, so callers must keep it
/// filesystem-safe and unique per track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub track_id: String,
    pub name: String,
    pub artist: Option<String>,
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
}

impl TrackDescriptor {
    pub fn new(track_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    /// Cover-art URL, or `None` when absent or blank.
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration.unwrap_or(0)
    }

    pub fn display_title(&self, max_chars: usize) -> String {
        truncate_chars(self.name.trim(), max_chars)
    }

    pub fn display_artist(&self, fallback: &str, max_chars: usize) -> String {
        let artist = self
            .artist
            .as_deref()
            .filter(|artist| !artist.is_empty())
            .unwrap_or(fallback);
        truncate_chars(artist.trim(), max_chars)
    }

    /// Deterministic artifact location for this track under `cache_dir`.
    pub fn artifact_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(format!("{}.{ARTIFACT_EXTENSION}", self.track_id))
    }
}

pub const ARTIFACT_EXTENSION: &str = "png";

/// Hard cut at `max_chars` characters, no marker appended.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::{truncate_chars, TrackDescriptor};
    use std::path::{Path, PathBuf};

    #[test]
    fn test_truncate_chars_cuts_without_marker() {
        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        let cut = truncate_chars(long, 30);
        assert_eq!(cut.chars().count(), 30);
        assert_eq!(cut, "abcdefghijklmnopqrstuvwxyz0123");
        assert_eq!(truncate_chars("short", 30), "short");
    }

    #[test]
    fn test_truncate_chars_counts_characters_not_bytes() {
        let title = "ñ".repeat(40);
        assert_eq!(truncate_chars(&title, 30).chars().count(), 30);
    }

    #[test]
    fn test_display_artist_falls_back_for_missing_or_empty_artist() {
        let missing = TrackDescriptor::new("t1", "Song");
        let empty = TrackDescriptor::new("t1", "Song").with_artist("");
        let present = TrackDescriptor::new("t1", "Song").with_artist("  Nina Simone ");

        assert_eq!(missing.display_artist("Spotify", 30), "Spotify");
        assert_eq!(empty.display_artist("Spotify", 30), "Spotify");
        assert_eq!(present.display_artist("Spotify", 30), "Nina Simone");
    }

    #[test]
    fn test_display_title_trims_before_truncating() {
        let track = TrackDescriptor::new("t1", "   Feeling Good   ");
        assert_eq!(track.display_title(30), "Feeling Good");
        assert_eq!(track.display_title(4), "Feel");
    }

    #[test]
    fn test_thumbnail_url_treats_blank_as_absent() {
        assert_eq!(TrackDescriptor::new("t", "n").thumbnail_url(), None);
        assert_eq!(
            TrackDescriptor::new("t", "n").with_thumbnail("  ").thumbnail_url(),
            None
        );
        assert_eq!(
            TrackDescriptor::new("t", "n")
                .with_thumbnail("https://cdn.example/a.jpg")
                .thumbnail_url(),
            Some("https://cdn.example/a.jpg")
        );
    }

    #[test]
    fn test_missing_duration_defaults_to_zero() {
        assert_eq!(TrackDescriptor::new("t", "n").duration_secs(), 0);
        assert_eq!(TrackDescriptor::new("t", "n").with_duration(125).duration_secs(), 125);
    }

    #[test]
    fn test_artifact_path_is_keyed_by_track_id() {
        let track = TrackDescriptor::new("abc123", "Song");
        assert_eq!(
            track.artifact_path(Path::new("database/photos")),
            PathBuf::from("database/photos/abc123.png")
        );
    }
}
