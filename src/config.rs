//! Thumbnail generator configuration model and defaults.

use std::path::{Path, PathBuf};

use log::warn;

/// Root configuration read from `config.toml`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ThumbnailConfig {
    /// Directory holding rendered artifacts, one `{track_id}.png` per track.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Upper bound on a cover-art response body.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    /// Small label drawn above the title.
    #[serde(default = "default_caption_label")]
    pub caption_label: String,
    /// Artist shown when the track has none.
    #[serde(default = "default_fallback_artist")]
    pub fallback_artist: String,
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default)]
    pub fonts: FontsConfig,
}

/// Font faces for each text layer of the card.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FontsConfig {
    #[serde(default = "default_caption_font")]
    pub caption: FontFaceConfig,
    #[serde(default = "default_title_font")]
    pub title: FontFaceConfig,
    #[serde(default = "default_artist_font")]
    pub artist: FontFaceConfig,
    #[serde(default = "default_duration_font")]
    pub duration: FontFaceConfig,
}

/// One font file rendered at a fixed pixel size.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FontFaceConfig {
    pub path: PathBuf,
    pub size_px: f32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_image_bytes: default_max_image_bytes(),
            caption_label: default_caption_label(),
            fallback_artist: default_fallback_artist(),
            max_text_chars: default_max_text_chars(),
            fonts: FontsConfig::default(),
        }
    }
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            caption: default_caption_font(),
            title: default_title_font(),
            artist: default_artist_font(),
            duration: default_duration_font(),
        }
    }
}

/// Reads a config file, falling back to defaults when it is missing or malformed.
pub fn load_config_file(path: &Path) -> ThumbnailConfig {
    let config_content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            return ThumbnailConfig::default();
        }
    };

    match toml::from_str::<ThumbnailConfig>(&config_content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to parse config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            ThumbnailConfig::default()
        }
    }
}

/// Location of the per-user config file, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|path| path.join("trackthumb").join("config.toml"))
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("database/photos")
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_max_image_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_caption_label() -> String {
    "Akshi Vibez".to_string()
}

fn default_fallback_artist() -> String {
    "Spotify".to_string()
}

fn default_max_text_chars() -> usize {
    30
}

fn default_caption_font() -> FontFaceConfig {
    FontFaceConfig {
        path: PathBuf::from("assets/fonts/DejaVuSans.ttf"),
        size_px: 10.0,
    }
}

fn default_title_font() -> FontFaceConfig {
    FontFaceConfig {
        path: PathBuf::from("assets/fonts/DejaVuSans-Bold.ttf"),
        size_px: 20.0,
    }
}

fn default_artist_font() -> FontFaceConfig {
    FontFaceConfig {
        path: PathBuf::from("assets/fonts/DejaVuSansCondensed.ttf"),
        size_px: 15.0,
    }
}

fn default_duration_font() -> FontFaceConfig {
    FontFaceConfig {
        path: PathBuf::from("assets/fonts/DejaVuSans.ttf"),
        size_px: 12.0,
    }
}
