//! Text rasterization for the card's text layers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};

use crate::config::{FontFaceConfig, FontsConfig};
use crate::error::FontError;
use crate::geometry::blend_pixel;

/// Text layer a string is drawn in; each maps to its own face and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextStyle {
    Caption,
    Title,
    Artist,
    Duration,
}

/// Draws single-line text onto a canvas.
pub trait TextPainter: Send + Sync {
    /// Width and height of `text` in pixels.
    fn measure(&self, style: TextStyle, text: &str) -> (u32, u32);

    /// Draws `text` with its top-left corner at `origin`.
    fn draw(
        &self,
        canvas: &mut RgbaImage,
        origin: (i32, i32),
        style: TextStyle,
        text: &str,
        color: Rgba<u8>,
    );
}

/// A parsed font rendered at one pixel size.
#[derive(Clone)]
struct FontFace {
    font: Arc<Font>,
    size_px: f32,
}

impl FontFace {
    /// (ascent, descent) with descent negative, as fontdue reports it.
    fn vertical_metrics(&self) -> (f32, f32) {
        match self.font.horizontal_line_metrics(self.size_px) {
            Some(metrics) => (metrics.ascent, metrics.descent),
            None => (self.size_px * 0.8, -self.size_px * 0.2),
        }
    }

    fn measure(&self, text: &str) -> (u32, u32) {
        let width: f32 = text
            .chars()
            .map(|c| self.font.metrics(c, self.size_px).advance_width)
            .sum();
        let (ascent, descent) = self.vertical_metrics();
        (width.ceil().max(0.0) as u32, (ascent - descent).ceil().max(0.0) as u32)
    }

    fn draw(&self, canvas: &mut RgbaImage, origin: (i32, i32), text: &str, color: Rgba<u8>) {
        let (ascent, _) = self.vertical_metrics();
        let baseline_y = origin.1 + ascent.round() as i32;
        let mut cursor_x = origin.0 as f32;

        for c in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(c, self.size_px);
            let glyph_left = cursor_x.round() as i32 + metrics.xmin;
            let glyph_top = baseline_y - metrics.ymin - metrics.height as i32;
            for y in 0..metrics.height {
                for x in 0..metrics.width {
                    let coverage = bitmap[y * metrics.width + x];
                    if coverage > 0 {
                        blend_pixel(
                            canvas,
                            glyph_left + x as i32,
                            glyph_top + y as i32,
                            color,
                            coverage,
                        );
                    }
                }
            }
            cursor_x += metrics.advance_width;
        }
    }
}

/// The four faces used by the card, loaded once and shared across renders.
#[derive(Clone)]
pub struct FontSet {
    caption: FontFace,
    title: FontFace,
    artist: FontFace,
    duration: FontFace,
}

impl FontSet {
    /// Loads every configured face, reading each distinct file once.
    pub fn load(config: &FontsConfig) -> Result<Self, FontError> {
        let mut parsed: HashMap<PathBuf, Arc<Font>> = HashMap::new();
        let mut load_face = |face: &FontFaceConfig| -> Result<FontFace, FontError> {
            let font = match parsed.get(&face.path) {
                Some(font) => Arc::clone(font),
                None => {
                    let font = Arc::new(read_font(&face.path)?);
                    parsed.insert(face.path.clone(), Arc::clone(&font));
                    font
                }
            };
            Ok(FontFace {
                font,
                size_px: face.size_px,
            })
        };

        Ok(Self {
            caption: load_face(&config.caption)?,
            title: load_face(&config.title)?,
            artist: load_face(&config.artist)?,
            duration: load_face(&config.duration)?,
        })
    }

    fn face(&self, style: TextStyle) -> &FontFace {
        match style {
            TextStyle::Caption => &self.caption,
            TextStyle::Title => &self.title,
            TextStyle::Artist => &self.artist,
            TextStyle::Duration => &self.duration,
        }
    }
}

fn read_font(path: &Path) -> Result<Font, FontError> {
    let bytes = std::fs::read(path).map_err(|source| FontError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Font::from_bytes(bytes, FontSettings::default()).map_err(|message| FontError::Parse {
        path: path.to_path_buf(),
        message: message.to_string(),
    })
}

impl TextPainter for FontSet {
    fn measure(&self, style: TextStyle, text: &str) -> (u32, u32) {
        self.face(style).measure(text)
    }

    fn draw(
        &self,
        canvas: &mut RgbaImage,
        origin: (i32, i32),
        style: TextStyle,
        text: &str,
        color: Rgba<u8>,
    ) {
        self.face(style).draw(canvas, origin, text, color);
    }
}
