//! Layer-by-layer assembly of the now-playing card.
//!
//! The canvas is the blurred cover at the cover's own size. On top of it sit a
//! darkened rounded panel, the sharp album tile, three text lines and the play
//! control bar, all at fixed coordinates.

use std::sync::Arc;

use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};

use crate::config::ThumbnailConfig;
use crate::error::RenderError;
use crate::geometry::{
    draw_play_controls, format_duration, make_square, paste_with_mask, rounded_rect_mask,
    scale_brightness, ALBUM_TILE_SIZE, CORNER_RADIUS,
};
use crate::text::{TextPainter, TextStyle};
use crate::track::TrackDescriptor;

const BACKGROUND_BLUR_SIGMA: f32 = 25.0;
/// (left, top, right, bottom)
const CONTENT_BOX: (u32, u32, u32, u32) = (60, 60, 580, 300);
const CONTENT_BRIGHTNESS: f32 = 0.5;
const ALBUM_TILE_ORIGIN: (u32, u32) = (90, 110);
const TEXT_LEFT: i32 = 230;
const CAPTION_TOP: i32 = 120;
const TITLE_TOP: i32 = 140;
const ARTIST_TOP: i32 = 175;
const PLAY_CONTROLS_ORIGIN: (i32, i32) = (230, 205);

const CAPTION_COLOR: Rgba<u8> = Rgba([200, 200, 200, 255]);
const TITLE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const ARTIST_COLOR: Rgba<u8> = Rgba([235, 235, 235, 255]);

/// Renders a track card from a decoded cover image.
#[derive(Clone)]
pub struct Compositor {
    text: Arc<dyn TextPainter>,
    caption_label: String,
    fallback_artist: String,
    max_text_chars: usize,
}

impl Compositor {
    pub fn new(text: Arc<dyn TextPainter>, config: &ThumbnailConfig) -> Self {
        Self {
            text,
            caption_label: config.caption_label.clone(),
            fallback_artist: config.fallback_artist.clone(),
            max_text_chars: config.max_text_chars,
        }
    }

    pub fn render(
        &self,
        track: &TrackDescriptor,
        source: &RgbaImage,
    ) -> Result<RgbaImage, RenderError> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptySource { width, height });
        }

        let mut canvas = imageops::fast_blur(source, BACKGROUND_BLUR_SIGMA);
        darken_content_panel(&mut canvas);

        let tile = make_square(source, ALBUM_TILE_SIZE);
        paste_with_mask(&mut canvas, &tile, ALBUM_TILE_ORIGIN, &alpha_mask(&tile));

        let title = track.display_title(self.max_text_chars);
        let artist = track.display_artist(&self.fallback_artist, self.max_text_chars);
        let painter = self.text.as_ref();
        painter.draw(
            &mut canvas,
            (TEXT_LEFT, CAPTION_TOP),
            TextStyle::Caption,
            &self.caption_label,
            CAPTION_COLOR,
        );
        painter.draw(
            &mut canvas,
            (TEXT_LEFT, TITLE_TOP),
            TextStyle::Title,
            &title,
            TITLE_COLOR,
        );
        painter.draw(
            &mut canvas,
            (TEXT_LEFT, ARTIST_TOP),
            TextStyle::Artist,
            &artist,
            ARTIST_COLOR,
        );
        draw_play_controls(
            &mut canvas,
            painter,
            PLAY_CONTROLS_ORIGIN,
            &format_duration(track.duration_secs()),
        );

        Ok(canvas)
    }
}

/// Re-darkens the content box through a rounded mask. The box is clipped to
/// the canvas; the mask keeps the full box geometry.
fn darken_content_panel(canvas: &mut RgbaImage) {
    let (left, top, right, bottom) = CONTENT_BOX;
    let clipped_right = right.min(canvas.width());
    let clipped_bottom = bottom.min(canvas.height());
    if left >= clipped_right || top >= clipped_bottom {
        return;
    }

    let mut region =
        imageops::crop_imm(&*canvas, left, top, clipped_right - left, clipped_bottom - top)
            .to_image();
    scale_brightness(&mut region, CONTENT_BRIGHTNESS);
    let mask = rounded_rect_mask(right - left, bottom - top, CORNER_RADIUS);
    paste_with_mask(canvas, &region, (left, top), &mask);
}

fn alpha_mask(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[3]])
    })
}
