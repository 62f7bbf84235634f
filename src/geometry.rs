//! Pixel-level drawing helpers and the card's geometry primitives.

use image::{imageops, imageops::FilterType, GrayImage, Luma, Rgba, RgbaImage};

use crate::text::{TextPainter, TextStyle};

pub const ALBUM_TILE_SIZE: u32 = 125;
pub const CORNER_RADIUS: u32 = 30;
pub const PLAY_BUTTON_RADIUS: i32 = 10;

const PLAY_BUTTON_FILL: Rgba<u8> = Rgba([255, 255, 255, 220]);
const PLAY_GLYPH_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);
const PLAY_TEXT_FILL: Rgba<u8> = Rgba([220, 220, 220, 255]);
const PLAY_TEXT_GAP: i32 = 20;

/// `m:ss`, with no hour component.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Opaque rounded rectangle covering the whole `width x height` area.
pub fn rounded_rect_mask(width: u32, height: u32, radius: u32) -> GrayImage {
    let radius = radius.min(width / 2).min(height / 2) as f32;
    let right = width as f32 - radius;
    let bottom = height as f32 - radius;

    GrayImage::from_fn(width, height, |x, y| {
        let px = x as f32 + 0.5;
        let py = y as f32 + 0.5;
        let cx = if px < radius {
            radius
        } else if px > right {
            right
        } else {
            px
        };
        let cy = if py < radius {
            radius
        } else if py > bottom {
            bottom
        } else {
            py
        };
        let dx = px - cx;
        let dy = py - cy;
        if dx * dx + dy * dy <= radius * radius {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Center-crops to a square, resizes to `size x size` and rounds the corners
/// through the alpha channel.
pub fn make_square(image: &RgbaImage, size: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let side = width.min(height);
    if side == 0 || size == 0 {
        return RgbaImage::new(size, size);
    }

    let crop = imageops::crop_imm(image, (width - side) / 2, (height - side) / 2, side, side);
    let mut square = imageops::resize(&crop.to_image(), size, size, FilterType::Lanczos3);
    let mask = rounded_rect_mask(size, size, CORNER_RADIUS);
    for (pixel, coverage) in square.pixels_mut().zip(mask.pixels()) {
        pixel[3] = coverage[0];
    }
    square
}

/// Scales RGB channels by `factor`, leaving alpha untouched.
pub fn scale_brightness(image: &mut RgbaImage, factor: f32) {
    for pixel in image.pixels_mut() {
        for channel in 0..3 {
            pixel[channel] = (f32::from(pixel[channel]) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Pastes `overlay` at `origin`, weighting every channel by `mask`.
/// Parts falling outside `base` are clipped.
pub fn paste_with_mask(
    base: &mut RgbaImage,
    overlay: &RgbaImage,
    origin: (u32, u32),
    mask: &GrayImage,
) {
    let (base_width, base_height) = base.dimensions();
    for (ox, oy, overlay_pixel) in overlay.enumerate_pixels() {
        let dest_x = origin.0 + ox;
        let dest_y = origin.1 + oy;
        if dest_x >= base_width || dest_y >= base_height {
            continue;
        }
        let Some(weight) = mask.get_pixel_checked(ox, oy).map(|luma| u32::from(luma[0])) else {
            continue;
        };
        if weight == 0 {
            continue;
        }
        let base_pixel = base.get_pixel_mut(dest_x, dest_y);
        for channel in 0..4 {
            let over = u32::from(overlay_pixel[channel]);
            let under = u32::from(base_pixel[channel]);
            base_pixel[channel] = ((over * weight + under * (255 - weight) + 127) / 255) as u8;
        }
    }
}

/// Source-over blend of `color` at (`x`, `y`), scaled by `coverage`.
/// Out-of-bounds coordinates are ignored.
pub fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: u8) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let src_a = f32::from(color[3]) / 255.0 * f32::from(coverage) / 255.0;
    if src_a <= 0.0 {
        return;
    }
    let dest = canvas.get_pixel_mut(x as u32, y as u32);
    let dst_a = f32::from(dest[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }
    for channel in 0..3 {
        let blended = (f32::from(color[channel]) * src_a
            + f32::from(dest[channel]) * dst_a * (1.0 - src_a))
            / out_a;
        dest[channel] = blended.round().clamp(0.0, 255.0) as u8;
    }
    dest[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

pub fn fill_circle(canvas: &mut RgbaImage, center: (i32, i32), radius: i32, color: Rgba<u8>) {
    let radius_sq = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius_sq {
                blend_pixel(canvas, center.0 + dx, center.1 + dy, color, 255);
            }
        }
    }
}

pub fn fill_triangle(canvas: &mut RgbaImage, points: [(i32, i32); 3], color: Rgba<u8>) {
    let edge = |a: (i32, i32), b: (i32, i32), p: (i32, i32)| {
        (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
    };
    let [a, b, c] = points;
    let min_x = a.0.min(b.0).min(c.0);
    let max_x = a.0.max(b.0).max(c.0);
    let min_y = a.1.min(b.1).min(c.1);
    let max_y = a.1.max(b.1).max(c.1);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = (x, y);
            let w0 = edge(a, b, p);
            let w1 = edge(b, c, p);
            let w2 = edge(c, a, p);
            let inside = (w0 >= 0 && w1 >= 0 && w2 >= 0) || (w0 <= 0 && w1 <= 0 && w2 <= 0);
            if inside {
                blend_pixel(canvas, x, y, color, 255);
            }
        }
    }
}

/// Static play button plus a `00:00 / {duration}` label to its right.
pub fn draw_play_controls(
    canvas: &mut RgbaImage,
    painter: &dyn TextPainter,
    position: (i32, i32),
    duration_text: &str,
) {
    let (x, y) = position;
    let center = (x + PLAY_BUTTON_RADIUS, y + PLAY_BUTTON_RADIUS);
    fill_circle(canvas, center, PLAY_BUTTON_RADIUS, PLAY_BUTTON_FILL);
    fill_triangle(
        canvas,
        [
            (center.0 - 4, center.1 - 5),
            (center.0 - 4, center.1 + 5),
            (center.0 + 5, center.1),
        ],
        PLAY_GLYPH_FILL,
    );

    let label = format!("00:00 / {duration_text}");
    let (_, text_height) = painter.measure(TextStyle::Duration, &label);
    let origin = (center.0 + PLAY_TEXT_GAP, center.1 - text_height as i32 / 2);
    painter.draw(canvas, origin, TextStyle::Duration, &label, PLAY_TEXT_FILL);
}
