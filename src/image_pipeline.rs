//! Shared image decoding and artifact persistence helpers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::{DynamicImage, ImageFormat, RgbaImage};
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};
use zune_jpeg::JpegDecoder;

use crate::error::PersistError;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xff && bytes[1] == 0xd8
}

fn decode_jpeg_non_strict(bytes: &[u8]) -> Option<DynamicImage> {
    if !looks_like_jpeg(bytes) {
        return None;
    }

    let options = DecoderOptions::new_cmd()
        .set_strict_mode(false)
        .jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);
    let pixels = decoder.decode().ok()?;
    let (width, height) = decoder.dimensions()?;
    let image = RgbaImage::from_raw(width as u32, height as u32, pixels)?;
    Some(DynamicImage::ImageRgba8(image))
}

/// Decodes any supported format and normalizes it to RGBA.
pub fn decode_rgba_from_memory(bytes: &[u8]) -> Option<RgbaImage> {
    // CDNs occasionally serve JPEGs with trailing garbage the strict decoder rejects.
    image::load_from_memory(bytes)
        .ok()
        .or_else(|| decode_jpeg_non_strict(bytes))
        .map(|decoded| decoded.into_rgba8())
}

fn ensure_parent_dir(path: &Path) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn temp_path_for(target_path: &Path) -> PathBuf {
    let sequence = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    target_path.with_extension(format!("png.{}-{sequence}.tmp", std::process::id()))
}

/// Writes `image` as PNG next to `target_path` and renames it into place.
pub fn save_png_atomic(image: &RgbaImage, target_path: &Path) -> Result<(), PersistError> {
    ensure_parent_dir(target_path)?;
    let temp_path = temp_path_for(target_path);
    if let Err(err) = image.save_with_format(&temp_path, ImageFormat::Png) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&temp_path, target_path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{decode_rgba_from_memory, save_png_atomic, temp_path_for};
    use image::{
        codecs::jpeg::JpegEncoder, DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage, Rgba,
        RgbaImage,
    };
    use std::io::Cursor;
    use std::path::Path;

    #[test]
    fn test_decode_rgba_from_memory_decodes_jpeg_with_trailing_garbage() {
        let rgb = RgbImage::from_pixel(12, 9, Rgb([90, 140, 210]));
        let mut encoded = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut encoded, 85);
            encoder
                .encode_image(&DynamicImage::ImageRgb8(rgb))
                .expect("jpeg encoding should succeed");
        }
        encoded.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let decoded = decode_rgba_from_memory(&encoded).expect("jpeg bytes should decode");
        assert_eq!(decoded.dimensions(), (12, 9));
        assert_eq!(decoded.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_decode_rgba_from_memory_rejects_non_image_bytes() {
        assert!(decode_rgba_from_memory(b"<html>not found</html>").is_none());
    }

    #[test]
    fn test_decode_rgba_from_memory_normalizes_rgb_png_to_rgba() {
        let source = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(7, 5, Rgb([8, 16, 24])));
        let mut cursor = Cursor::new(Vec::<u8>::new());
        source
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("png encoding should succeed");

        let decoded = decode_rgba_from_memory(&cursor.into_inner()).expect("png should decode");
        assert_eq!(decoded.dimensions(), (7, 5));
        assert_eq!(decoded.get_pixel(3, 2), &Rgba([8, 16, 24, 255]));
    }

    #[test]
    fn test_save_png_atomic_creates_parent_and_leaves_no_temp_files() {
        let nonce = format!("{}_{}", std::process::id(), line!());
        let dir = std::env::temp_dir().join(format!("trackthumb_pipeline_{nonce}"));
        let target = dir.join("nested").join("track.png");
        let image = RgbaImage::from_pixel(4, 3, Rgba([1, 2, 3, 255]));

        save_png_atomic(&image, &target).expect("save should succeed");

        let reopened = image::open(&target).expect("artifact should decode");
        assert_eq!(reopened.into_rgba8(), image);
        let leftovers = std::fs::read_dir(target.parent().expect("parent"))
            .expect("read dir")
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_temp_paths_are_unique_and_beside_target() {
        let target = Path::new("cache/abc.png");
        let first = temp_path_for(target);
        let second = temp_path_for(target);
        assert_ne!(first, second);
        assert_eq!(first.parent(), target.parent());
        assert!(first.to_string_lossy().ends_with(".tmp"));
    }
}
