//! Synthetic still images for offline testing
//!
//! Produces JPEG payloads shaped like what a photo output hands back, so the
//! decode and orientation path can be exercised without hardware.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

/// Gradient RGB bitmap that varies with `seed`
pub fn synthetic_bitmap(seed: u64, width: u32, height: u32) -> RgbImage {
    let base = (seed % 256) as u8;
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            base.wrapping_add((x % 256) as u8),
            base.wrapping_add((y % 256) as u8),
            base.wrapping_add(((x + y) % 256) as u8),
        ])
    })
}

/// JPEG-encoded gradient
pub fn synthetic_jpeg(seed: u64, width: u32, height: u32) -> Vec<u8> {
    let bitmap = synthetic_bitmap(seed, width, height);
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, 90);
    if let Err(e) = encoder.encode(bitmap.as_raw(), width, height, ExtendedColorType::Rgb8) {
        log::warn!("Synthetic JPEG encoding failed: {}", e);
        out.clear();
    }
    out
}

/// Bytes that start like a JPEG but do not decode
pub fn corrupt_jpeg() -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend_from_slice(&[0x13; 60]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_jpeg_decodes() {
        let data = synthetic_jpeg(7, 32, 24);
        assert!(data.starts_with(&[0xFF, 0xD8]));
        let img = image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((img.width(), img.height()), (32, 24));
    }

    #[test]
    fn test_synthetic_bitmaps_differ() {
        let a = synthetic_bitmap(0, 8, 8);
        let b = synthetic_bitmap(1, 8, 8);
        assert_ne!(a.get_pixel(0, 0), b.get_pixel(0, 0));
    }

    #[test]
    fn test_corrupt_jpeg_fails() {
        assert!(image::load_from_memory_with_format(&corrupt_jpeg(), image::ImageFormat::Jpeg).is_err());
    }
}
