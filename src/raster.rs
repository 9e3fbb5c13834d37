//! Image Buffer - decoded rasters and codec helpers.
//!
//! Every stage downstream works on owned `RgbImage` buffers. Logos keep
//! their alpha channel as `RgbaImage`.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, RgbaImage};

use crate::error::{CreativeError, CreativeResult};

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Decode PNG/JPEG/WebP bytes into an 8-bit RGB raster.
pub fn decode_rgb(bytes: &[u8]) -> CreativeResult<RgbImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CreativeError::ImageDecode(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(CreativeError::ImageDecode("image has zero area".into()));
    }
    Ok(img.to_rgb8())
}

/// Decode a logo, keeping transparency.
pub fn decode_rgba(bytes: &[u8]) -> CreativeResult<RgbaImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CreativeError::LogoLoad(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(CreativeError::LogoLoad("logo has zero area".into()));
    }
    Ok(img.to_rgba8())
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> CreativeResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality.clamp(1, 100));
    encoder
        .encode(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(|e| CreativeError::Encode(format!("JPEG: {}", e)))?;
    Ok(buffer)
}

pub fn encode_png(img: &RgbImage) -> CreativeResult<Vec<u8>> {
    let mut buffer = Vec::new();
    PngEncoder::new(Cursor::new(&mut buffer))
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(|e| CreativeError::Encode(format!("PNG: {}", e)))?;
    Ok(buffer)
}

/// Parse `#RRGGBB` (leading `#` optional).
pub fn parse_hex_color(hex: &str) -> CreativeResult<Rgb<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CreativeError::InvalidColor(hex.to_string()));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| CreativeError::InvalidColor(hex.to_string()))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

pub fn to_hex(color: Rgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}

/// Euclidean distance in RGB space.
pub fn rgb_distance(a: Rgb<u8>, b: Rgb<u8>) -> f64 {
    let d = |i: usize| a[i] as f64 - b[i] as f64;
    (d(0) * d(0) + d(1) * d(1) + d(2) * d(2)).sqrt()
}

/// Blend `fg` over `dst` with `alpha` in 0..=255.
pub fn blend_over(dst: &mut Rgb<u8>, fg: Rgb<u8>, alpha: u8) {
    let a = alpha as u32;
    let inv = 255 - a;
    for i in 0..3 {
        dst[i] = ((fg[i] as u32 * a + dst[i] as u32 * inv + 127) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip_uppercase() {
        let c = parse_hex_color("#ff8000").unwrap();
        assert_eq!(c, Rgb([255, 128, 0]));
        assert_eq!(to_hex(c), "#FF8000");
    }

    #[test]
    fn test_hex_without_hash() {
        assert_eq!(parse_hex_color("00FF00").unwrap(), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_hex_rejects_malformed() {
        assert!(parse_hex_color("#FFF").is_err());
        assert!(parse_hex_color("#GG0000").is_err());
        assert!(parse_hex_color("").is_err());
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = decode_rgb(b"not an image").unwrap_err();
        assert!(matches!(err, CreativeError::ImageDecode(_)));
    }

    #[test]
    fn test_png_encode_decode() {
        let img = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let bytes = encode_png(&img).unwrap();
        let back = decode_rgb(&bytes).unwrap();
        assert_eq!(back.dimensions(), (4, 3));
        assert_eq!(*back.get_pixel(2, 1), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_jpeg_has_soi_marker() {
        let img = RgbImage::from_pixel(16, 16, Rgb([200, 0, 0]));
        let bytes = encode_jpeg(&img, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_blend_extremes() {
        let mut px = Rgb([0, 0, 0]);
        blend_over(&mut px, Rgb([255, 255, 255]), 255);
        assert_eq!(px, Rgb([255, 255, 255]));
        blend_over(&mut px, Rgb([0, 0, 0]), 0);
        assert_eq!(px, Rgb([255, 255, 255]));
    }

    #[test]
    fn test_distance() {
        assert_eq!(rgb_distance(Rgb([0, 0, 0]), Rgb([3, 4, 0])), 5.0);
    }
}
