//! Geometric Transform - center crop to aspect ratio, then resample.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{CreativeError, CreativeResult};

pub const DEFAULT_MAX_EDGE: u32 = 1920;

/// Target shape of a creative. Not reduced to lowest terms.
///
/// Components are validated at use so a malformed ratio fails only the unit
/// that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn validate(&self) -> CreativeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CreativeError::InvalidDimensions(format!(
                "aspect ratio {} must have positive components",
                self
            )));
        }
        Ok(())
    }

    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Directory/file label, e.g. `16x9`.
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = CreativeError;

    /// Accepts `W:H` or `WxH`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CreativeError::InvalidDimensions(format!("cannot parse aspect ratio '{}'", s));
        let (w, h) = s
            .trim()
            .split_once(|c| c == ':' || c == 'x')
            .ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { width, height })
    }
}

/// Region of the source kept by a center crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Canonical output resolution with the long edge capped at `max_edge`.
///
/// Landscape widths come from the rounded height, so extreme ratios can fall
/// short of `max_edge`: 100:1 at 1920 gives 1900x19, not 1920x19.
pub fn output_dimensions(ratio: AspectRatio, max_edge: u32) -> CreativeResult<(u32, u32)> {
    ratio.validate()?;
    if max_edge == 0 {
        return Err(CreativeError::InvalidDimensions("max edge must be positive".into()));
    }
    let (rw, rh) = (ratio.width as f64, ratio.height as f64);
    let m = max_edge as f64;

    if ratio.width >= ratio.height {
        // Width is derived from the rounded height so it stays within a pixel
        // of the exact ratio.
        let mut h = ((m * rh / rw).round() as u32).max(1);
        let mut w = ((h as f64 * rw / rh).round() as u32).max(1);
        while w > max_edge && h > 1 {
            h -= 1;
            w = ((h as f64 * rw / rh).round() as u32).max(1);
        }
        Ok((w.min(max_edge), h))
    } else {
        let w = ((m * rw / rh).round() as u32).max(1);
        Ok((w, max_edge))
    }
}

/// Largest centered box of the source with the target ratio.
pub fn center_crop_box(source: (u32, u32), ratio: AspectRatio) -> CreativeResult<CropBox> {
    ratio.validate()?;
    let (sw, sh) = source;
    if sw == 0 || sh == 0 {
        return Err(CreativeError::InvalidDimensions(format!("source {}x{} has zero area", sw, sh)));
    }
    let (rw, rh) = (ratio.width as u64, ratio.height as u64);

    let (crop_w, crop_h) = if sw as u64 * rh > sh as u64 * rw {
        let w = (sh as f64 * rw as f64 / rh as f64).round() as u32;
        (w.clamp(1, sw), sh)
    } else {
        let h = (sw as f64 * rh as f64 / rw as f64).round() as u32;
        (sw, h.clamp(1, sh))
    };

    Ok(CropBox {
        left: (sw - crop_w) / 2,
        top: (sh - crop_h) / 2,
        width: crop_w,
        height: crop_h,
    })
}

/// Crop the source to `ratio` around its center and resample with Lanczos3.
pub fn fit_to_aspect(source: &RgbImage, ratio: AspectRatio, max_edge: u32) -> CreativeResult<RgbImage> {
    let (out_w, out_h) = output_dimensions(ratio, max_edge)?;
    let crop = center_crop_box(source.dimensions(), ratio)?;
    tracing::debug!(
        ratio = %ratio,
        crop = ?crop,
        out_w,
        out_h,
        "center crop"
    );
    let cropped = imageops::crop_imm(source, crop.left, crop.top, crop.width, crop.height).to_image();
    Ok(imageops::resize(&cropped, out_w, out_h, FilterType::Lanczos3))
}
