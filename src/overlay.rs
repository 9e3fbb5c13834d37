//! Overlay Compositor - message panel and logo placement.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{CreativeError, CreativeResult};
use crate::fonts::Typeface;
use crate::text::{wrap_text, TextLayout};

pub const DEFAULT_PANEL_ALPHA: u8 = 180;

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// Panel padding around the text box, also used as the bottom margin.
    pub padding: u32,
    pub text_color: Rgb<u8>,
    pub panel_color: Rgb<u8>,
    pub panel_alpha: u8,
    pub min_font_size: f32,
    /// Font size as a fraction of image height.
    pub font_scale: f32,
    /// Horizontal margin on each side reserved when wrapping.
    pub side_margin: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            padding: 40,
            text_color: Rgb([255, 255, 255]),
            panel_color: Rgb([0, 0, 0]),
            panel_alpha: DEFAULT_PANEL_ALPHA,
            min_font_size: 30.0,
            font_scale: 0.05,
            side_margin: 50,
        }
    }
}

impl OverlayStyle {
    pub fn with_panel_color(mut self, color: Rgb<u8>) -> Self {
        self.panel_color = color;
        self
    }

    pub fn font_size_for(&self, image_height: u32) -> f32 {
        (image_height as f32 * self.font_scale).floor().max(self.min_font_size)
    }

    pub fn wrap_width_for(&self, image_width: u32) -> u32 {
        image_width.saturating_sub(self.side_margin * 2).max(1)
    }
}

/// Pixel rectangle, may extend past the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Panel around `layout`, centered horizontally, bottom edge `padding` above the image bottom.
pub fn panel_rect(image: (u32, u32), layout: &TextLayout, padding: u32) -> PanelRect {
    let (w, h) = (image.0 as i64, image.1 as i64);
    let pad = padding as i64;
    let text_x = (w - layout.width as i64) / 2;
    let text_y = h - layout.height as i64 - pad * 2;
    PanelRect {
        x: text_x - pad,
        y: text_y - pad,
        width: layout.width + padding * 2,
        height: layout.height + padding * 2,
    }
}

fn fill_rect(canvas: &mut RgbImage, rect: PanelRect, color: Rgb<u8>, alpha: u8) {
    let x0 = rect.x.max(0) as u32;
    let y0 = rect.y.max(0) as u32;
    let x1 = (rect.x + rect.width as i64).clamp(0, canvas.width() as i64) as u32;
    let y1 = (rect.y + rect.height as i64).clamp(0, canvas.height() as i64) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            crate::raster::blend_over(canvas.get_pixel_mut(x, y), color, alpha);
        }
    }
}

/// Draw a pre-computed layout onto a copy of `image`.
pub fn draw_text_overlay(
    image: &RgbImage,
    layout: &TextLayout,
    face: &Typeface,
    font_size: f32,
    style: &OverlayStyle,
) -> RgbImage {
    let mut canvas = image.clone();
    let panel = panel_rect(canvas.dimensions(), layout, style.padding);
    fill_rect(&mut canvas, panel, style.panel_color, style.panel_alpha);

    let sized = face.sized(font_size);
    let center_x = panel.x + panel.width as i64 / 2;
    let mut top = panel.y + style.padding as i64;
    for (line, width) in layout.lines.iter().zip(&layout.line_widths) {
        let x = center_x - *width as i64 / 2;
        sized.draw_line(&mut canvas, line, x as i32, top as i32, style.text_color);
        top += layout.line_height as i64;
    }
    canvas
}

/// Size the font to the image, wrap `message`, and draw it.
///
/// Fails with `EmptyText` for a blank message.
pub fn add_text_overlay(
    image: &RgbImage,
    message: &str,
    face: &Typeface,
    style: &OverlayStyle,
) -> CreativeResult<RgbImage> {
    let font_size = style.font_size_for(image.height());
    let sized = face.sized(font_size);
    let layout = wrap_text(message, style.wrap_width_for(image.width()), &sized)?;
    tracing::debug!(lines = layout.line_count(), width = layout.width, height = layout.height, font_size, "text layout");
    Ok(draw_text_overlay(image, &layout, face, font_size, style))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogoAnchor {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

impl fmt::Display for LogoAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogoAnchor::TopLeft => "top-left",
            LogoAnchor::TopRight => "top-right",
            LogoAnchor::BottomLeft => "bottom-left",
            LogoAnchor::BottomRight => "bottom-right",
        };
        f.write_str(s)
    }
}

impl FromStr for LogoAnchor {
    type Err = CreativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(LogoAnchor::TopLeft),
            "top-right" => Ok(LogoAnchor::TopRight),
            "bottom-left" => Ok(LogoAnchor::BottomLeft),
            "bottom-right" => Ok(LogoAnchor::BottomRight),
            other => Err(CreativeError::InvalidDimensions(format!("unknown logo anchor '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoPlacement {
    pub anchor: LogoAnchor,
    /// Logo width as a fraction of image width.
    pub scale: f32,
    pub padding: u32,
}

impl Default for LogoPlacement {
    fn default() -> Self {
        Self { anchor: LogoAnchor::TopRight, scale: 0.15, padding: 20 }
    }
}

/// Top-left corner of a `logo`-sized box at `placement`.
pub fn logo_origin(image: (u32, u32), logo: (u32, u32), placement: &LogoPlacement) -> (i64, i64) {
    let (iw, ih) = (image.0 as i64, image.1 as i64);
    let (lw, lh) = (logo.0 as i64, logo.1 as i64);
    let pad = placement.padding as i64;
    match placement.anchor {
        LogoAnchor::TopLeft => (pad, pad),
        LogoAnchor::TopRight => (iw - lw - pad, pad),
        LogoAnchor::BottomLeft => (pad, ih - lh - pad),
        LogoAnchor::BottomRight => (iw - lw - pad, ih - lh - pad),
    }
}

/// Scale `logo` proportionally and alpha-blend it onto a copy of `image`.
pub fn add_logo_overlay(image: &RgbImage, logo: &RgbaImage, placement: &LogoPlacement) -> CreativeResult<RgbImage> {
    if logo.width() == 0 || logo.height() == 0 {
        return Err(CreativeError::LogoLoad("logo has zero area".into()));
    }
    let target_w = ((image.width() as f32 * placement.scale) as u32).max(1);
    let target_h = ((target_w as f64 * logo.height() as f64 / logo.width() as f64) as u32).max(1);
    let scaled = imageops::resize(logo, target_w, target_h, FilterType::Lanczos3);

    let mut canvas = image.clone();
    let (ox, oy) = logo_origin(canvas.dimensions(), scaled.dimensions(), placement);
    for (lx, ly, px) in scaled.enumerate_pixels() {
        let x = ox + lx as i64;
        let y = oy + ly as i64;
        if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
            continue;
        }
        let alpha = px[3];
        if alpha == 0 {
            continue;
        }
        crate::raster::blend_over(canvas.get_pixel_mut(x as u32, y as u32), Rgb([px[0], px[1], px[2]]), alpha);
    }
    Ok(canvas)
}
