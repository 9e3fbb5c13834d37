//! Font metrics oracle and glyph rasterization.
//!
//! Outline fonts go through `fontdue`. Without a usable font file the
//! built-in `Bitmap` face draws `font8x8` glyphs on a fixed advance, so text
//! is never silently dropped.

use std::fs;
use std::path::Path;

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use fontdue::{Font, FontSettings};
use image::{Rgb, RgbImage};

use crate::error::{CreativeError, CreativeResult};
use crate::raster::blend_over;
use crate::text::{TextMeasure, LINE_SPACING};

/// Searched in order when no font path is configured.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Advance per char, in em, for the bitmap face.
const BITMAP_ADVANCE_EM: f32 = 0.6;
const BITMAP_ASCENT_EM: f32 = 0.8;
const BITMAP_DESCENT_EM: f32 = 0.2;

#[derive(Clone)]
pub enum Typeface {
    Outline { font: Box<Font>, name: String },
    /// 8x8 bitmap glyphs stretched over a 0.6 em by 1 em cell.
    Bitmap,
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Typeface::Outline { name, .. } => write!(f, "Typeface::Outline({})", name),
            Typeface::Bitmap => write!(f, "Typeface::Bitmap"),
        }
    }
}

impl Typeface {
    pub fn from_bytes(bytes: &[u8], name: &str) -> CreativeResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| CreativeError::Font(format!("{}: {}", name, e)))?;
        Ok(Typeface::Outline { font: Box::new(font), name: name.to_string() })
    }

    pub fn load(path: &Path) -> CreativeResult<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes, &path.display().to_string())
    }

    /// First loadable system font, if any.
    pub fn discover() -> Option<Self> {
        SYSTEM_FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .filter(|p| p.exists())
            .find_map(|p| Self::load(p).ok())
    }

    /// Configured font, else a system font, else the bitmap face.
    pub fn resolve(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::load(path) {
                Ok(face) => return face,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "configured font unusable"),
            }
        }
        match Self::discover() {
            Some(face) => {
                tracing::debug!(face = ?face, "using system font");
                face
            }
            None => {
                tracing::warn!("no outline font found; falling back to bitmap glyphs");
                Typeface::Bitmap
            }
        }
    }

    pub fn is_outline(&self) -> bool {
        matches!(self, Typeface::Outline { .. })
    }

    pub fn sized(&self, px: f32) -> SizedFace<'_> {
        SizedFace { face: self, px: px.max(1.0) }
    }
}

/// A typeface bound to a pixel size.
pub struct SizedFace<'a> {
    face: &'a Typeface,
    px: f32,
}

impl SizedFace<'_> {
    pub fn px(&self) -> f32 {
        self.px
    }

    /// (ascent, descent) in pixels, both positive.
    fn vertical_metrics(&self) -> (f32, f32) {
        match self.face {
            Typeface::Outline { font, .. } => match font.horizontal_line_metrics(self.px) {
                Some(lm) => (lm.ascent, -lm.descent),
                None => (self.px * BITMAP_ASCENT_EM, self.px * BITMAP_DESCENT_EM),
            },
            Typeface::Bitmap => (self.px * BITMAP_ASCENT_EM, self.px * BITMAP_DESCENT_EM),
        }
    }

    fn advance(&self, text: &str) -> f32 {
        match self.face {
            Typeface::Outline { font, .. } => {
                let mut width = 0.0;
                let mut prev: Option<char> = None;
                for ch in text.chars() {
                    if let Some(p) = prev {
                        width += font.horizontal_kern(p, ch, self.px).unwrap_or(0.0);
                    }
                    width += font.metrics(ch, self.px).advance_width;
                    prev = Some(ch);
                }
                width
            }
            Typeface::Bitmap => text.chars().count() as f32 * self.px * BITMAP_ADVANCE_EM,
        }
    }

    /// Draw one line with its box's top-left at (`x`, `top`).
    pub fn draw_line(&self, canvas: &mut RgbImage, text: &str, x: i32, top: i32, color: Rgb<u8>) {
        match self.face {
            Typeface::Outline { font, .. } => self.draw_outline(font, canvas, text, x, top, color),
            Typeface::Bitmap => self.draw_bitmap(canvas, text, x, top, color),
        }
    }

    fn draw_outline(&self, font: &Font, canvas: &mut RgbImage, text: &str, x: i32, top: i32, color: Rgb<u8>) {
        let (ascent, descent) = self.vertical_metrics();
        let slack = self.line_height() as f32 - (ascent + descent);
        let baseline = top + (slack / 2.0 + ascent).round() as i32;
        let (cw, ch_) = (canvas.width() as i32, canvas.height() as i32);

        let mut cursor = x as f32;
        let mut prev: Option<char> = None;
        for ch in text.chars() {
            if let Some(p) = prev {
                cursor += font.horizontal_kern(p, ch, self.px).unwrap_or(0.0);
            }
            let (metrics, coverage) = font.rasterize(ch, self.px);
            let gx = cursor.round() as i32 + metrics.xmin;
            let gy = baseline - (metrics.height as i32 + metrics.ymin);
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let alpha = coverage[row * metrics.width + col];
                    if alpha == 0 {
                        continue;
                    }
                    let px = gx + col as i32;
                    let py = gy + row as i32;
                    if px < 0 || py < 0 || px >= cw || py >= ch_ {
                        continue;
                    }
                    blend_over(canvas.get_pixel_mut(px as u32, py as u32), color, alpha);
                }
            }
            cursor += metrics.advance_width;
            prev = Some(ch);
        }
    }

    /// Nearest-neighbor scale of each 8x8 glyph onto its cell.
    fn draw_bitmap(&self, canvas: &mut RgbImage, text: &str, x: i32, top: i32, color: Rgb<u8>) {
        let (ascent, descent) = self.vertical_metrics();
        let cell_w = self.px * BITMAP_ADVANCE_EM;
        let cell_h = ascent + descent;
        let slack = self.line_height() as f32 - cell_h;
        let cell_top = (top as f32 + slack / 2.0).round() as i32;
        let (w, h) = (cell_w.round().max(1.0) as i32, cell_h.round().max(1.0) as i32);
        let (cw, ch_) = (canvas.width() as i32, canvas.height() as i32);

        for (i, ch) in text.chars().enumerate() {
            let glyph = bitmap_glyph(ch);
            let left = (x as f32 + i as f32 * cell_w).round() as i32;
            for dy in 0..h {
                let bits = glyph[(dy * 8 / h) as usize];
                let py = cell_top + dy;
                if py < 0 || py >= ch_ {
                    continue;
                }
                for dx in 0..w {
                    let px = left + dx;
                    if (bits >> (dx * 8 / w)) & 1 == 0 || px < 0 || px >= cw {
                        continue;
                    }
                    canvas.put_pixel(px as u32, py as u32, color);
                }
            }
        }
    }
}

/// Glyph rows for `ch`; bit 0 is the leftmost column. Unknown chars draw as `?`.
fn bitmap_glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or_default()
}

impl TextMeasure for SizedFace<'_> {
    fn measure(&self, text: &str) -> u32 {
        self.advance(text).ceil() as u32
    }

    fn line_height(&self) -> u32 {
        let (ascent, descent) = self.vertical_metrics();
        ((ascent + descent) * LINE_SPACING).ceil().max(1.0) as u32
    }
}
