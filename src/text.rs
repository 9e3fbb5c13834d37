//! Text Layout Engine - greedy word wrap against a measurement oracle.

use serde::Serialize;

use crate::error::{CreativeError, CreativeResult};

/// Line spacing applied to the font's ascent + descent.
pub const LINE_SPACING: f32 = 1.2;

/// Measurement oracle for a font at a fixed pixel size.
pub trait TextMeasure {
    /// Advance width of `text` in pixels.
    fn measure(&self, text: &str) -> u32;

    /// Height of one laid-out line, spacing included.
    fn line_height(&self) -> u32;
}

/// Wrapped lines plus their bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextLayout {
    pub lines: Vec<String>,
    pub line_widths: Vec<u32>,
    pub width: u32,
    pub height: u32,
    pub line_height: u32,
}

impl TextLayout {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Greedy word-granular wrap.
///
/// A token wider than `max_width` on its own is kept whole and overflows.
pub fn wrap_text(text: &str, max_width: u32, measure: &dyn TextMeasure) -> CreativeResult<TextLayout> {
    let mut tokens = text.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return Err(CreativeError::EmptyText);
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for token in tokens {
        if current.is_empty() {
            current.push_str(token);
            continue;
        }
        let candidate = format!("{} {}", current, token);
        if measure.measure(&candidate) > max_width {
            lines.push(std::mem::replace(&mut current, token.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let line_widths: Vec<u32> = lines.iter().map(|l| measure.measure(l)).collect();
    let line_height = measure.line_height();
    Ok(TextLayout {
        width: line_widths.iter().copied().max().unwrap_or(0),
        height: line_height * lines.len() as u32,
        line_height,
        lines,
        line_widths,
    })
}
