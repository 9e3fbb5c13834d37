//! Brand profile - read-only rules supplied by the caller.

use std::fs;
use std::path::Path;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::error::{CreativeError, CreativeResult};
use crate::raster::{decode_rgba, parse_hex_color};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandProfile {
    /// Matched case-insensitively as whole words.
    #[serde(default)]
    pub prohibited_words: Vec<String>,
    /// `#RRGGBB` strings.
    #[serde(default)]
    pub brand_colors: Vec<String>,
    /// Encoded logo bytes, decoded lazily by the checks that need them.
    #[serde(skip)]
    pub logo: Option<Vec<u8>>,
}

impl BrandProfile {
    pub fn new(prohibited_words: Vec<String>, brand_colors: Vec<String>) -> Self {
        Self { prohibited_words, brand_colors, logo: None }
    }

    pub fn with_logo(mut self, bytes: Vec<u8>) -> Self {
        self.logo = Some(bytes);
        self
    }

    /// Attach the logo at `path`. A missing file leaves the profile logo-less.
    pub fn with_logo_file(mut self, path: &Path) -> CreativeResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "brand logo not found");
            return Ok(self);
        }
        let bytes = fs::read(path).map_err(|e| CreativeError::LogoLoad(format!("{}: {}", path.display(), e)))?;
        self.logo = Some(bytes);
        Ok(self)
    }

    pub fn has_logo(&self) -> bool {
        self.logo.is_some()
    }

    pub fn decode_logo(&self) -> CreativeResult<Option<image::RgbaImage>> {
        self.logo.as_deref().map(decode_rgba).transpose()
    }

    /// Parsed colors paired with their source strings; malformed entries are
    /// returned separately.
    pub fn parsed_colors(&self) -> (Vec<(String, Rgb<u8>)>, Vec<String>) {
        let mut parsed = Vec::new();
        let mut invalid = Vec::new();
        for hex in &self.brand_colors {
            match parse_hex_color(hex) {
                Ok(rgb) => parsed.push((hex.clone(), rgb)),
                Err(_) => invalid.push(hex.clone()),
            }
        }
        (parsed, invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_colors_split_invalid() {
        let profile = BrandProfile::new(vec![], vec!["#FF0000".into(), "red".into(), "00ff00".into()]);
        let (ok, bad) = profile.parsed_colors();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[1].1, Rgb([0, 255, 0]));
        assert_eq!(bad, vec!["red".to_string()]);
    }

    #[test]
    fn test_missing_logo_file_is_not_an_error() {
        let profile = BrandProfile::default()
            .with_logo_file(Path::new("/no/such/logo.png"))
            .unwrap();
        assert!(!profile.has_logo());
    }

    #[test]
    fn test_garbage_logo_fails_on_decode() {
        let profile = BrandProfile::default().with_logo(b"garbage".to_vec());
        assert!(matches!(profile.decode_logo(), Err(CreativeError::LogoLoad(_))));
    }
}
