//! Pipeline configuration - JSON file, every field defaulted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::brand::BrandProfile;
use crate::error::CreativeResult;
use crate::geometry::DEFAULT_MAX_EDGE;
use crate::overlay::{LogoAnchor, LogoPlacement, OverlayStyle, DEFAULT_PANEL_ALPHA};
use crate::raster::{parse_hex_color, DEFAULT_JPEG_QUALITY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Malformed config {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default = "default_max_edge")]
    pub max_edge: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Seeds brand-color sampling.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    /// Used when a brief names no ratios.
    #[serde(default = "default_aspect_ratios")]
    pub aspect_ratios: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub overlay: OverlaySettings,
    #[serde(default)]
    pub compliance: ComplianceSettings,
    #[serde(default)]
    pub brand: BrandSettings,
    #[serde(default)]
    pub source: SourceSettings,
}

fn default_true() -> bool { true }
fn default_max_edge() -> u32 { DEFAULT_MAX_EDGE }
fn default_jpeg_quality() -> u8 { DEFAULT_JPEG_QUALITY }
fn default_seed() -> u64 { 42 }
fn default_output_dir() -> PathBuf { PathBuf::from("output") }

/// Ratios produced when neither the brief nor the config names any.
pub const DEFAULT_ASPECT_RATIOS: &[&str] = &["1:1", "9:16", "16:9"];

fn default_aspect_ratios() -> Vec<String> {
    DEFAULT_ASPECT_RATIOS.iter().map(|r| r.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_edge: default_max_edge(),
            jpeg_quality: default_jpeg_quality(),
            seed: default_seed(),
            font_path: None,
            aspect_ratios: default_aspect_ratios(),
            output_dir: default_output_dir(),
            overlay: OverlaySettings::default(),
            compliance: ComplianceSettings::default(),
            brand: BrandSettings::default(),
            source: SourceSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config not found, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySettings {
    #[serde(default = "default_padding")]
    pub padding: u32,
    #[serde(default = "default_text_color")]
    pub text_color: String,
    #[serde(default = "default_panel_alpha")]
    pub panel_alpha: u8,
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f32,
    #[serde(default = "default_font_scale")]
    pub font_scale: f32,
    #[serde(default = "default_side_margin")]
    pub side_margin: u32,
    /// Stamp the brand logo on every creative.
    #[serde(default)]
    pub logo: bool,
    #[serde(default = "default_logo_scale")]
    pub logo_scale: f32,
    #[serde(default = "default_logo_padding")]
    pub logo_padding: u32,
    #[serde(default)]
    pub logo_anchor: LogoAnchor,
}

fn default_padding() -> u32 { 40 }
fn default_text_color() -> String { "#FFFFFF".into() }
fn default_panel_alpha() -> u8 { DEFAULT_PANEL_ALPHA }
fn default_min_font_size() -> f32 { 30.0 }
fn default_font_scale() -> f32 { 0.05 }
fn default_side_margin() -> u32 { 50 }
fn default_logo_scale() -> f32 { 0.15 }
fn default_logo_padding() -> u32 { 20 }

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            padding: default_padding(),
            text_color: default_text_color(),
            panel_alpha: default_panel_alpha(),
            min_font_size: default_min_font_size(),
            font_scale: default_font_scale(),
            side_margin: default_side_margin(),
            logo: false,
            logo_scale: default_logo_scale(),
            logo_padding: default_logo_padding(),
            logo_anchor: LogoAnchor::default(),
        }
    }
}

impl OverlaySettings {
    pub fn style(&self) -> CreativeResult<OverlayStyle> {
        Ok(OverlayStyle {
            padding: self.padding,
            text_color: parse_hex_color(&self.text_color)?,
            panel_alpha: self.panel_alpha,
            min_font_size: self.min_font_size,
            font_scale: self.font_scale,
            side_margin: self.side_margin,
            ..OverlayStyle::default()
        })
    }

    pub fn logo_placement(&self) -> LogoPlacement {
        LogoPlacement {
            anchor: self.logo_anchor,
            scale: self.logo_scale,
            padding: self.logo_padding,
        }
    }
}

/// Thresholds for compliance analysis. Heuristic defaults, not invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSettings {
    #[serde(default = "default_min_dimension")]
    pub min_dimension: u32,
    #[serde(default = "default_min_aspect")]
    pub min_aspect: f64,
    #[serde(default = "default_max_aspect")]
    pub max_aspect: f64,
    #[serde(default = "default_min_message_len")]
    pub min_message_len: usize,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_logo_threshold")]
    pub logo_threshold: f64,
    /// Logos larger than this fraction of the creative are rescaled.
    #[serde(default = "default_logo_max_fraction")]
    pub logo_max_fraction: f64,
    #[serde(default = "default_logo_rescale")]
    pub logo_rescale: f64,
    #[serde(default = "default_color_tolerance")]
    pub color_tolerance: f64,
    #[serde(default = "default_color_samples")]
    pub color_samples: usize,
}

fn default_min_dimension() -> u32 { 800 }
fn default_min_aspect() -> f64 { 0.2 }
fn default_max_aspect() -> f64 { 5.0 }
fn default_min_message_len() -> usize { 10 }
fn default_max_message_len() -> usize { 200 }
fn default_logo_threshold() -> f64 { 0.4 }
fn default_logo_max_fraction() -> f64 { 0.5 }
fn default_logo_rescale() -> f64 { 0.3 }
fn default_color_tolerance() -> f64 { 30.0 }
fn default_color_samples() -> usize { 10_000 }

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            min_dimension: default_min_dimension(),
            min_aspect: default_min_aspect(),
            max_aspect: default_max_aspect(),
            min_message_len: default_min_message_len(),
            max_message_len: default_max_message_len(),
            logo_threshold: default_logo_threshold(),
            logo_max_fraction: default_logo_max_fraction(),
            logo_rescale: default_logo_rescale(),
            color_tolerance: default_color_tolerance(),
            color_samples: default_color_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandSettings {
    #[serde(default = "default_prohibited_words")]
    pub prohibited_words: Vec<String>,
    #[serde(default = "default_brand_colors")]
    pub brand_colors: Vec<String>,
    #[serde(default = "default_logo_path")]
    pub logo_path: Option<PathBuf>,
}

fn default_prohibited_words() -> Vec<String> {
    ["guarantee", "cure", "miracle", "free"].iter().map(|s| s.to_string()).collect()
}

fn default_brand_colors() -> Vec<String> {
    ["#FF0000", "#FFFFFF", "#000000"].iter().map(|s| s.to_string()).collect()
}

fn default_logo_path() -> Option<PathBuf> {
    Some(PathBuf::from("assets/brand/logo.png"))
}

impl Default for BrandSettings {
    fn default() -> Self {
        Self {
            prohibited_words: default_prohibited_words(),
            brand_colors: default_brand_colors(),
            logo_path: default_logo_path(),
        }
    }
}

impl BrandSettings {
    pub fn profile(&self) -> CreativeResult<BrandProfile> {
        let profile = BrandProfile::new(self.prohibited_words.clone(), self.brand_colors.clone());
        match &self.logo_path {
            Some(path) => profile.with_logo_file(path),
            None => Ok(profile),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Cached product assets, falling back to a placeholder if enabled.
    #[default]
    Assets,
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSettings {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,
    #[serde(default = "default_true")]
    pub placeholder_fallback: bool,
}

fn default_asset_root() -> PathBuf { PathBuf::from("assets") }

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            asset_root: default_asset_root(),
            placeholder_fallback: true,
        }
    }
}
