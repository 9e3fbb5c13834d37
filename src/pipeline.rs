//! Creative Assembly - one creative per requested aspect ratio.
//!
//! A failing ratio is recorded and skipped; only an undecodable source aborts
//! the product.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage, RgbaImage};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::brand::BrandProfile;
use crate::config::{ConfigError, PipelineConfig};
use crate::error::{CreativeError, CreativeResult};
use crate::fonts::Typeface;
use crate::geometry::{fit_to_aspect, AspectRatio, DEFAULT_MAX_EDGE};
use crate::hashing::sha256_hex;
use crate::overlay::{add_logo_overlay, add_text_overlay, LogoPlacement, OverlayStyle};
use crate::raster::{decode_rgb, encode_jpeg, DEFAULT_JPEG_QUALITY};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Creative error: {0}")]
    Creative(#[from] CreativeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid brief: {0}")]
    InvalidBrief(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One produced creative.
#[derive(Debug, Clone, Serialize)]
pub struct CreativeVariant {
    pub id: String,
    pub product_id: String,
    pub aspect_ratio: AspectRatio,
    pub width: u32,
    pub height: u32,
    pub path: Option<PathBuf>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    /// Encoded JPEG.
    #[serde(skip)]
    pub encoded: Vec<u8>,
}

/// A ratio that produced no creative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantFailure {
    pub aspect_ratio: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub product_id: String,
    pub variants: Vec<CreativeVariant>,
    pub failures: Vec<VariantFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyRequest<'a> {
    pub product_id: &'a str,
    pub message: &'a str,
    pub aspect_ratios: &'a [AspectRatio],
    /// Panel color; translucent black when unset.
    pub panel_color: Option<Rgb<u8>>,
    /// Where creatives are written; in-memory only when unset.
    pub output_dir: Option<&'a Path>,
}

/// The assembly pipeline - crop, overlay, encode, write.
pub struct CreativePipeline {
    face: Typeface,
    style: OverlayStyle,
    logo: Option<(RgbaImage, LogoPlacement)>,
    max_edge: u32,
    jpeg_quality: u8,
}

impl CreativePipeline {
    pub fn new(face: Typeface) -> Self {
        Self {
            face,
            style: OverlayStyle::default(),
            logo: None,
            max_edge: DEFAULT_MAX_EDGE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn from_config(config: &PipelineConfig, profile: &BrandProfile) -> Result<Self, PipelineError> {
        let face = Typeface::resolve(config.font_path.as_deref());
        let mut pipeline = Self::new(face)
            .with_style(config.overlay.style()?)
            .with_max_edge(config.max_edge)
            .with_jpeg_quality(config.jpeg_quality);

        if config.overlay.logo {
            match profile.decode_logo() {
                Ok(Some(logo)) => pipeline = pipeline.with_logo(logo, config.overlay.logo_placement()),
                Ok(None) => tracing::warn!("logo overlay enabled but brand profile has no logo"),
                Err(e) => tracing::error!(error = %e, "logo overlay disabled"),
            }
        }
        Ok(pipeline)
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_logo(mut self, logo: RgbaImage, placement: LogoPlacement) -> Self {
        self.logo = Some((logo, placement));
        self
    }

    pub fn with_max_edge(mut self, max_edge: u32) -> Self {
        self.max_edge = max_edge;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn typeface(&self) -> &Typeface {
        &self.face
    }

    /// `<dir>/<W>x<H>/<product>_<W>x<H>.jpg`
    pub fn variant_path(dir: &Path, product_id: &str, ratio: AspectRatio) -> PathBuf {
        dir.join(ratio.label()).join(format!("{}_{}.jpg", product_id, ratio.label()))
    }

    /// Crop, then overlay the message (skipped when blank) and the logo.
    pub fn render_variant(
        &self,
        source: &RgbImage,
        ratio: AspectRatio,
        message: &str,
        panel_color: Option<Rgb<u8>>,
    ) -> CreativeResult<RgbImage> {
        let mut creative = fit_to_aspect(source, ratio, self.max_edge)?;

        if message.trim().is_empty() {
            tracing::debug!(ratio = %ratio, "empty message, skipping text overlay");
        } else {
            let style = match panel_color {
                Some(color) => self.style.clone().with_panel_color(color),
                None => self.style.clone(),
            };
            creative = add_text_overlay(&creative, message, &self.face, &style)?;
        }

        if let Some((logo, placement)) = &self.logo {
            creative = add_logo_overlay(&creative, logo, placement)?;
        }
        Ok(creative)
    }

    /// Decode the source and assemble every ratio.
    pub fn assemble(&self, source_bytes: &[u8], request: &AssemblyRequest<'_>) -> Result<BatchOutcome, PipelineError> {
        let source = decode_rgb(source_bytes)?;
        Ok(self.assemble_decoded(&source, request))
    }

    #[tracing::instrument(skip_all, fields(product = request.product_id, ratios = request.aspect_ratios.len()))]
    pub fn assemble_decoded(&self, source: &RgbImage, request: &AssemblyRequest<'_>) -> BatchOutcome {
        tracing::info!("generating {} format variants", request.aspect_ratios.len());
        let mut variants = Vec::new();
        let mut failures = Vec::new();

        for &ratio in request.aspect_ratios {
            match self.produce(source, ratio, request) {
                Ok(variant) => {
                    tracing::info!(ratio = %ratio, width = variant.width, height = variant.height, "generated variant");
                    variants.push(variant);
                }
                Err(e) => {
                    tracing::error!(ratio = %ratio, error = %e, "failed to generate variant");
                    failures.push(VariantFailure { aspect_ratio: ratio.to_string(), error: e.to_string() });
                }
            }
        }

        BatchOutcome { product_id: request.product_id.to_string(), variants, failures }
    }

    fn produce(&self, source: &RgbImage, ratio: AspectRatio, request: &AssemblyRequest<'_>) -> CreativeResult<CreativeVariant> {
        let creative = self.render_variant(source, ratio, request.message, request.panel_color)?;
        let encoded = encode_jpeg(&creative, self.jpeg_quality)?;

        let path = match request.output_dir {
            Some(dir) => {
                let path = Self::variant_path(dir, request.product_id, ratio);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, &encoded)?;
                Some(path)
            }
            None => None,
        };

        Ok(CreativeVariant {
            id: Uuid::new_v4().to_string(),
            product_id: request.product_id.to_string(),
            aspect_ratio: ratio,
            width: creative.width(),
            height: creative.height(),
            path,
            content_hash: sha256_hex(&encoded),
            created_at: Utc::now(),
            encoded,
        })
    }
}
