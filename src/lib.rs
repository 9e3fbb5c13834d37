//! CreativeForge Core - Campaign Creative Engine
//!
//! Two engines:
//! 1. Geometric creative engine: center crop to a target aspect ratio,
//!    resample, wrap text and composite overlays.
//! 2. Compliance analysis engine: prohibited words, message length,
//!    resolution, logo presence and brand colors, reported as pass/fail.
//!
//! Everything around them (briefs, sources, campaign runs) is thin glue.

pub mod error;
pub mod raster;
pub mod geometry;
pub mod text;
pub mod fonts;
pub mod overlay;
pub mod matching;
pub mod brand;
pub mod compliance;
pub mod config;
pub mod hashing;
pub mod source;
pub mod pipeline;
pub mod brief;
pub mod campaign;

pub use error::{CreativeError, CreativeResult};
pub use geometry::{center_crop_box, fit_to_aspect, output_dimensions, AspectRatio, CropBox};
pub use text::{wrap_text, TextLayout, TextMeasure};
pub use fonts::Typeface;
pub use overlay::{add_logo_overlay, add_text_overlay, LogoAnchor, LogoPlacement, OverlayStyle};
pub use matching::{match_template, MatchResult};
pub use brand::BrandProfile;
pub use compliance::{CheckCategory, CheckEntry, ComplianceChecker, ComplianceReport, ComplianceRule};
pub use config::{ConfigError, PipelineConfig};
pub use hashing::{canonical_json, compute_manifest_hash, sha256_hex};
pub use source::{AssetDirSource, ImageSource, PlaceholderSource, SourceChain, SourceRequest, StorageInfo};
pub use pipeline::{AssemblyRequest, BatchOutcome, CreativePipeline, CreativeVariant, PipelineError, VariantFailure};
pub use brief::CampaignBrief;
pub use campaign::{CampaignReport, CampaignRunner};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
