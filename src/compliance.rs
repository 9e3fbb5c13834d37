//! Compliance Analysis - rules produce findings, the report is built once.
//!
//! Only unambiguous violations (prohibited words, sub-floor resolution) fail
//! a report. Heuristic signals (logo correlation, color presence, unusual
//! aspect) are recorded as warnings.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::brand::BrandProfile;
use crate::config::ComplianceSettings;
use crate::error::CreativeResult;
use crate::matching::match_template;
use crate::raster::{decode_rgb, rgb_distance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Brand,
    Legal,
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckCategory::Brand => f.write_str("Brand"),
            CheckCategory::Legal => f.write_str("Legal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEntry {
    pub passed: bool,
    pub details: String,
}

/// One outcome emitted by a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    Check {
        category: CheckCategory,
        name: &'static str,
        passed: bool,
        details: String,
    },
    Warning(String),
}

impl Finding {
    fn brand(name: &'static str, passed: bool, details: impl Into<String>) -> Self {
        Finding::Check { category: CheckCategory::Brand, name, passed, details: details.into() }
    }

    fn legal(name: &'static str, passed: bool, details: impl Into<String>) -> Self {
        Finding::Check { category: CheckCategory::Legal, name, passed, details: details.into() }
    }

    fn warning(message: impl Into<String>) -> Self {
        Finding::Warning(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub passed: bool,
    pub brand_checks: BTreeMap<String, CheckEntry>,
    pub legal_checks: BTreeMap<String, CheckEntry>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ComplianceReport {
    /// Assemble a report. `passed` is the AND of every check entry.
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let mut brand_checks = BTreeMap::new();
        let mut legal_checks = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        for finding in findings {
            match finding {
                Finding::Check { category, name, passed, details } => {
                    if !passed {
                        errors.push(format!("{} check failed: {} - {}", category, name, details));
                    }
                    let entry = CheckEntry { passed, details };
                    match category {
                        CheckCategory::Brand => brand_checks.insert(name.to_string(), entry),
                        CheckCategory::Legal => legal_checks.insert(name.to_string(), entry),
                    };
                }
                Finding::Warning(message) => warnings.push(message),
            }
        }

        let passed = brand_checks.values().chain(legal_checks.values()).all(|c| c.passed);
        Self { passed, brand_checks, legal_checks, warnings, errors }
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &str> {
        self.brand_checks
            .iter()
            .chain(self.legal_checks.iter())
            .filter(|(_, c)| !c.passed)
            .map(|(name, _)| name.as_str())
    }
}

impl fmt::Display for ComplianceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Compliance Report: {} (brand checks: {}, legal checks: {}, warnings: {}, errors: {})",
            if self.passed { "PASSED" } else { "FAILED" },
            self.brand_checks.len(),
            self.legal_checks.len(),
            self.warnings.len(),
            self.errors.len(),
        )
    }
}

/// What a rule sees.
pub struct CheckContext<'a> {
    pub image: &'a RgbImage,
    pub message: &'a str,
    pub profile: &'a BrandProfile,
    pub settings: &'a ComplianceSettings,
}

/// Compliance rule trait - produces findings, never aborts the report.
pub trait ComplianceRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &CheckContext<'_>, rng: &mut dyn RngCore) -> Vec<Finding>;
}

// --- Concrete Rules ---

pub struct ProhibitedWordsRule;

impl ComplianceRule for ProhibitedWordsRule {
    fn name(&self) -> &'static str { "prohibited_words" }

    fn evaluate(&self, ctx: &CheckContext<'_>, _rng: &mut dyn RngCore) -> Vec<Finding> {
        if ctx.message.is_empty() {
            return vec![];
        }
        let text = ctx.message.to_lowercase();
        let mut findings = vec![];
        let mut found: Vec<String> = vec![];

        for word in &ctx.profile.prohibited_words {
            let word = word.trim().to_lowercase();
            if word.is_empty() {
                continue;
            }
            match Regex::new(&format!(r"\b{}\b", regex::escape(&word))) {
                Ok(re) if re.is_match(&text) => found.push(word),
                Ok(_) => {}
                Err(e) => findings.push(Finding::warning(format!("Could not match prohibited word '{}': {}", word, e))),
            }
        }

        if found.is_empty() {
            findings.push(Finding::legal(self.name(), true, "No prohibited words found"));
        } else {
            findings.push(Finding::legal(
                self.name(),
                false,
                format!("Found prohibited words: {}", found.join(", ")),
            ));
        }
        findings
    }
}

pub struct MessageLengthRule;

impl ComplianceRule for MessageLengthRule {
    fn name(&self) -> &'static str { "message_length" }

    fn evaluate(&self, ctx: &CheckContext<'_>, _rng: &mut dyn RngCore) -> Vec<Finding> {
        if ctx.message.is_empty() {
            return vec![Finding::warning("Campaign message is empty")];
        }
        let len = ctx.message.chars().count();
        let (min, max) = (ctx.settings.min_message_len, ctx.settings.max_message_len);
        if len > max {
            vec![Finding::warning(format!("Campaign message is too long ({} chars, max {})", len, max))]
        } else if len < min {
            vec![Finding::warning(format!("Campaign message is too short ({} chars, min {})", len, min))]
        } else {
            vec![Finding::legal(self.name(), true, format!("Message length is appropriate ({} chars)", len))]
        }
    }
}

pub struct ResolutionRule;

impl ComplianceRule for ResolutionRule {
    fn name(&self) -> &'static str { "image_resolution" }

    fn evaluate(&self, ctx: &CheckContext<'_>, _rng: &mut dyn RngCore) -> Vec<Finding> {
        let (w, h) = ctx.image.dimensions();
        let floor = ctx.settings.min_dimension;
        let mut findings = vec![];

        if w < floor || h < floor {
            findings.push(Finding::brand(
                self.name(),
                false,
                format!("Image resolution too low ({}x{}, min {}px)", w, h, floor),
            ));
        } else {
            findings.push(Finding::brand(self.name(), true, format!("Image resolution acceptable ({}x{})", w, h)));
        }

        let aspect = w as f64 / h.max(1) as f64;
        if aspect > ctx.settings.max_aspect || aspect < ctx.settings.min_aspect {
            findings.push(Finding::warning(format!("Unusual aspect ratio ({}:{})", w, h)));
        }
        findings
    }
}

pub struct LogoPresenceRule;

impl LogoPresenceRule {
    /// Shrink a logo that would dominate the creative.
    fn fit_logo(logo: GrayImage, image: (u32, u32), settings: &ComplianceSettings) -> GrayImage {
        let (iw, ih) = (image.0 as f64, image.1 as f64);
        let (lw, lh) = (logo.width() as f64, logo.height() as f64);
        let limit = settings.logo_max_fraction;
        if lw <= iw * limit && lh <= ih * limit {
            return logo;
        }
        let scale = (ih / lh).min(iw / lw) * settings.logo_rescale;
        let w = ((lw * scale) as u32).max(1);
        let h = ((lh * scale) as u32).max(1);
        tracing::debug!(from = ?logo.dimensions(), to = ?(w, h), "rescaling logo for detection");
        imageops::resize(&logo, w, h, FilterType::Triangle)
    }
}

impl ComplianceRule for LogoPresenceRule {
    fn name(&self) -> &'static str { "logo_presence" }

    fn evaluate(&self, ctx: &CheckContext<'_>, _rng: &mut dyn RngCore) -> Vec<Finding> {
        let logo = match ctx.profile.decode_logo() {
            Ok(Some(logo)) => logo,
            Ok(None) => return vec![],
            Err(e) => {
                tracing::error!(error = %e, "failed to load logo for detection");
                return vec![Finding::warning(format!("Could not perform logo detection: {}", e))];
            }
        };

        let image_gray = imageops::grayscale(ctx.image);
        let logo_gray = Self::fit_logo(imageops::grayscale(&logo), image_gray.dimensions(), ctx.settings);
        let score = match_template(&image_gray, &logo_gray).map(|m| m.score).unwrap_or(0.0);
        let threshold = ctx.settings.logo_threshold;

        if score >= threshold {
            vec![Finding::brand(self.name(), true, format!("Logo detected (confidence: {:.2})", score))]
        } else {
            vec![Finding::warning(format!(
                "Logo not clearly detected (confidence: {:.2}, threshold: {})",
                score, threshold
            ))]
        }
    }
}

pub struct BrandColorRule;

impl BrandColorRule {
    /// Distinct colors among up to `limit` uniformly sampled pixels.
    fn sampled_colors(image: &RgbImage, limit: usize, rng: &mut dyn RngCore) -> HashSet<[u8; 3]> {
        let pixels: Vec<[u8; 3]> = image.pixels().map(|p| p.0).collect();
        if pixels.len() <= limit {
            return pixels.into_iter().collect();
        }
        rand::seq::index::sample(rng, pixels.len(), limit)
            .into_iter()
            .map(|i| pixels[i])
            .collect()
    }
}

impl ComplianceRule for BrandColorRule {
    fn name(&self) -> &'static str { "brand_colors" }

    fn evaluate(&self, ctx: &CheckContext<'_>, rng: &mut dyn RngCore) -> Vec<Finding> {
        if ctx.profile.brand_colors.is_empty() {
            return vec![];
        }
        let mut findings = vec![];
        let (colors, invalid) = ctx.profile.parsed_colors();
        for hex in invalid {
            findings.push(Finding::warning(format!("Ignoring malformed brand color '{}'", hex)));
        }

        let samples = Self::sampled_colors(ctx.image, ctx.settings.color_samples, rng);
        let tolerance = ctx.settings.color_tolerance;
        let found: Vec<&str> = colors
            .iter()
            .filter(|(_, brand)| {
                samples
                    .iter()
                    .any(|px| rgb_distance(*brand, image::Rgb(*px)) <= tolerance)
            })
            .map(|(hex, _)| hex.as_str())
            .collect();

        if found.is_empty() {
            findings.push(Finding::warning("Brand colors not prominently detected in image"));
        } else {
            findings.push(Finding::brand(
                self.name(),
                true,
                format!("Found {} brand colors in image ({})", found.len(), found.join(", ")),
            ));
        }
        findings
    }
}

/// Runs every rule against a creative; no rule short-circuits another.
pub struct ComplianceChecker {
    profile: BrandProfile,
    settings: ComplianceSettings,
    rules: Vec<Box<dyn ComplianceRule>>,
}

impl ComplianceChecker {
    pub fn new(profile: BrandProfile, settings: ComplianceSettings) -> Self {
        Self {
            profile,
            settings,
            rules: vec![
                Box::new(ProhibitedWordsRule),
                Box::new(MessageLengthRule),
                Box::new(ResolutionRule),
                Box::new(LogoPresenceRule),
                Box::new(BrandColorRule),
            ],
        }
    }

    pub fn profile(&self) -> &BrandProfile {
        &self.profile
    }

    pub fn settings(&self) -> &ComplianceSettings {
        &self.settings
    }

    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn check(&self, image: &RgbImage, message: &str, rng: &mut dyn RngCore) -> ComplianceReport {
        let ctx = CheckContext { image, message, profile: &self.profile, settings: &self.settings };
        let findings: Vec<Finding> = self
            .rules
            .iter()
            .flat_map(|rule| {
                let out = rule.evaluate(&ctx, rng);
                tracing::trace!(rule = rule.name(), findings = out.len(), "rule evaluated");
                out
            })
            .collect();

        let report = ComplianceReport::from_findings(findings);
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        for error in &report.errors {
            tracing::error!("{}", error);
        }
        tracing::info!(passed = report.passed, "{}", report);
        report
    }

    pub fn check_seeded(&self, image: &RgbImage, message: &str, seed: u64) -> ComplianceReport {
        let mut rng = StdRng::seed_from_u64(seed);
        self.check(image, message, &mut rng)
    }

    /// Decode then check. Undecodable bytes are an `ImageDecode` error.
    pub fn check_encoded(&self, bytes: &[u8], message: &str, seed: u64) -> CreativeResult<ComplianceReport> {
        let image = decode_rgb(bytes)?;
        Ok(self.check_seeded(&image, message, seed))
    }

    /// Check labelled creatives; each gets its own RNG derived from `seed`.
    pub fn check_batch<'a, I>(&self, creatives: I, message: &str, seed: u64) -> Vec<(String, ComplianceReport)>
    where
        I: IntoIterator<Item = (String, &'a RgbImage)>,
    {
        creatives
            .into_iter()
            .enumerate()
            .map(|(i, (label, image))| {
                tracing::info!(creative = %label, "checking compliance");
                let report = self.check_seeded(image, message, seed.wrapping_add(i as u64));
                (label, report)
            })
            .collect()
    }
}
