//! Campaign run - source, assemble and check every product in a brief.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::Rgb;
use serde::Serialize;

use crate::brief::{CampaignBrief, ProductBrief};
use crate::compliance::{ComplianceChecker, ComplianceReport};
use crate::config::{PipelineConfig, SourceKind, DEFAULT_ASPECT_RATIOS};
use crate::hashing::compute_manifest_hash;
use crate::pipeline::{AssemblyRequest, CreativePipeline, PipelineError};
use crate::raster::{decode_rgb, parse_hex_color};
use crate::source::{AssetDirSource, ImageSource, PlaceholderSource, SourceChain, SourceRequest};
use crate::ENGINE_VERSION;

pub const REPORT_FILE_NAME: &str = "campaign_report.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceDetail {
    pub product_id: String,
    pub aspect_ratio: String,
    pub path: Option<PathBuf>,
    pub content_hash: String,
    pub report: ComplianceReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductVariantFailure {
    pub product_id: String,
    pub aspect_ratio: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    pub campaign_name: String,
    pub engine_version: String,
    pub generated_at: DateTime<Utc>,
    pub products_processed: usize,
    pub creatives_generated: usize,
    pub creative_paths: Vec<PathBuf>,
    pub compliance_summary: ComplianceSummary,
    pub compliance_details: Vec<ComplianceDetail>,
    pub variant_failures: Vec<ProductVariantFailure>,
    pub errors: Vec<String>,
    pub manifest_hash: String,
}

/// Hashed subset of the report: everything except the timestamp.
#[derive(Serialize)]
struct Manifest<'a> {
    campaign_name: &'a str,
    engine_version: &'a str,
    creative_hashes: Vec<(&'a str, &'a str, &'a str)>,
    compliance_summary: &'a ComplianceSummary,
    variant_failures: &'a [ProductVariantFailure],
    errors: &'a [String],
}

impl CampaignReport {
    fn new(campaign_name: &str) -> Self {
        Self {
            campaign_name: campaign_name.to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            generated_at: Utc::now(),
            products_processed: 0,
            creatives_generated: 0,
            creative_paths: vec![],
            compliance_summary: ComplianceSummary::default(),
            compliance_details: vec![],
            variant_failures: vec![],
            errors: vec![],
            manifest_hash: String::new(),
        }
    }

    /// Every product ran and every creative passed.
    pub fn all_passed(&self) -> bool {
        self.errors.is_empty() && self.variant_failures.is_empty() && self.compliance_summary.failed == 0
    }

    fn finalize(&mut self) -> Result<(), PipelineError> {
        let passed = self.compliance_details.iter().filter(|d| d.report.passed).count();
        self.compliance_summary = ComplianceSummary {
            total_checks: self.compliance_details.len(),
            passed,
            failed: self.compliance_details.len() - passed,
        };
        self.creatives_generated = self.compliance_details.len();

        let manifest = Manifest {
            campaign_name: &self.campaign_name,
            engine_version: &self.engine_version,
            creative_hashes: self
                .compliance_details
                .iter()
                .map(|d| (d.product_id.as_str(), d.aspect_ratio.as_str(), d.content_hash.as_str()))
                .collect(),
            compliance_summary: &self.compliance_summary,
            variant_failures: &self.variant_failures,
            errors: &self.errors,
        };
        self.manifest_hash = compute_manifest_hash(&manifest)?;
        Ok(())
    }

    /// Write `campaign_report.json` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE_NAME);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "wrote campaign report");
        Ok(path)
    }
}

/// Runs whole campaigns: one pipeline, one checker, one source chain.
pub struct CampaignRunner {
    pipeline: CreativePipeline,
    checker: ComplianceChecker,
    sources: SourceChain,
    cache: Option<AssetDirSource>,
    seed: u64,
    language: Option<String>,
    default_ratios: Vec<String>,
}

impl CampaignRunner {
    pub fn new(pipeline: CreativePipeline, checker: ComplianceChecker, sources: SourceChain) -> Self {
        Self {
            pipeline,
            checker,
            sources,
            cache: None,
            seed: 42,
            language: None,
            default_ratios: DEFAULT_ASPECT_RATIOS.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Wire everything from configuration. `force_placeholder` skips the asset cache.
    pub fn from_config(config: &PipelineConfig, force_placeholder: bool) -> Result<Self, PipelineError> {
        let profile = config.brand.profile()?;
        let pipeline = CreativePipeline::from_config(config, &profile)?;
        let checker = ComplianceChecker::new(profile, config.compliance.clone());
        let placeholder = || -> Box<dyn ImageSource> { Box::new(PlaceholderSource::new(pipeline.typeface().clone())) };

        let use_assets = !force_placeholder && config.source.kind == SourceKind::Assets;
        let mut sources: Vec<Box<dyn ImageSource>> = vec![];
        if use_assets {
            sources.push(Box::new(AssetDirSource::new(&config.source.asset_root)));
        }
        if !use_assets || config.source.placeholder_fallback {
            sources.push(placeholder());
        }
        let sources = SourceChain::new(sources);

        let mut runner = Self::new(pipeline, checker, sources)
            .with_seed(config.seed)
            .with_default_ratios(config.aspect_ratios.clone());
        if use_assets {
            runner = runner.with_cache(AssetDirSource::new(&config.source.asset_root));
        }
        Ok(runner)
    }

    /// Ratios used for briefs that name none.
    pub fn with_default_ratios(mut self, ratios: Vec<String>) -> Self {
        self.default_ratios = ratios;
        self
    }

    /// Cache non-asset sources here so later campaigns reuse them.
    pub fn with_cache(mut self, cache: AssetDirSource) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Use the brief's translation for `language` as the overlay message.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[tracing::instrument(skip_all, fields(campaign = %brief.campaign_name, products = brief.products.len()))]
    pub fn run(&self, brief: &CampaignBrief, output_dir: &Path) -> Result<CampaignReport, PipelineError> {
        brief.validate()?;
        fs::create_dir_all(output_dir)?;
        let mut report = CampaignReport::new(&brief.campaign_name);

        let message = match &self.language {
            Some(lang) => brief.localized_message(lang),
            None => brief.campaign_message.as_str(),
        };
        let panel_color = brand_panel_color(brief);
        let (ratios, invalid_ratios) = brief.parsed_aspect_ratios(&self.default_ratios);

        for product in &brief.products {
            for (raw, error) in &invalid_ratios {
                tracing::error!(product = %product.product_id, ratio = %raw, error = %error, "skipping unparseable ratio");
                report.variant_failures.push(ProductVariantFailure {
                    product_id: product.product_id.clone(),
                    aspect_ratio: raw.clone(),
                    error: error.clone(),
                });
            }

            let product_dir = output_dir.join(&product.product_id);
            let request = AssemblyRequest {
                product_id: &product.product_id,
                message,
                aspect_ratios: &ratios,
                panel_color,
                output_dir: Some(&product_dir),
            };
            match self.process_product(brief, product, &request, &mut report) {
                Ok(()) => report.products_processed += 1,
                Err(e) => {
                    let msg = format!("Failed to process product {}: {}", product.product_id, e);
                    tracing::error!("{}", msg);
                    report.errors.push(msg);
                }
            }
        }

        report.finalize()?;
        tracing::info!(
            products = report.products_processed,
            creatives = report.creatives_generated,
            failed = report.compliance_summary.failed,
            "campaign complete"
        );
        Ok(report)
    }

    fn process_product(
        &self,
        brief: &CampaignBrief,
        product: &ProductBrief,
        request: &AssemblyRequest<'_>,
        report: &mut CampaignReport,
    ) -> Result<(), PipelineError> {
        let source_request = SourceRequest {
            campaign_name: brief.campaign_name.clone(),
            product_id: product.product_id.clone(),
            product_name: product.product_name.clone(),
            product_description: product.product_description.clone(),
            product_image: product.product_image.clone(),
        };
        let (source_name, bytes) = self.sources.fetch_named(&source_request)?;
        if source_name != "assets" {
            if let Some(cache) = &self.cache {
                cache.store_generated(&brief.campaign_name, &product.product_id, source_name, &bytes)?;
                cache.store_product_asset(&product.product_id, "product.png", &bytes)?;
            }
        }

        let outcome = self.pipeline.assemble(&bytes, request)?;
        for failure in outcome.failures {
            report.variant_failures.push(ProductVariantFailure {
                product_id: product.product_id.clone(),
                aspect_ratio: failure.aspect_ratio,
                error: failure.error,
            });
        }

        let mut decoded = Vec::with_capacity(outcome.variants.len());
        for variant in &outcome.variants {
            decoded.push((variant.aspect_ratio.to_string(), decode_rgb(&variant.encoded)?));
        }
        let checked = self.checker.check_batch(
            decoded.iter().map(|(label, img)| (label.clone(), img)),
            request.message,
            self.seed,
        );

        for (variant, (aspect_ratio, compliance)) in outcome.variants.into_iter().zip(checked) {
            tracing::info!(
                product = %product.product_id,
                ratio = %aspect_ratio,
                passed = compliance.passed,
                "compliance checked"
            );
            if let Some(path) = &variant.path {
                report.creative_paths.push(path.clone());
            }
            report.compliance_details.push(ComplianceDetail {
                product_id: product.product_id.clone(),
                aspect_ratio,
                path: variant.path,
                content_hash: variant.content_hash,
                report: compliance,
            });
        }
        Ok(())
    }
}

fn brand_panel_color(brief: &CampaignBrief) -> Option<Rgb<u8>> {
    let hex = brief.brand_guidelines.primary_color.as_deref()?;
    match parse_hex_color(hex) {
        Ok(color) => Some(color),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring brand primary color");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brand::BrandProfile;
    use crate::config::ComplianceSettings;
    use crate::fonts::Typeface;

    fn brief(ratios: &[&str]) -> CampaignBrief {
        CampaignBrief::from_json(&format!(
            r#"{{
                "campaign_name": "Summer",
                "products": [{{"product_id": "p1", "product_name": "Water"}}],
                "target_region": "US",
                "target_audience": "Everyone",
                "campaign_message": "Stay refreshed all summer long",
                "brand_guidelines": {{"primary_color": "not-a-color"}},
                "localization": {{"translations": {{"es": "Hola a todos, amigos"}}}},
                "aspect_ratios": {}
            }}"#,
            serde_json::to_string(ratios).unwrap()
        ))
        .unwrap()
    }

    fn runner() -> CampaignRunner {
        let pipeline = CreativePipeline::new(Typeface::Bitmap).with_max_edge(256);
        let checker = ComplianceChecker::new(
            BrandProfile::new(vec!["miracle".into()], vec![]),
            ComplianceSettings { min_dimension: 100, ..ComplianceSettings::default() },
        );
        let sources = SourceChain::new(vec![Box::new(PlaceholderSource::new(Typeface::Bitmap).with_size(300))]);
        CampaignRunner::new(pipeline, checker, sources)
    }

    #[test]
    fn test_run_writes_creatives_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = runner().run(&brief(&["1:1", "16:9"]), dir.path()).unwrap();
        assert_eq!(report.products_processed, 1);
        assert_eq!(report.creatives_generated, 2);
        assert_eq!(report.compliance_summary, ComplianceSummary { total_checks: 2, passed: 2, failed: 0 });
        assert!(report.all_passed());
        assert!(dir.path().join("p1").join("16x9").join("p1_16x9.jpg").is_file());
        assert_eq!(report.manifest_hash.len(), 64);

        let path = report.write(dir.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["campaign_name"], "Summer");
        assert_eq!(json["compliance_details"][0]["report"]["passed"], true);
    }

    #[test]
    fn test_bad_ratios_are_recorded_per_product() {
        let dir = tempfile::tempdir().unwrap();
        let report = runner().run(&brief(&["1:1", "wide", "0:16"]), dir.path()).unwrap();
        assert_eq!(report.creatives_generated, 1);
        assert_eq!(report.variant_failures.len(), 2);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_source_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = runner();
        r.sources = SourceChain::new(vec![]);
        let report = r.run(&brief(&["1:1"]), dir.path()).unwrap();
        assert_eq!(report.products_processed, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Failed to process product p1"));
    }

    #[test]
    fn test_placeholder_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        let r = runner().with_cache(AssetDirSource::new(&assets));
        r.run(&brief(&["1:1"]), &dir.path().join("out")).unwrap();
        assert!(assets.join("products").join("p1").join("product.png").is_file());

        let generated: Vec<_> = fs::read_dir(assets.join("generated").join("Summer").join("p1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(generated.len(), 1);
        assert!(generated[0].starts_with("placeholder_") && generated[0].ends_with(".png"));
    }

    #[test]
    fn test_brief_without_ratios_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let report = runner()
            .with_default_ratios(vec!["4:5".into()])
            .run(&brief(&[]), dir.path())
            .unwrap();
        assert_eq!(report.creatives_generated, 1);
        assert_eq!(report.compliance_details[0].aspect_ratio, "4:5");
        assert!(dir.path().join("p1").join("4x5").join("p1_4x5.jpg").is_file());
    }

    #[test]
    fn test_language_selects_translation() {
        let dir = tempfile::tempdir().unwrap();
        let report = runner().with_language("es").run(&brief(&["1:1"]), dir.path()).unwrap();
        let details = &report.compliance_details[0].report.legal_checks["message_length"].details;
        assert!(details.contains("(20 chars)"), "{}", details);

        let report = runner().with_language("fr").run(&brief(&["1:1"]), dir.path()).unwrap();
        let details = &report.compliance_details[0].report.legal_checks["message_length"].details;
        assert!(details.contains("(30 chars)"), "{}", details);
    }

    #[test]
    fn test_from_config_wires_cache_and_ratios() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.max_edge = 900;
        config.aspect_ratios = vec!["1:1".into()];
        config.brand.logo_path = None;
        config.source.asset_root = dir.path().join("assets");

        let runner = CampaignRunner::from_config(&config, false).unwrap();
        let report = runner.run(&brief(&[]), &dir.path().join("out")).unwrap();
        assert_eq!(report.products_processed, 1);
        assert_eq!(report.creatives_generated, 1);
        assert_eq!(report.compliance_details[0].aspect_ratio, "1:1");
        assert!(report.compliance_details[0].report.brand_checks["image_resolution"].passed);
        // Asset cache missed, placeholder fallback was cached for reuse.
        assert!(dir.path().join("assets").join("products").join("p1").join("product.png").is_file());
    }

    #[test]
    fn test_from_config_forced_placeholder_skips_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.max_edge = 900;
        config.brand.logo_path = None;
        config.source.asset_root = dir.path().join("assets");

        let runner = CampaignRunner::from_config(&config, true).unwrap();
        runner.run(&brief(&["1:1"]), &dir.path().join("out")).unwrap();
        assert!(!dir.path().join("assets").exists());
    }

    #[test]
    fn test_manifest_hash_ignores_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let a = runner().run(&brief(&["1:1"]), dir.path()).unwrap();
        let b = runner().run(&brief(&["1:1"]), dir.path()).unwrap();
        assert_eq!(a.manifest_hash, b.manifest_hash);
    }
}
