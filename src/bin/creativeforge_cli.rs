//! CreativeForge CLI - campaign creatives from a brief
//!
//! Commands: generate, validate, check, info, cleanup
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation or compliance failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use creativeforge_core::{
    AssetDirSource, CampaignBrief, CampaignRunner, ComplianceChecker, PipelineConfig, Typeface, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "creativeforge-cli")]
#[command(about = "CreativeForge CLI - Campaign Creative Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the pipeline config (defaults apply when absent)
    #[arg(short, long, default_value = "creativeforge.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate creatives for every product in a brief
    Generate {
        /// Campaign brief (JSON)
        brief: PathBuf,

        /// Output directory (default: <outputDir>/<campaign_name>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render placeholder sources instead of using cached assets
        #[arg(long)]
        placeholder: bool,

        /// Use the brief's translation for this language
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Validate a brief without generating anything
    Validate {
        /// Campaign brief (JSON)
        brief: PathBuf,
    },

    /// Run compliance checks on a single creative
    Check {
        /// Creative image
        #[arg(short, long)]
        image: PathBuf,

        /// Campaign message shown with the creative
        #[arg(short, long)]
        message: String,
    },

    /// Show engine version, effective configuration and asset storage
    Info,

    /// Remove cached generated source images
    Cleanup {
        /// Only this campaign (default: every campaign)
        #[arg(long)]
        campaign: Option<String>,
    },
}

fn emit<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => println!(r#"{{"error": "Failed to serialize output: {}"}}"#, e),
    }
}

fn failure(error: impl std::fmt::Display) -> ExitCode {
    emit(&serde_json::json!({ "success": false, "error": error.to_string() }));
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match PipelineConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => return failure(e),
    };

    match cli.command {
        Commands::Generate { brief, output, placeholder, language } => {
            generate(&config, &brief, output, placeholder, language)
        }

        Commands::Validate { brief } => match CampaignBrief::from_file(&brief) {
            Ok(b) => {
                emit(&serde_json::json!({
                    "valid": true,
                    "campaign_name": b.campaign_name,
                    "products": b.products.len(),
                    "aspect_ratios": b.effective_aspect_ratios(&config.aspect_ratios),
                }));
                ExitCode::SUCCESS
            }
            Err(e) => {
                emit(&serde_json::json!({ "valid": false, "error": e.to_string() }));
                ExitCode::from(2)
            }
        },

        Commands::Check { image, message } => {
            let profile = match config.brand.profile() {
                Ok(p) => p,
                Err(e) => return failure(e),
            };
            let bytes = match std::fs::read(&image) {
                Ok(b) => b,
                Err(e) => return failure(format!("{}: {}", image.display(), e)),
            };
            let checker = ComplianceChecker::new(profile, config.compliance.clone());
            match checker.check_encoded(&bytes, &message, config.seed) {
                Ok(report) => {
                    emit(&report);
                    if report.passed {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => failure(e),
            }
        }

        Commands::Info => {
            let face = Typeface::resolve(config.font_path.as_deref());
            let storage = match AssetDirSource::new(&config.source.asset_root).storage_info() {
                Ok(s) => s,
                Err(e) => return failure(e),
            };
            emit(&serde_json::json!({
                "engine_version": ENGINE_VERSION,
                "typeface": format!("{:?}", face),
                "outline_font": face.is_outline(),
                "storage": storage,
                "config": config,
            }));
            ExitCode::SUCCESS
        }

        Commands::Cleanup { campaign } => {
            let assets = AssetDirSource::new(&config.source.asset_root);
            if let Err(e) = assets.cleanup_generated(campaign.as_deref()) {
                return failure(e);
            }
            emit(&serde_json::json!({
                "success": true,
                "cleaned": campaign.unwrap_or_else(|| "all".to_string()),
                "storage_path": assets.root(),
            }));
            ExitCode::SUCCESS
        }
    }
}

fn generate(
    config: &PipelineConfig,
    brief_path: &Path,
    output: Option<PathBuf>,
    placeholder: bool,
    language: Option<String>,
) -> ExitCode {
    let brief = match CampaignBrief::from_file(brief_path) {
        Ok(b) => b,
        Err(e) => {
            emit(&serde_json::json!({ "success": false, "error": e.to_string() }));
            return ExitCode::from(2);
        }
    };

    let mut runner = match CampaignRunner::from_config(config, placeholder) {
        Ok(r) => r,
        Err(e) => return failure(e),
    };
    if let Some(lang) = language {
        runner = runner.with_language(lang);
    }

    let output_dir = output.unwrap_or_else(|| config.output_dir.join(&brief.campaign_name));
    let report = match runner.run(&brief, &output_dir) {
        Ok(r) => r,
        Err(e) => return failure(e),
    };
    if let Err(e) = report.write(&output_dir) {
        return failure(e);
    }

    emit(&report);
    if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}
