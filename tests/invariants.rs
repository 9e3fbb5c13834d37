//! Contract Invariant Tests
//!
//! These tests verify the guarantees callers rely on.

use image::{Rgb, RgbImage};

use creativeforge_core::{
    center_crop_box, output_dimensions,
    config::ComplianceSettings,
    raster::encode_png,
    AspectRatio, AssemblyRequest, BrandProfile, ComplianceChecker, CreativeError, CreativePipeline,
    PipelineError, Typeface,
};

fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        let v = (x * 160 / w + y * 80 / h) as u8;
        Rgb([v, v / 2 + 60, 255 - v])
    })
}

fn quadrant_logo() -> RgbImage {
    RgbImage::from_fn(100, 100, |x, y| {
        let v = match (x < 50, y < 50) {
            (true, true) => 30,
            (false, true) => 220,
            (true, false) => 200,
            (false, false) => 60,
        };
        Rgb([v, v, v])
    })
}

fn checker(profile: BrandProfile) -> ComplianceChecker {
    ComplianceChecker::new(profile, ComplianceSettings::default())
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

const MESSAGE: &str = "Stay refreshed all summer long";

#[test]
fn invariant_bad_ratio_fails_only_its_variant() {
    let source = encode_png(&gradient(400, 300)).unwrap();
    let ratios = [AspectRatio::new(1, 1), AspectRatio::new(0, 16), AspectRatio::new(16, 9)];
    let request = AssemblyRequest {
        product_id: "p1",
        message: MESSAGE,
        aspect_ratios: &ratios,
        panel_color: None,
        output_dir: None,
    };
    let outcome = CreativePipeline::new(Typeface::Bitmap)
        .with_max_edge(400)
        .assemble(&source, &request)
        .unwrap();

    assert_eq!(outcome.variants.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.variants[0].aspect_ratio, AspectRatio::new(1, 1));
    assert_eq!(outcome.variants[1].aspect_ratio, AspectRatio::new(16, 9));
}

#[test]
fn invariant_undecodable_source_is_fatal_for_product() {
    let ratios = [AspectRatio::new(1, 1)];
    let request = AssemblyRequest {
        product_id: "p1",
        message: MESSAGE,
        aspect_ratios: &ratios,
        panel_color: None,
        output_dir: None,
    };
    let err = CreativePipeline::new(Typeface::Bitmap)
        .assemble(b"definitely not an image", &request)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Creative(CreativeError::ImageDecode(_))));
}

#[test]
fn invariant_creatives_written_at_conventional_paths() {
    let dir = tempfile::tempdir().unwrap();
    let source = encode_png(&gradient(640, 480)).unwrap();
    let ratios = [AspectRatio::new(1, 1), AspectRatio::new(9, 16)];
    let request = AssemblyRequest {
        product_id: "sku-7",
        message: MESSAGE,
        aspect_ratios: &ratios,
        panel_color: Some(Rgb([0, 85, 170])),
        output_dir: Some(dir.path()),
    };
    let outcome = CreativePipeline::new(Typeface::Bitmap)
        .with_max_edge(480)
        .assemble(&source, &request)
        .unwrap();

    for (variant, label) in outcome.variants.iter().zip(["1x1", "9x16"]) {
        let expected = dir.path().join(label).join(format!("sku-7_{}.jpg", label));
        assert_eq!(variant.path.as_deref(), Some(expected.as_path()));
        let written = image::open(&expected).unwrap();
        assert_eq!((written.width(), written.height()), (variant.width, variant.height));
    }
}

#[test]
fn invariant_crop_is_contained_and_matches_ratio() {
    let sources = [(1024, 768), (333, 1000), (1, 1), (4000, 7), (1920, 1080)];
    let ratios = [(1, 1), (9, 16), (16, 9), (4, 5), (21, 9)];
    for &(sw, sh) in &sources {
        for &(rw, rh) in &ratios {
            let ratio = AspectRatio::new(rw, rh);
            let crop = center_crop_box((sw, sh), ratio).unwrap();
            assert!(crop.width >= 1 && crop.height >= 1);
            assert!(crop.left + crop.width <= sw && crop.top + crop.height <= sh);

            let (ow, oh) = output_dimensions(ratio, 1920).unwrap();
            assert_eq!(ow.max(oh), 1920);
            assert!((ow as f64 / oh as f64 - ratio.as_f64()).abs() < 1.0 / oh as f64);
        }
    }
}

#[test]
fn invariant_zero_ratio_rejected() {
    let err = center_crop_box((100, 100), AspectRatio::new(0, 16)).unwrap_err();
    assert!(matches!(err, CreativeError::InvalidDimensions(_)));
}

#[test]
fn invariant_embedded_logo_is_detected() {
    let logo = quadrant_logo();
    let mut creative = gradient(1920, 1080);
    image::imageops::replace(&mut creative, &logo, 1700, 120);

    let profile = BrandProfile::new(vec![], vec![]).with_logo(encode_png(&logo).unwrap());
    let report = checker(profile).check_seeded(&creative, MESSAGE, 7);
    let entry = report.brand_checks.get("logo_presence").expect("logo check recorded");
    assert!(entry.passed);
    assert!(entry.details.starts_with("Logo detected (confidence: "));
}

#[test]
fn invariant_missing_logo_is_only_a_warning() {
    let profile = BrandProfile::new(vec![], vec![]).with_logo(encode_png(&quadrant_logo()).unwrap());
    let report = checker(profile).check_seeded(&gradient(1920, 1080), MESSAGE, 7);
    assert!(!report.brand_checks.contains_key("logo_presence"));
    assert!(report.warnings.iter().any(|w| w.starts_with("Logo not clearly detected")));
    assert!(report.passed);
}

#[test]
fn invariant_brand_color_presence() {
    let profile = BrandProfile::new(vec![], words(&["#FF0000"]));
    let c = checker(profile);

    let red = RgbImage::from_pixel(1000, 1000, Rgb([250, 5, 5]));
    let report = c.check_seeded(&red, MESSAGE, 1);
    assert!(report.brand_checks["brand_colors"].passed);

    let green = RgbImage::from_pixel(1000, 1000, Rgb([0, 200, 0]));
    let report = c.check_seeded(&green, MESSAGE, 1);
    assert!(!report.brand_checks.contains_key("brand_colors"));
    assert!(report.warnings.contains(&"Brand colors not prominently detected in image".to_string()));
    assert!(report.passed);
}

#[test]
fn invariant_resolution_floor() {
    let c = checker(BrandProfile::default());

    let report = c.check_seeded(&gradient(1920, 1080), MESSAGE, 1);
    assert!(report.brand_checks["image_resolution"].passed);
    assert!(report.passed);

    let report = c.check_seeded(&gradient(400, 400), MESSAGE, 1);
    assert!(!report.brand_checks["image_resolution"].passed);
    assert!(!report.passed);
    assert!(report.errors.iter().any(|e| e.starts_with("Brand check failed: image_resolution - ")));
}

#[test]
fn invariant_prohibited_words_fail_legal_check() {
    let c = checker(BrandProfile::new(words(&["guarantee", "cure", "miracle", "free"]), vec![]));
    let report = c.check_seeded(&gradient(1000, 1000), "This miracle drink is the cure for summer heat", 1);

    let entry = &report.legal_checks["prohibited_words"];
    assert!(!entry.passed);
    assert!(entry.details.contains("cure") && entry.details.contains("miracle"));
    assert!(!entry.details.contains("free"));
    assert!(!report.passed);
}

#[test]
fn invariant_whole_word_matching_only() {
    let c = checker(BrandProfile::new(words(&["free"]), vec![]));
    let report = c.check_seeded(&gradient(1000, 1000), "Enjoy a carefree freedom this summer", 1);
    assert!(report.legal_checks["prohibited_words"].passed);
}

#[test]
fn invariant_passed_iff_no_failed_check() {
    let c = checker(BrandProfile::new(words(&["miracle"]), words(&["#FF0000"])));
    let cases: [(RgbImage, &str); 4] = [
        (gradient(1000, 1000), MESSAGE),
        (gradient(400, 400), MESSAGE),
        (gradient(1000, 1000), "A miracle in every bottle"),
        (gradient(1000, 1000), ""),
    ];
    for (image, message) in &cases {
        let report = c.check_seeded(image, message, 3);
        let any_failed = report.failed_checks().next().is_some();
        assert_eq!(report.passed, !any_failed);
        assert_eq!(report.errors.len(), report.failed_checks().count());
    }
}

#[test]
fn invariant_checks_do_not_short_circuit() {
    let c = checker(BrandProfile::new(words(&["miracle"]), words(&["#FF0000"])));
    let report = c.check_seeded(&gradient(400, 400), "miracle", 3);
    assert!(!report.brand_checks["image_resolution"].passed);
    assert!(!report.legal_checks["prohibited_words"].passed);
    assert!(report.warnings.iter().any(|w| w.starts_with("Campaign message is too short")));
}
