//! Image sources - where a product's source bytes come from.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use serde::Serialize;

use crate::error::{CreativeError, CreativeResult};
use crate::fonts::Typeface;
use crate::hashing::sha256_hex;
use crate::raster::encode_png;
use crate::text::TextMeasure;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// What a source needs to know about the product.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceRequest {
    pub campaign_name: String,
    pub product_id: String,
    pub product_name: String,
    pub product_description: Option<String>,
    /// Explicit image path from the brief, relative to the asset root.
    pub product_image: Option<String>,
}

/// Capability interface for obtaining encoded source image bytes.
pub trait ImageSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn fetch(&self, request: &SourceRequest) -> CreativeResult<Vec<u8>>;
}

/// Cached assets under `<root>/products/<product_id>/`.
pub struct AssetDirSource {
    root: PathBuf,
}

impl AssetDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn products_dir(&self) -> PathBuf {
        self.root.join("products")
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.root.join("generated")
    }

    /// First image in the product directory, by sorted file name.
    pub fn find_product_asset(&self, product_id: &str) -> Option<PathBuf> {
        self.list_product_assets(product_id).into_iter().next()
    }

    pub fn list_product_assets(&self, product_id: &str) -> Vec<PathBuf> {
        let dir = self.products_dir().join(product_id);
        let Ok(entries) = fs::read_dir(&dir) else {
            return vec![];
        };
        let mut assets: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        assets.sort();
        assets
    }

    /// Store generated bytes as `<kind>_<hash8>.png` under the campaign.
    pub fn store_generated(&self, campaign: &str, product_id: &str, kind: &str, bytes: &[u8]) -> CreativeResult<PathBuf> {
        let dir = self.generated_dir().join(campaign).join(product_id);
        fs::create_dir_all(&dir)?;
        let hash = sha256_hex(bytes);
        let path = dir.join(format!("{}_{}.png", kind, &hash[..8]));
        fs::write(&path, bytes)?;
        tracing::info!(path = %path.display(), "saved generated asset");
        Ok(path)
    }

    /// Copy bytes into the product cache so later campaigns reuse them.
    pub fn store_product_asset(&self, product_id: &str, name: &str, bytes: &[u8]) -> CreativeResult<PathBuf> {
        let dir = self.products_dir().join(product_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        fs::write(&path, bytes)?;
        tracing::info!(path = %path.display(), "saved product asset");
        Ok(path)
    }
}

/// Snapshot of the asset cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageInfo {
    pub storage_path: PathBuf,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub products_count: usize,
    pub generated_campaigns: usize,
}

impl AssetDirSource {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Size and entry counts; missing directories count as empty.
    pub fn storage_info(&self) -> CreativeResult<StorageInfo> {
        let total_size_bytes = dir_size(&self.root)?;
        Ok(StorageInfo {
            storage_path: self.root.clone(),
            total_size_bytes,
            total_size_mb: (total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            products_count: count_entries(&self.products_dir())?,
            generated_campaigns: count_entries(&self.generated_dir())?,
        })
    }

    /// Remove one campaign's generated assets, or all of them.
    pub fn cleanup_generated(&self, campaign: Option<&str>) -> CreativeResult<()> {
        let target = match campaign {
            Some(name) => self.generated_dir().join(name),
            None => self.generated_dir(),
        };
        if !target.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&target)?;
        if campaign.is_none() {
            fs::create_dir_all(&target)?;
        }
        tracing::info!(path = %target.display(), "cleaned up generated assets");
        Ok(())
    }
}

fn dir_size(path: &Path) -> CreativeResult<u64> {
    if !path.is_dir() {
        return Ok(0);
    }
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        total += if meta.is_dir() { dir_size(&entry.path())? } else { meta.len() };
    }
    Ok(total)
}

fn count_entries(path: &Path) -> CreativeResult<usize> {
    if !path.is_dir() {
        return Ok(0);
    }
    Ok(fs::read_dir(path)?.count())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

impl ImageSource for AssetDirSource {
    fn name(&self) -> &'static str { "assets" }

    fn fetch(&self, request: &SourceRequest) -> CreativeResult<Vec<u8>> {
        let path = match &request.product_image {
            Some(explicit) => {
                let candidate = self.root.join(explicit);
                if !candidate.is_file() {
                    return Err(CreativeError::SourceUnavailable(format!(
                        "product image {} not found",
                        candidate.display()
                    )));
                }
                candidate
            }
            None => self.find_product_asset(&request.product_id).ok_or_else(|| {
                CreativeError::SourceUnavailable(format!("no cached asset for product {}", request.product_id))
            })?,
        };
        tracing::info!(product = %request.product_id, path = %path.display(), "using cached asset");
        Ok(fs::read(&path)?)
    }
}

/// Flat placeholder image, labelled with the product name when a font is available.
pub struct PlaceholderSource {
    size: u32,
    face: Typeface,
}

pub const PLACEHOLDER_SIZE: u32 = 1024;
const PLACEHOLDER_BACKGROUND: Rgb<u8> = Rgb([0xE8, 0xE8, 0xE8]);
const PLACEHOLDER_INK: Rgb<u8> = Rgb([0x33, 0x33, 0x33]);

impl PlaceholderSource {
    pub fn new(face: Typeface) -> Self {
        Self { size: PLACEHOLDER_SIZE, face }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }

    pub fn render(&self, request: &SourceRequest) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.size, self.size, PLACEHOLDER_BACKGROUND);
        let sized = self.face.sized((self.size as f32 / 24.0).max(12.0));
        let lines = [request.product_name.as_str(), "[Placeholder Image]"];
        let line_height = sized.line_height() as i32;
        let mut top = self.size as i32 / 2 - line_height;
        for line in lines {
            let width = sized.measure(line) as i32;
            sized.draw_line(&mut img, line, (self.size as i32 - width) / 2, top, PLACEHOLDER_INK);
            top += line_height;
        }
        img
    }
}

impl ImageSource for PlaceholderSource {
    fn name(&self) -> &'static str { "placeholder" }

    fn fetch(&self, request: &SourceRequest) -> CreativeResult<Vec<u8>> {
        tracing::info!(product = %request.product_id, "rendering placeholder source");
        encode_png(&self.render(request))
    }
}

/// Tries each source in order; the first success wins.
pub struct SourceChain {
    sources: Vec<Box<dyn ImageSource>>,
}

impl SourceChain {
    pub fn new(sources: Vec<Box<dyn ImageSource>>) -> Self {
        Self { sources }
    }

    /// Fetch bytes and the name of the source that produced them.
    pub fn fetch_named(&self, request: &SourceRequest) -> CreativeResult<(&'static str, Vec<u8>)> {
        let mut misses = vec![];
        for source in &self.sources {
            match source.fetch(request) {
                Ok(bytes) => return Ok((source.name(), bytes)),
                Err(e) => {
                    tracing::debug!(source = source.name(), error = %e, "source miss");
                    misses.push(format!("{}: {}", source.name(), e));
                }
            }
        }
        Err(CreativeError::SourceUnavailable(if misses.is_empty() {
            "no image sources configured".to_string()
        } else {
            misses.join("; ")
        }))
    }
}

impl ImageSource for SourceChain {
    fn name(&self) -> &'static str { "chain" }

    fn fetch(&self, request: &SourceRequest) -> CreativeResult<Vec<u8>> {
        self.fetch_named(request).map(|(_, bytes)| bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::decode_rgb;

    fn request(product_id: &str) -> SourceRequest {
        SourceRequest {
            campaign_name: "summer".into(),
            product_id: product_id.into(),
            product_name: "Sparkling Water".into(),
            ..SourceRequest::default()
        }
    }

    #[test]
    fn test_asset_dir_finds_image_and_ignores_others() {
        let dir = tempfile::tempdir().unwrap();
        let source = AssetDirSource::new(dir.path());
        let product_dir = dir.path().join("products").join("p1");
        fs::create_dir_all(&product_dir).unwrap();
        fs::write(product_dir.join("notes.txt"), b"x").unwrap();
        fs::write(product_dir.join("hero.PNG"), b"png-bytes").unwrap();

        assert_eq!(source.fetch(&request("p1")).unwrap(), b"png-bytes");
        assert!(matches!(source.fetch(&request("p2")), Err(CreativeError::SourceUnavailable(_))));
    }

    #[test]
    fn test_store_generated_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let source = AssetDirSource::new(dir.path());
        let a = source.store_generated("summer", "p1", "generated", b"abc").unwrap();
        let b = source.store_generated("summer", "p1", "generated", b"abc").unwrap();
        assert_eq!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("generated_") && name.ends_with(".png"));
        assert_eq!(name.len(), "generated_".len() + 8 + ".png".len());
    }

    #[test]
    fn test_placeholder_decodes() {
        let source = PlaceholderSource::new(Typeface::Bitmap).with_size(64);
        let bytes = source.fetch(&request("p1")).unwrap();
        let img = decode_rgb(&bytes).unwrap();
        assert_eq!(img.dimensions(), (64, 64));
        assert_eq!(*img.get_pixel(0, 0), PLACEHOLDER_BACKGROUND);
    }

    #[test]
    fn test_chain_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let chain = SourceChain::new(vec![
            Box::new(AssetDirSource::new(dir.path())),
            Box::new(PlaceholderSource::new(Typeface::Bitmap).with_size(32)),
        ]);
        let (name, bytes) = chain.fetch_named(&request("missing")).unwrap();
        assert_eq!(name, "placeholder");
        assert!(decode_rgb(&bytes).is_ok());
    }

    #[test]
    fn test_empty_chain_errors() {
        let chain = SourceChain::new(vec![]);
        assert!(chain.fetch(&request("p")).is_err());
    }

    #[test]
    fn test_storage_info_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let source = AssetDirSource::new(dir.path());
        let empty = source.storage_info().unwrap();
        assert_eq!((empty.total_size_bytes, empty.products_count, empty.generated_campaigns), (0, 0, 0));

        source.store_product_asset("p1", "product.png", &[0u8; 100]).unwrap();
        source.store_generated("summer", "p1", "placeholder", &[1u8; 50]).unwrap();
        source.store_generated("winter", "p1", "placeholder", &[2u8; 50]).unwrap();
        let info = source.storage_info().unwrap();
        assert_eq!(info.total_size_bytes, 200);
        assert_eq!(info.products_count, 1);
        assert_eq!(info.generated_campaigns, 2);

        source.cleanup_generated(Some("summer")).unwrap();
        assert_eq!(source.storage_info().unwrap().generated_campaigns, 1);
        source.cleanup_generated(None).unwrap();
        assert_eq!(source.storage_info().unwrap().generated_campaigns, 0);
        assert!(source.generated_dir().is_dir());
        assert!(source.find_product_asset("p1").is_some());
    }
}
