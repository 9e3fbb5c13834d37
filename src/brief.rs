//! Campaign brief - the upstream description of what to produce.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geometry::AspectRatio;
use crate::pipeline::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBrief {
    pub product_id: String,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_description: Option<String>,
    /// Image path relative to the asset root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandGuidelines {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Localization {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub campaign_name: String,
    pub products: Vec<ProductBrief>,
    pub target_region: String,
    pub target_audience: String,
    pub campaign_message: String,
    #[serde(default)]
    pub brand_guidelines: BrandGuidelines,
    #[serde(default)]
    pub localization: Localization,
    /// Empty means "use the configured ratios".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aspect_ratios: Vec<String>,
}

impl CampaignBrief {
    /// Parse and validate a brief from JSON text.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let brief: Self = serde_json::from_str(json)?;
        brief.validate()?;
        Ok(brief)
    }

    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("json"));
        if !is_json {
            return Err(PipelineError::InvalidBrief(format!(
                "unsupported brief format: {} (expected .json)",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Required fields must be non-empty and there must be at least one product.
    ///
    /// Aspect ratio strings are not checked here; a bad ratio fails only its
    /// own variant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let required = [
            ("campaign_name", &self.campaign_name),
            ("target_region", &self.target_region),
            ("target_audience", &self.target_audience),
            ("campaign_message", &self.campaign_message),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PipelineError::InvalidBrief(format!("{} must not be empty", field)));
            }
        }
        if self.products.is_empty() {
            return Err(PipelineError::InvalidBrief("products must contain at least one product".into()));
        }
        for (i, product) in self.products.iter().enumerate() {
            if product.product_id.trim().is_empty() {
                return Err(PipelineError::InvalidBrief(format!("products[{}].product_id must not be empty", i)));
            }
            if product.product_name.trim().is_empty() {
                return Err(PipelineError::InvalidBrief(format!("products[{}].product_name must not be empty", i)));
            }
        }
        Ok(())
    }

    pub fn product(&self, product_id: &str) -> Option<&ProductBrief> {
        self.products.iter().find(|p| p.product_id == product_id)
    }

    /// Message in `language`, falling back to the campaign message.
    pub fn localized_message(&self, language: &str) -> &str {
        self.localization
            .translations
            .get(language)
            .map(String::as_str)
            .unwrap_or(&self.campaign_message)
    }

    /// The brief's ratios, or `fallback` when it names none.
    pub fn effective_aspect_ratios<'a>(&'a self, fallback: &'a [String]) -> &'a [String] {
        if self.aspect_ratios.is_empty() {
            fallback
        } else {
            &self.aspect_ratios
        }
    }

    /// Parse every effective ratio string, keeping the failures alongside.
    pub fn parsed_aspect_ratios(&self, fallback: &[String]) -> (Vec<AspectRatio>, Vec<(String, String)>) {
        let mut ratios = Vec::new();
        let mut invalid = Vec::new();
        for raw in self.effective_aspect_ratios(fallback) {
            match raw.parse::<AspectRatio>() {
                Ok(r) => ratios.push(r),
                Err(e) => invalid.push((raw.clone(), e.to_string())),
            }
        }
        (ratios, invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIEF: &str = r##"{
        "campaign_name": "Summer Refresh",
        "products": [
            {"product_id": "p1", "product_name": "Sparkling Water"},
            {"product_id": "p2", "product_name": "Iced Tea", "product_image": "products/p2/tea.png"}
        ],
        "target_region": "US",
        "target_audience": "Young adults",
        "campaign_message": "Stay refreshed all summer long",
        "brand_guidelines": {"primary_color": "#0055AA"},
        "localization": {"languages": ["en", "es"], "translations": {"es": "Mantente fresco todo el verano"}}
    }"##;

    #[test]
    fn test_parse_with_defaults() {
        let brief = CampaignBrief::from_json(BRIEF).unwrap();
        assert_eq!(brief.products.len(), 2);
        assert!(brief.aspect_ratios.is_empty());
        assert_eq!(brief.brand_guidelines.primary_color.as_deref(), Some("#0055AA"));
        assert_eq!(brief.product("p2").unwrap().product_image.as_deref(), Some("products/p2/tea.png"));
        assert!(brief.product("p3").is_none());
    }

    #[test]
    fn test_ratios_fall_back_to_configured() {
        let mut brief = CampaignBrief::from_json(BRIEF).unwrap();
        let configured = vec!["4:5".to_string()];
        let (ok, bad) = brief.parsed_aspect_ratios(&configured);
        assert_eq!(ok, vec![AspectRatio::new(4, 5)]);
        assert!(bad.is_empty());

        brief.aspect_ratios = vec!["16:9".into()];
        assert_eq!(brief.effective_aspect_ratios(&configured), &["16:9".to_string()][..]);
    }

    #[test]
    fn test_localized_message_falls_back() {
        let brief = CampaignBrief::from_json(BRIEF).unwrap();
        assert_eq!(brief.localized_message("es"), "Mantente fresco todo el verano");
        assert_eq!(brief.localized_message("fr"), "Stay refreshed all summer long");
    }

    #[test]
    fn test_missing_required_field() {
        let err = CampaignBrief::from_json(r#"{"campaign_name": "x", "products": []}"#).unwrap_err();
        assert!(matches!(err, PipelineError::SerializationError(_)));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut brief = CampaignBrief::from_json(BRIEF).unwrap();
        brief.campaign_message = "  ".into();
        assert!(matches!(brief.validate(), Err(PipelineError::InvalidBrief(_))));

        let mut brief = CampaignBrief::from_json(BRIEF).unwrap();
        brief.products.clear();
        assert!(matches!(brief.validate(), Err(PipelineError::InvalidBrief(_))));
    }

    #[test]
    fn test_parsed_ratios_keep_failures() {
        let mut brief = CampaignBrief::from_json(BRIEF).unwrap();
        brief.aspect_ratios = vec!["1:1".into(), "wide".into(), "0:16".into()];
        let (ok, bad) = brief.parsed_aspect_ratios(&[]);
        // 0:16 parses; it is rejected when its variant is rendered.
        assert_eq!(ok, vec![AspectRatio::new(1, 1), AspectRatio::new(0, 16)]);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].0, "wide");
    }

    #[test]
    fn test_from_file_rejects_non_json() {
        let err = CampaignBrief::from_file(Path::new("brief.yaml")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidBrief(_)));
    }
}
