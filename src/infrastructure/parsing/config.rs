//! Parsing configuration for product page extraction
//!
//! Selector chains are kept as data so a new page layout can be supported by
//! appending a strategy instead of touching the parser.

use serde::{Deserialize, Serialize};

/// One extraction attempt, as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategySpec {
    /// Whitespace-normalized text of the first matching element
    Text { selector: String },

    /// Attribute value of the first matching element
    Attribute { selector: String, attribute: String },

    /// Texts of every matching element joined with `delimiter`
    List { selector: String, delimiter: String },

    /// Rows whose text starts with one of `labels`; the value follows the label
    LabeledRow { row_selector: String, labels: Vec<String> },

    /// First capture group of `pattern` applied to the first matching element's text
    Pattern { selector: String, pattern: String },
}

impl StrategySpec {
    pub fn text(selector: &str) -> Self {
        Self::Text {
            selector: selector.to_string(),
        }
    }

    pub fn attribute(selector: &str, attribute: &str) -> Self {
        Self::Attribute {
            selector: selector.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn list(selector: &str, delimiter: &str) -> Self {
        Self::List {
            selector: selector.to_string(),
            delimiter: delimiter.to_string(),
        }
    }

    pub fn labeled_row(row_selector: &str, labels: &[&str]) -> Self {
        Self::LabeledRow {
            row_selector: row_selector.to_string(),
            labels: labels.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    pub fn pattern(selector: &str, pattern: &str) -> Self {
        Self::Pattern {
            selector: selector.to_string(),
            pattern: pattern.to_string(),
        }
    }

    /// Selector string this strategy queries, for diagnostics
    pub fn selector(&self) -> &str {
        match self {
            Self::Text { selector }
            | Self::Attribute { selector, .. }
            | Self::List { selector, .. }
            | Self::Pattern { selector, .. } => selector,
            Self::LabeledRow { row_selector, .. } => row_selector,
        }
    }
}

/// Strategy chains for product detail pages, tried in order per field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductPageSelectors {
    pub title: Vec<StrategySpec>,
    pub description: Vec<StrategySpec>,
    pub price: Vec<StrategySpec>,
    pub model_number: Vec<StrategySpec>,
}

const MODEL_NUMBER_LABELS: &[&str] = &["Item model number", "Model Number", "Model Name", "Part Number"];

impl Default for ProductPageSelectors {
    fn default() -> Self {
        Self {
            title: vec![
                StrategySpec::text("#productTitle"),
                StrategySpec::text("#title span"),
                StrategySpec::text("h1.product-title-word-break"),
                StrategySpec::attribute("meta[property='og:title']", "content"),
                StrategySpec::attribute("meta[name='title']", "content"),
            ],
            description: vec![
                StrategySpec::list("#feature-bullets ul li:not(.aok-hidden) span.a-list-item", "\n"),
                StrategySpec::list("#feature-bullets li", "\n"),
                StrategySpec::list("#featurebullets_feature_div li", "\n"),
                StrategySpec::text("#productDescription"),
                StrategySpec::text("#bookDescription_feature_div"),
                StrategySpec::attribute("meta[name='description']", "content"),
            ],
            price: vec![
                StrategySpec::text("#corePrice_feature_div .a-price .a-offscreen"),
                StrategySpec::text("#corePriceDisplay_desktop_feature_div .a-price .a-offscreen"),
                StrategySpec::text("#priceblock_ourprice"),
                StrategySpec::text("#priceblock_dealprice"),
                StrategySpec::text("#price_inside_buybox"),
                StrategySpec::text("#apex_desktop .a-price .a-offscreen"),
                StrategySpec::text(".a-price .a-offscreen"),
            ],
            model_number: vec![
                StrategySpec::labeled_row("#productDetails_techSpec_section_1 tr", MODEL_NUMBER_LABELS),
                StrategySpec::labeled_row("#productDetails_detailBullets_sections1 tr", MODEL_NUMBER_LABELS),
                StrategySpec::labeled_row("#detailBullets_feature_div li", MODEL_NUMBER_LABELS),
                StrategySpec::labeled_row("table.a-keyvalue tr", MODEL_NUMBER_LABELS),
                StrategySpec::pattern(
                    "#productOverview_feature_div",
                    r"(?i)model\s*(?:name|number)?\s*:?\s*([A-Za-z0-9][A-Za-z0-9\-_./]+)",
                ),
            ],
        }
    }
}

/// Where image URLs are read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSourceSpec {
    pub selector: String,

    /// Attributes tried in order; a JSON object value is read as `{url: [w, h]}`
    pub attributes: Vec<String>,
}

impl ImageSourceSpec {
    pub fn new(selector: &str, attributes: &[&str]) -> Self {
        Self {
            selector: selector.to_string(),
            attributes: attributes.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Image discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSelectors {
    /// Hero image sources, first usable one wins
    pub primary: Vec<ImageSourceSpec>,

    /// Gallery sources, first selector with any match supplies the thumbnails
    pub gallery: Vec<ImageSourceSpec>,

    /// Regex locating the size segment of a thumbnail URL
    pub upgrade_pattern: String,

    /// Replacement producing the high-resolution variant
    pub upgrade_replacement: String,

    /// Candidate cap applied before downloading
    pub max_images: usize,
}

impl Default for ImageSelectors {
    fn default() -> Self {
        use crate::infrastructure::config::defaults::MAX_IMAGES;

        Self {
            primary: vec![
                ImageSourceSpec::new("#landingImage", &["data-old-hires", "data-a-dynamic-image", "src"]),
                ImageSourceSpec::new("#imgTagWrapperId img", &["data-old-hires", "data-a-dynamic-image", "src"]),
                ImageSourceSpec::new("#imgBlkFront", &["data-a-dynamic-image", "src"]),
                ImageSourceSpec::new("#main-image", &["src"]),
                ImageSourceSpec::new("meta[property='og:image']", &["content"]),
            ],
            gallery: vec![
                ImageSourceSpec::new("#altImages li.imageThumbnail img", &["src"]),
                ImageSourceSpec::new("#altImages li.item img", &["src"]),
                ImageSourceSpec::new("#imageBlock_feature_div .imageThumbnail img", &["src"]),
            ],
            upgrade_pattern: r"\._[A-Za-z0-9_,]+_\.".to_string(),
            upgrade_replacement: "._AC_SL1500_.".to_string(),
            max_images: MAX_IMAGES,
        }
    }
}
