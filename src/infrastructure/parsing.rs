//! HTML parsing for rendered product pages
//!
//! Field extraction and image resolution share one parsed document. `scraper::Html`
//! is not `Send`, so [`ProductPageParser::parse`] does the whole job synchronously
//! and hands back owned results.

pub mod config;
pub mod context;
pub mod error;
pub mod image_resolver;
pub mod product_detail_parser;

pub use config::{ImageSelectors, ImageSourceSpec, ProductPageSelectors, StrategySpec};
pub use context::ParseContext;
pub use error::{ParsingError, ParsingResult};
pub use image_resolver::ImageResolver;
pub use product_detail_parser::{ExtractionStrategy, ProductDetailParser, StrategyChain, parse_price};

use scraper::Html;
use tracing::debug;

use crate::domain::product::{ImageCandidate, ProductFields};

/// Output of a single parse step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub fields: ProductFields,
    pub images: Vec<ImageCandidate>,
}

/// Field extraction plus image resolution over one document
#[derive(Debug)]
pub struct ProductPageParser {
    details: ProductDetailParser,
    images: ImageResolver,
}

impl ProductPageParser {
    pub fn new(selectors: &ProductPageSelectors, images: &ImageSelectors) -> ParsingResult<Self> {
        Ok(Self {
            details: ProductDetailParser::new(selectors)?,
            images: ImageResolver::new(images)?,
        })
    }

    pub fn parse(&self, html: &str, context: &ParseContext) -> ParsedPage {
        let document = Html::parse_document(html);
        let fields = self.details.extract(&document, &context.purchase_location);
        let images = self.images.resolve(&document, &context.page_url);
        debug!(
            "Parsed {}: name={:?}, price={:?}, {} image(s)",
            context.page_url,
            fields.name,
            fields.price,
            images.len()
        );
        ParsedPage { fields, images }
    }
}
