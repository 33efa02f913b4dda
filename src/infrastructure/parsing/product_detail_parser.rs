//! Product detail parser
//!
//! Every field is backed by an ordered chain of extraction strategies compiled
//! from [`ProductPageSelectors`]. The first strategy producing non-empty text
//! wins. Running the parser never fails: a field nobody could find stays empty.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::config::{ProductPageSelectors, StrategySpec};
use super::{ParsingError, ParsingResult};
use crate::domain::product::ProductFields;

lazy_static! {
    static ref PRICE_RUN: Regex = Regex::new(r"\d[\d.,]*").expect("price regex is valid");
}

/// Marks Amazon sprinkles around detail-bullet labels
const INVISIBLE_MARKS: &[char] = &['\u{200e}', '\u{200f}', '\u{200b}', '\u{feff}'];

/// A compiled extraction attempt
#[derive(Debug)]
pub enum ExtractionStrategy {
    Text(Selector),
    Attribute(Selector, String),
    List(Selector, String),
    LabeledRow(Selector, Vec<String>),
    Pattern(Selector, Regex),
}

impl ExtractionStrategy {
    pub fn compile(field: &str, spec: &StrategySpec) -> ParsingResult<Self> {
        let selector = Selector::parse(spec.selector())
            .map_err(|e| ParsingError::invalid_selector(field, spec.selector(), e))?;

        Ok(match spec {
            StrategySpec::Text { .. } => Self::Text(selector),
            StrategySpec::Attribute { attribute, .. } => Self::Attribute(selector, attribute.clone()),
            StrategySpec::List { delimiter, .. } => Self::List(selector, delimiter.clone()),
            StrategySpec::LabeledRow { labels, .. } => Self::LabeledRow(
                selector,
                labels.iter().map(|l| normalize_text(l)).filter(|l| !l.is_empty()).collect(),
            ),
            StrategySpec::Pattern { pattern, .. } => {
                let regex = Regex::new(pattern).map_err(|e| ParsingError::invalid_pattern(field, pattern, e))?;
                Self::Pattern(selector, regex)
            }
        })
    }

    /// Run against a document; `None` when nothing non-empty was found
    pub fn apply(&self, html: &Html) -> Option<String> {
        match self {
            Self::Text(selector) => html
                .select(selector)
                .map(|el| normalize_text(&el.text().collect::<String>()))
                .find(|text| !text.is_empty()),

            Self::Attribute(selector, attribute) => html
                .select(selector)
                .filter_map(|el| el.value().attr(attribute))
                .map(normalize_text)
                .find(|value| !value.is_empty()),

            Self::List(selector, delimiter) => {
                let items: Vec<String> = html
                    .select(selector)
                    .map(|el| normalize_text(&el.text().collect::<String>()))
                    .filter(|text| !text.is_empty())
                    .collect();
                (!items.is_empty()).then(|| items.join(delimiter))
            }

            Self::LabeledRow(selector, labels) => html
                .select(selector)
                .find_map(|row| labeled_value(&spaced_text(row), labels)),

            Self::Pattern(selector, regex) => html.select(selector).find_map(|el| {
                let text = spaced_text(el);
                let captures = regex.captures(&text)?;
                let matched = captures.get(1).or_else(|| captures.get(0))?;
                let value = normalize_text(matched.as_str());
                (!value.is_empty()).then_some(value)
            }),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Attribute(..) => "attribute",
            Self::List(..) => "list",
            Self::LabeledRow(..) => "labeled_row",
            Self::Pattern(..) => "pattern",
        }
    }
}

/// Ordered fallback strategies for a single field
#[derive(Debug)]
pub struct StrategyChain {
    field: &'static str,
    strategies: Vec<ExtractionStrategy>,
}

impl StrategyChain {
    /// Compile every spec, skipping broken ones with a warning.
    /// Fails only when specs were given and none of them compiled.
    pub fn compile(field: &'static str, specs: &[StrategySpec]) -> ParsingResult<Self> {
        let mut strategies = Vec::with_capacity(specs.len());
        let mut errors = Vec::new();

        for spec in specs {
            match ExtractionStrategy::compile(field, spec) {
                Ok(strategy) => strategies.push(strategy),
                Err(e) => {
                    warn!("Skipping strategy for {}: {}", field, e);
                    errors.push(e.to_string());
                }
            }
        }

        if strategies.is_empty() && !specs.is_empty() {
            return Err(ParsingError::EmptyStrategyChain {
                field: field.to_string(),
                errors: errors.join("; "),
            });
        }

        Ok(Self { field, strategies })
    }

    pub fn first_match(&self, html: &Html) -> Option<String> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            if let Some(value) = strategy.apply(html) {
                debug!("{} matched by {} strategy #{}", self.field, strategy.kind(), index);
                return Some(value);
            }
        }
        debug!("No strategy matched {}", self.field);
        None
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Extracts [`ProductFields`] from a rendered product page
#[derive(Debug)]
pub struct ProductDetailParser {
    title: StrategyChain,
    description: StrategyChain,
    price: StrategyChain,
    model_number: StrategyChain,
}

impl ProductDetailParser {
    pub fn new(selectors: &ProductPageSelectors) -> ParsingResult<Self> {
        Ok(Self {
            title: StrategyChain::compile("title", &selectors.title)?,
            description: StrategyChain::compile("description", &selectors.description)?,
            price: StrategyChain::compile("price", &selectors.price)?,
            model_number: StrategyChain::compile("model_number", &selectors.model_number)?,
        })
    }

    pub fn extract(&self, html: &Html, purchase_location: &str) -> ProductFields {
        let price_text = self.price.first_match(html);
        let price = price_text.as_deref().and_then(parse_price);
        if let (Some(text), None) = (&price_text, price) {
            warn!("Price text '{}' could not be read as a number", text);
        }

        ProductFields {
            name: self.title.first_match(html).unwrap_or_default(),
            description: self.description.first_match(html).unwrap_or_default(),
            price,
            model_number: self.model_number.first_match(html).unwrap_or_default(),
            purchase_location: purchase_location.to_string(),
        }
    }

    /// Parse raw HTML and extract in one go
    pub fn extract_from_str(&self, html: &str, purchase_location: &str) -> ProductFields {
        let document = Html::parse_document(html);
        self.extract(&document, purchase_location)
    }
}

/// Read the first numeric run of a price string.
///
/// Trailing separators are dropped and commas are treated as thousands
/// separators. Returns `None` for anything that doesn't parse.
pub fn parse_price(text: &str) -> Option<f64> {
    let run = PRICE_RUN.find(text)?.as_str();
    let cleaned: String = run
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Collapse whitespace runs and drop invisible direction marks
pub fn normalize_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || INVISIBLE_MARKS.contains(&c))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Element text with a space between text nodes, so table cells don't run together
fn spaced_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn labeled_value(row_text: &str, labels: &[String]) -> Option<String> {
    labels.iter().find_map(|label| {
        let head = row_text.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        let value = row_text[label.len()..]
            .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
            .trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const WIDGET_PAGE: &str = r#"
        <html><head>
          <meta property="og:title" content="Widget Pro (meta)">
        </head><body>
          <span id="productTitle">
              Widget Pro
          </span>
          <div id="corePrice_feature_div">
            <span class="a-price"><span class="a-offscreen">$49.99</span></span>
          </div>
          <div id="feature-bullets"><ul>
            <li><span class="a-list-item"> Brushed steel body </span></li>
            <li><span class="a-list-item">Two-year warranty</span></li>
            <li><span class="a-list-item">
                Fits standard mounts</span></li>
          </ul></div>
          <div id="detailBullets_feature_div"><ul>
            <li><span>Item model number &#8207; : &#8206; WP-100</span></li>
          </ul></div>
        </body></html>
    "#;

    fn parser() -> ProductDetailParser {
        ProductDetailParser::new(&ProductPageSelectors::default()).unwrap()
    }

    #[test]
    fn test_extracts_widget_page() {
        let fields = parser().extract_from_str(WIDGET_PAGE, "Amazon");
        assert_eq!(fields.name, "Widget Pro");
        assert_eq!(
            fields.description,
            "Brushed steel body\nTwo-year warranty\nFits standard mounts"
        );
        assert_eq!(fields.price, Some(49.99));
        assert_eq!(fields.model_number, "WP-100");
        assert_eq!(fields.purchase_location, "Amazon");
    }

    #[test]
    fn test_falls_back_to_later_strategies() {
        let html = r#"
            <html><head><meta property="og:title" content="Fallback Title"></head><body>
              <div id="productDescription"><p>Plain   paragraph description.</p></div>
              <table id="productDetails_techSpec_section_1">
                <tr><th>Brand</th><td>Acme</td></tr>
                <tr><th>Model Number</th><td>AC-42</td></tr>
              </table>
            </body></html>
        "#;
        let fields = parser().extract_from_str(html, "Amazon");
        assert_eq!(fields.name, "Fallback Title");
        assert_eq!(fields.description, "Plain paragraph description.");
        assert_eq!(fields.model_number, "AC-42");
        assert_eq!(fields.price, None);
    }

    #[test]
    fn test_empty_document_yields_empty_fields() {
        let fields = parser().extract_from_str("<html><body></body></html>", "Amazon");
        assert!(fields.is_empty());
        assert_eq!(fields.purchase_location, "Amazon");
    }

    #[test]
    fn test_whitespace_only_match_is_skipped() {
        let html = r#"<span id="productTitle">   </span><div id="title"><span>Real Title</span></div>"#;
        assert_eq!(parser().extract_from_str(html, "").name, "Real Title");
    }

    #[test]
    fn test_unparseable_winning_price_is_none() {
        let html = r#"
            <span id="priceblock_ourprice">Currently unavailable</span>
            <span id="price_inside_buybox">$10.00</span>
        "#;
        assert_eq!(parser().extract_from_str(html, "").price, None);
    }

    #[test]
    fn test_pattern_strategy_captures_group() {
        let chain = StrategyChain::compile(
            "model_number",
            &[StrategySpec::pattern("#overview", r"Model:\s*(\S+)")],
        )
        .unwrap();
        let html = Html::parse_document(r#"<div id="overview">Brand: Acme Model: ZX-9 Color: red</div>"#);
        assert_eq!(chain.first_match(&html).as_deref(), Some("ZX-9"));
    }

    #[test]
    fn test_invalid_selectors_skipped_unless_all_invalid() {
        let chain = StrategyChain::compile(
            "title",
            &[StrategySpec::text("h1[[["), StrategySpec::text("h1")],
        )
        .unwrap();
        assert_eq!(chain.len(), 1);

        let err = StrategyChain::compile("title", &[StrategySpec::text("h1[[[")]).unwrap_err();
        assert!(matches!(err, ParsingError::EmptyStrategyChain { .. }));
        assert_eq!(err.field(), "title");

        let err = ExtractionStrategy::compile("model_number", &StrategySpec::pattern("div", "(unclosed"))
            .unwrap_err();
        assert!(matches!(err, ParsingError::InvalidPattern { .. }));
    }

    #[rstest]
    #[case("$1,234.56", Some(1234.56))]
    #[case("$49.99", Some(49.99))]
    #[case("USD 12.", Some(12.0))]
    #[case("Price: 1,299 with coupon", Some(1299.0))]
    #[case("£7.50 - £9.00", Some(7.5))]
    #[case("Currently unavailable", None)]
    #[case("", None)]
    fn test_parse_price(#[case] text: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_price(text), expected);
    }

    #[test]
    fn test_normalize_text_strips_marks() {
        assert_eq!(normalize_text("  Item\u{200f} \n model\t\u{200e}number "), "Item model number");
    }
}
