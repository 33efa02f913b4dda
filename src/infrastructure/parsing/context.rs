//! Per-page parsing context

use url::Url;

/// What the parsers need to know about the page besides its markup
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Final page URL, used to resolve relative image links
    pub page_url: Url,

    /// Display name of the store the page belongs to
    pub purchase_location: String,
}

impl ParseContext {
    pub fn new(page_url: Url, purchase_location: impl Into<String>) -> Self {
        Self {
            page_url,
            purchase_location: purchase_location.into(),
        }
    }
}
