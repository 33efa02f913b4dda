use serde::{Deserialize, Serialize};

/// One import call from the CRUD layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub url: String,
    /// Opaque workspace key, only used for namespacing downstream
    pub tenant_id: String,
}

impl ExtractionRequest {
    pub fn new(url: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// Fully rendered (post-JavaScript) page markup.
///
/// Produced by a rendering session after the browser has already been torn down,
/// so holding on to it never keeps a browser process alive.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// URL the session navigated to
    pub url: String,
    pub html: String,
}

impl RenderedDocument {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Structured product attributes pulled from a product page.
///
/// Every field degrades to empty / `None` when no extraction strategy matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFields {
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub model_number: String,
    pub purchase_location: String,
}

impl ProductFields {
    /// True when no strategy produced anything at all
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.description.is_empty()
            && self.price.is_none()
            && self.model_number.is_empty()
    }
}

/// Image URL selected for download
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub url: String,
}

impl ImageCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl AsRef<str> for ImageCandidate {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

/// An image that made it into the asset store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedAsset {
    /// `<uuid>.<ext>`, the key the file-serving endpoint uses
    pub filename: String,
    /// Last path segment of the source URL
    pub original_name: String,
    pub mime_type: String,
    /// Size as reported by the filesystem after the write
    pub size_bytes: u64,
}

/// Pipeline output: always "successful but possibly incomplete"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub fields: ProductFields,
    pub assets: Vec<DownloadedAsset>,
}

impl ExtractionResult {
    /// Result aggregation. Pure composition, no validation.
    pub fn assemble(fields: ProductFields, assets: Vec<DownloadedAsset>) -> Self {
        Self { fields, assets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fields_are_empty() {
        let fields = ProductFields::default();
        assert!(fields.is_empty());
        assert_eq!(fields.price, None);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ExtractionResult::assemble(
            ProductFields {
                name: "Widget".to_string(),
                model_number: "W-1".to_string(),
                price: Some(9.5),
                ..Default::default()
            },
            vec![DownloadedAsset {
                filename: "abc.jpg".to_string(),
                original_name: "widget.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                size_bytes: 42,
            }],
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["fields"]["modelNumber"], "W-1");
        assert_eq!(json["fields"]["price"], 9.5);
        assert_eq!(json["assets"][0]["originalName"], "widget.jpg");
        assert_eq!(json["assets"][0]["sizeBytes"], 42);
    }
}
