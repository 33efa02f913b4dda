//! Domain module - Core import entities and value objects
//!
//! Plain data flowing through the import pipeline plus the URL canonicalizer.
//! Nothing in here talks to the network or the filesystem.

pub mod product;
pub mod product_url;
pub mod import_stage;

// Re-export commonly used items for convenience
pub use import_stage::ImportStage;
pub use product::{
    DownloadedAsset, ExtractionRequest, ExtractionResult, ImageCandidate, ProductFields,
    RenderedDocument,
};
pub use product_url::{CanonicalUrl, UrlCanonicalizer};
