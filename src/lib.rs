//! Product Import - product page extraction and image ingestion
//!
//! Takes a link to a third-party product page, renders it in a headless browser,
//! pulls structured product fields out of the rendered document and stores a
//! bounded set of product images in the shared asset store.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;

// Re-export the pipeline surface used by the CRUD layer
pub use application::ProductImportService;
pub use domain::{
    CanonicalUrl, DownloadedAsset, ExtractionRequest, ExtractionResult, ImageCandidate,
    ImportStage, ProductFields, RenderedDocument,
};
pub use infrastructure::{AppConfig, ImportError};
