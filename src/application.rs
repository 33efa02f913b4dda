//! Application layer module
//!
//! Orchestrates the import pipeline on top of the domain types and the
//! infrastructure adapters.

pub mod product_import;

pub use product_import::ProductImportService;
