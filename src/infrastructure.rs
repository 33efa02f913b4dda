//! Infrastructure layer: configuration, browser rendering, HTML parsing,
//! HTTP downloads and the asset store

pub mod asset_downloader;
pub mod asset_store;
pub mod browser;
pub mod config;
pub mod http_client;
pub mod import_error;
pub mod logging;
pub mod parsing;
pub mod parsing_error;

pub use asset_downloader::AssetDownloader;
pub use asset_store::AssetStore;
pub use browser::{ChromeRenderer, PageRenderer, RenderingSession};
pub use config::{AppConfig, ConfigError, DownloadConfig, LoggingConfig, RenderConfig, SiteConfig};
pub use http_client::{HttpClient, HttpClientConfig};
pub use import_error::{ImportError, ImportResult, USER_FACING_MESSAGE};
pub use logging::{init_logging, init_logging_with_config};
pub use parsing::{ParseContext, ParsedPage, ParsingError, ParsingResult, ProductPageParser};
