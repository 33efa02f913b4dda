//! Configuration infrastructure
//!
//! Everything the pipeline used to keep as module-level constants (domain
//! allow-lists, selector chains, timeouts) lives here as plain values that are
//! injected at construction time.
//!
//! Loading is layered with the `config` crate:
//! 1. Built-in defaults (`AppConfig::default()`)
//! 2. Optional config file (TOML / JSON / YAML, picked by extension)
//! 3. `PRODUCT_IMPORT__*` environment variables

#![allow(clippy::derivable_impls)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::infrastructure::parsing::config::{ImageSelectors, ProductPageSelectors};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Complete import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Which product site we accept links from
    pub site: SiteConfig,

    /// Headless browser settings
    pub render: RenderConfig,

    /// Image download settings
    pub download: DownloadConfig,

    /// Primary/gallery image selectors and the thumbnail upgrade rule
    pub images: ImageSelectors,

    /// Field extraction strategy chains
    pub selectors: ProductPageSelectors,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Allowed product site and how its product links are shaped
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Display name, reported as the purchase location
    pub name: String,

    /// Registrable domains we accept (subdomains of these match too)
    pub allowed_domains: Vec<String>,

    /// Path segment sequences that precede the product identifier
    pub product_path_markers: Vec<String>,

    /// Regex a path segment must match to count as a product identifier
    pub product_id_pattern: String,

    /// Marker used when rebuilding the canonical path (`/<marker>/<id>`)
    pub canonical_marker: String,
}

/// Rendering session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Page navigation timeout in seconds
    pub navigation_timeout_secs: u64,

    /// How long to wait for the content marker in seconds
    pub marker_timeout_secs: u64,

    /// DOM poll interval while waiting for the marker
    pub marker_poll_interval_ms: u64,

    /// Element that must exist for the page to count as a product page
    pub marker_selector: String,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Spoofed desktop user agent
    pub user_agent: String,

    /// Chrome/Chromium executable (None for auto-detection)
    pub chrome_executable: Option<PathBuf>,

    /// Run without a visible window
    pub headless: bool,

    /// Disable the Chrome sandbox (needed inside most containers)
    pub no_sandbox: bool,

    /// Extra command line switches passed to the browser
    pub extra_args: Vec<String>,

    /// Parent of the per-session browser profiles (None for the system temp dir)
    pub profile_root: Option<PathBuf>,
}

/// Image download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Flat directory shared with the file-serving endpoint
    pub asset_dir: PathBuf,

    /// Per-image request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum concurrent image downloads
    pub max_concurrent: usize,

    /// User agent for image requests
    pub user_agent: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files
    pub log_dir: PathBuf,

    /// Base log file name (rotated daily)
    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Module-specific log level filters (e.g., "chromiumoxide": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            render: RenderConfig::default(),
            download: DownloadConfig::default(),
            images: ImageSelectors::default(),
            selectors: ProductPageSelectors::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: amazon::SITE_NAME.to_string(),
            allowed_domains: amazon::ALLOWED_DOMAINS.iter().map(|s| (*s).to_string()).collect(),
            product_path_markers: amazon::PRODUCT_PATH_MARKERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            product_id_pattern: amazon::PRODUCT_ID_PATTERN.to_string(),
            canonical_marker: amazon::CANONICAL_MARKER.to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: defaults::NAVIGATION_TIMEOUT_SECS,
            marker_timeout_secs: defaults::MARKER_TIMEOUT_SECS,
            marker_poll_interval_ms: defaults::MARKER_POLL_INTERVAL_MS,
            marker_selector: amazon::TITLE_MARKER.to_string(),
            viewport_width: defaults::VIEWPORT_WIDTH,
            viewport_height: defaults::VIEWPORT_HEIGHT,
            user_agent: defaults::USER_AGENT.to_string(),
            chrome_executable: None,
            headless: true,
            no_sandbox: false,
            extra_args: Vec::new(),
            profile_root: None,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            asset_dir: AppConfig::default_data_dir().join("assets"),
            timeout_secs: defaults::DOWNLOAD_TIMEOUT_SECS,
            max_concurrent: defaults::MAX_CONCURRENT_DOWNLOADS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: AppConfig::default_data_dir().join("logs"),
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("chromiumoxide".to_string(), "warn".to_string());
                filters.insert("tungstenite".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("hyper_util".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl RenderConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn marker_timeout(&self) -> Duration {
        Duration::from_secs(self.marker_timeout_secs)
    }

    pub fn marker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.marker_poll_interval_ms)
    }

    pub fn profile_root(&self) -> PathBuf {
        self.profile_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Environment variable prefix, e.g. `PRODUCT_IMPORT__RENDER__NO_SANDBOX=true`
    pub const ENV_PREFIX: &'static str = "PRODUCT_IMPORT";

    /// Application data directory (assets and logs live below it)
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("product-import")
    }

    /// Load configuration: defaults, then the optional file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&Self::default())?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(Self::ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Settings validation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.allowed_domains.is_empty() {
            return Err(ConfigError::Validation {
                message: "site.allowed_domains must not be empty".to_string(),
            });
        }

        if self.site.product_path_markers.is_empty() {
            return Err(ConfigError::Validation {
                message: "site.product_path_markers must not be empty".to_string(),
            });
        }

        if self.render.marker_selector.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "render.marker_selector must not be empty".to_string(),
            });
        }

        for (name, value) in [
            ("render.navigation_timeout_secs", self.render.navigation_timeout_secs),
            ("render.marker_timeout_secs", self.render.marker_timeout_secs),
            ("render.marker_poll_interval_ms", self.render.marker_poll_interval_ms),
            ("download.timeout_secs", self.download.timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation {
                    message: format!("{name} must be greater than 0"),
                });
            }
        }

        if self.download.max_concurrent == 0
            || self.download.max_concurrent > defaults::MAX_CONCURRENT_DOWNLOADS
        {
            return Err(ConfigError::Validation {
                message: format!(
                    "download.max_concurrent must be between 1 and {}",
                    defaults::MAX_CONCURRENT_DOWNLOADS
                ),
            });
        }

        if self.images.max_images == 0 || self.images.max_images > defaults::MAX_IMAGES {
            return Err(ConfigError::Validation {
                message: format!(
                    "images.max_images must be between 1 and {}",
                    defaults::MAX_IMAGES
                ),
            });
        }

        Ok(())
    }

    /// Pretty JSON dump of the effective configuration
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Amazon storefront constants
pub mod amazon {
    /// Purchase location reported for imported items
    pub const SITE_NAME: &str = "Amazon";

    /// Storefront domains, including regional variants and share-link hosts
    pub const ALLOWED_DOMAINS: &[&str] = &[
        "amazon.com",
        "amazon.ca",
        "amazon.com.mx",
        "amazon.com.br",
        "amazon.co.uk",
        "amazon.de",
        "amazon.fr",
        "amazon.it",
        "amazon.es",
        "amazon.nl",
        "amazon.se",
        "amazon.pl",
        "amazon.com.be",
        "amazon.com.tr",
        "amazon.ae",
        "amazon.sa",
        "amazon.eg",
        "amazon.in",
        "amazon.co.jp",
        "amazon.sg",
        "amazon.com.au",
        "amzn.to",
        "amzn.eu",
        "a.co",
    ];

    /// Path markers that precede an ASIN
    pub const PRODUCT_PATH_MARKERS: &[&str] = &[
        "dp",
        "gp/product",
        "gp/aw/d",
        "exec/obidos/ASIN",
        "o/ASIN",
        "product",
    ];

    /// ASINs are 10 alphanumeric characters
    pub const PRODUCT_ID_PATTERN: &str = r"^[A-Za-z0-9]{10}$";

    pub const CANONICAL_MARKER: &str = "dp";

    /// Title element present on every product page layout
    pub const TITLE_MARKER: &str = "#productTitle";
}

/// Default pipeline values
pub mod defaults {
    /// Page navigation timeout
    pub const NAVIGATION_TIMEOUT_SECS: u64 = 30;

    /// Content marker wait
    pub const MARKER_TIMEOUT_SECS: u64 = 10;

    pub const MARKER_POLL_INTERVAL_MS: u64 = 250;

    /// Per-image download timeout
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 10;

    /// Hard cap on image candidates per product
    pub const MAX_IMAGES: usize = 5;

    /// One worker per candidate
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 5;

    pub const VIEWPORT_WIDTH: u32 = 1920;
    pub const VIEWPORT_HEIGHT: u32 = 1080;

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

    // Log configuration defaults
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_FILE_NAME: &str = "product-import.log";
    pub const LOG_MAX_FILES: u32 = 5;
}
