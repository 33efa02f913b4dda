//! `product-import` command line entry point
//!
//! Imports one product link and prints the extraction result as JSON.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use product_import::infrastructure::init_logging_with_config;
use product_import::{AppConfig, ExtractionRequest, ProductImportService};

#[derive(Parser, Debug)]
#[command(name = "product-import", version, about = "Import product details and images from a product link")]
struct Cli {
    /// Product page link
    #[arg(required_unless_present = "print_config")]
    url: Option<String>,

    /// Workspace the imported assets belong to
    #[arg(short, long, default_value = "default")]
    tenant: String,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the asset directory
    #[arg(long)]
    asset_dir: Option<PathBuf>,

    /// Chrome/Chromium executable
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Disable the Chrome sandbox (containers)
    #[arg(long)]
    no_sandbox: bool,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.asset_dir {
            config.download.asset_dir.clone_from(dir);
        }
        if let Some(chrome) = &self.chrome {
            config.render.chrome_executable = Some(chrome.clone());
        }
        if self.no_sandbox {
            config.render.no_sandbox = true;
        }
        if self.headful {
            config.render.headless = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    if cli.print_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(ExitCode::SUCCESS);
    }

    init_logging_with_config(config.logging.clone())?;
    match &cli.config {
        Some(path) => info!("Loaded configuration from: {:?}", path),
        None => info!("Using built-in configuration defaults"),
    }

    let Some(url) = cli.url else {
        anyhow::bail!("A product link is required");
    };

    let service = ProductImportService::new(config)?;
    let request = ExtractionRequest::new(url, cli.tenant);

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling import");
            ctrl_c_token.cancel();
        }
    });

    match service.import_with_cancellation(&request, token).await {
        Ok(Some(result)) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => {
            eprintln!("Import cancelled");
            Ok(ExitCode::from(130))
        }
        Err(e) => {
            error!(stage = %e.stage(), "Import failed: {}", e);
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
