//! Product import use case
//!
//! `Validating -> Rendering -> Extracting -> Downloading -> Done`. Only the
//! first two stages can fail the import; extraction and downloads degrade to
//! empty fields and a shorter asset list.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::product::{DownloadedAsset, ExtractionRequest, ExtractionResult};
use crate::domain::product_url::{CanonicalUrl, UrlCanonicalizer};
use crate::domain::ImportStage;
use crate::infrastructure::asset_downloader::AssetDownloader;
use crate::infrastructure::browser::{ChromeRenderer, PageRenderer};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::import_error::{ImportError, ImportResult};
use crate::infrastructure::parsing::{ParseContext, ParsedPage, ProductPageParser};

/// Logs every stage transition of one import
struct StageTracker<'a> {
    url: &'a str,
    tenant_id: &'a str,
    stage: ImportStage,
}

impl<'a> StageTracker<'a> {
    fn start(url: &'a str, tenant_id: &'a str, stage: ImportStage) -> Self {
        debug!(tenant = tenant_id, url, "import entered {}", stage);
        Self { url, tenant_id, stage }
    }

    fn advance(&mut self) {
        let next = self.stage.next();
        debug!(tenant = self.tenant_id, url = self.url, "import {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, error: &ImportError) {
        warn!(
            tenant = self.tenant_id,
            url = self.url,
            "import {} -> {}: {}",
            self.stage,
            ImportStage::Failed,
            error
        );
        self.stage = ImportStage::Failed;
    }
}

/// Entry point for the CRUD layer
pub struct ProductImportService<R: PageRenderer = ChromeRenderer> {
    config: AppConfig,
    canonicalizer: UrlCanonicalizer,
    parser: Arc<ProductPageParser>,
    downloader: AssetDownloader,
    renderer: R,
}

impl ProductImportService<ChromeRenderer> {
    pub fn new(config: AppConfig) -> Result<Self> {
        let renderer = ChromeRenderer::new(config.render.clone());
        Self::with_renderer(config, renderer)
    }
}

impl<R: PageRenderer> ProductImportService<R> {
    pub fn with_renderer(config: AppConfig, renderer: R) -> Result<Self> {
        config.validate().context("Invalid import configuration")?;

        let canonicalizer =
            UrlCanonicalizer::new(&config.site).context("Failed to build URL canonicalizer")?;
        let parser = ProductPageParser::new(&config.selectors, &config.images)
            .context("Failed to build product page parser")?;
        let downloader =
            AssetDownloader::new(&config.download).context("Failed to build asset downloader")?;

        Ok(Self {
            config,
            canonicalizer,
            parser: Arc::new(parser),
            downloader,
            renderer,
        })
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Validate a link and reduce it to its canonical form
    pub fn canonicalize(&self, url: &str) -> ImportResult<CanonicalUrl> {
        self.canonicalizer.canonicalize(url)
    }

    /// Render, extract and download for an already canonical link.
    ///
    /// The link is checked against the allow-list again before any browser starts.
    pub async fn extract_product(&self, url: &CanonicalUrl, tenant_id: &str) -> ImportResult<ExtractionResult> {
        let mut tracker = StageTracker::start(url.as_str(), tenant_id, ImportStage::Validating);
        let page_url = match self.canonicalizer.verify(url) {
            Ok(page_url) => page_url,
            Err(e) => {
                tracker.fail(&e);
                return Err(e);
            }
        };
        tracker.advance();

        self.run_from_rendering(url, page_url, tenant_id, &mut tracker).await
    }

    /// Fetch images into the asset store; failures are skipped, never raised
    pub async fn download_images(&self, urls: &[String], tenant_id: &str) -> Vec<DownloadedAsset> {
        self.downloader.download_images(urls, tenant_id).await
    }

    /// Whole pipeline for one request
    pub async fn import(&self, request: &ExtractionRequest) -> ImportResult<ExtractionResult> {
        info!(tenant = %request.tenant_id, "Importing {}", request.url);
        let mut tracker = StageTracker::start(&request.url, &request.tenant_id, ImportStage::Validating);

        let checked = self
            .canonicalize(&request.url)
            .and_then(|canonical| Ok((self.canonicalizer.verify(&canonical)?, canonical)));
        let (page_url, canonical) = match checked {
            Ok(checked) => checked,
            Err(e) => {
                tracker.fail(&e);
                return Err(e);
            }
        };
        tracker.advance();

        self.run_from_rendering(&canonical, page_url, &request.tenant_id, &mut tracker)
            .await
    }

    /// [`Self::import`] that stops when `token` fires.
    ///
    /// Returns `Ok(None)` on cancellation. The in-flight work is dropped, which
    /// kills any browser the render step had launched.
    pub async fn import_with_cancellation(
        &self,
        request: &ExtractionRequest,
        token: CancellationToken,
    ) -> ImportResult<Option<ExtractionResult>> {
        tokio::select! {
            result = self.import(request) => result.map(Some),
            () = token.cancelled() => {
                warn!(tenant = %request.tenant_id, "Import of {} cancelled", request.url);
                Ok(None)
            }
        }
    }

    async fn run_from_rendering(
        &self,
        url: &CanonicalUrl,
        page_url: Url,
        tenant_id: &str,
        tracker: &mut StageTracker<'_>,
    ) -> ImportResult<ExtractionResult> {
        let document = match self.renderer.render(url.as_str()).await {
            Ok(document) => document,
            Err(e) => {
                tracker.fail(&e);
                return Err(e);
            }
        };
        tracker.advance();

        // relative image links resolve against where the browser ended up
        let page_url = Url::parse(&document.url).unwrap_or(page_url);
        let context = ParseContext::new(page_url, self.config.site.name.clone());
        let parsed = self.parse(document.html, context).await;
        tracker.advance();

        let image_urls: Vec<String> = parsed.images.into_iter().map(|c| c.url).collect();
        let assets = self.download_images(&image_urls, tenant_id).await;
        tracker.advance();

        info!(
            tenant = tenant_id,
            "Imported {}: name={:?}, {} of {} image(s) stored",
            url,
            parsed.fields.name,
            assets.len(),
            image_urls.len()
        );
        Ok(ExtractionResult::assemble(parsed.fields, assets))
    }

    /// Parse off the async runtime; the parsed DOM never crosses an await
    async fn parse(&self, html: String, context: ParseContext) -> ParsedPage {
        let parser = Arc::clone(&self.parser);
        match tokio::task::spawn_blocking(move || parser.parse(&html, &context)).await {
            Ok(parsed) => parsed,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!("Parse task did not complete: {}", e);
                ParsedPage::default()
            }
        }
    }
}
