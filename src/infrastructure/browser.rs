//! Headless browser rendering
//!
//! Every render launches its own Chrome process with a throwaway profile and
//! tears it down afterwards. [`RenderingSession`] owns the process: `close()`
//! shuts it down on the normal path, and `Drop` kills it when the render
//! future is cancelled or a panic unwinds through it.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::RenderConfig;
use super::import_error::{ImportError, ImportResult};
use crate::domain::product::RenderedDocument;

/// Grace period for Chrome to exit after `Browser.close` before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--no-first-run",
    "--no-default-browser-check",
    "--metrics-recording-only",
    "--lang=en-US",
];

/// Turns a URL into post-JavaScript HTML
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> ImportResult<RenderedDocument>;
}

/// [`PageRenderer`] backed by a fresh Chrome process per call
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    config: RenderConfig,
}

impl ChromeRenderer {
    pub const fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> ImportResult<RenderedDocument> {
        let session = RenderingSession::launch(&self.config).await?;
        let result = session.render(url, &self.config).await;
        session.close().await;
        result
    }
}

/// One browser process and its profile directory
pub struct RenderingSession {
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    profile_dir: PathBuf,
    runtime: Handle,
}

impl RenderingSession {
    pub async fn launch(config: &RenderConfig) -> ImportResult<Self> {
        let profile_dir = config
            .profile_root()
            .join(format!("product-import-{}", Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .viewport(Some(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .request_timeout(config.navigation_timeout())
            .user_data_dir(&profile_dir)
            .arg(format!("--user-agent={}", config.user_agent));

        for arg in STEALTH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &config.extra_args {
            builder = builder.arg(arg.as_str());
        }
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let browser_config = match builder.build() {
            Ok(browser_config) => browser_config,
            Err(e) => {
                remove_profile_dir(&profile_dir);
                return Err(ImportError::browser_launch_failed(e));
            }
        };

        let (browser, mut handler) = match Browser::launch(browser_config).await {
            Ok(launched) => launched,
            Err(e) => {
                remove_profile_dir(&profile_dir);
                return Err(ImportError::browser_launch_failed(e));
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        info!("Browser launched (profile {:?})", profile_dir);
        Ok(Self {
            browser: Some(browser),
            handler_task: Some(handler_task),
            profile_dir,
            runtime: Handle::current(),
        })
    }

    /// Navigate, wait for the product marker and capture the DOM
    pub async fn render(&self, url: &str, config: &RenderConfig) -> ImportResult<RenderedDocument> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| ImportError::browser_launch_failed("session already closed"))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ImportError::navigation_failed(url, e))?;

        let result = capture_page(&page, url, config).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close page for {}: {}", url, e);
        }
        result
    }

    /// Graceful shutdown; falls back to killing the process
    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Browser close command failed: {}", e);
            }
            match tokio::time::timeout(SHUTDOWN_GRACE, browser.wait()).await {
                Ok(Ok(_)) => debug!("Browser exited"),
                Ok(Err(e)) => warn!("Waiting for browser exit failed: {}", e),
                Err(_) => {
                    warn!("Browser did not exit within {:?}, killing it", SHUTDOWN_GRACE);
                    if let Some(Err(e)) = browser.kill().await {
                        warn!("Failed to kill browser: {}", e);
                    }
                }
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        remove_profile_dir(&self.profile_dir);
    }
}

impl Drop for RenderingSession {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        let Some(mut browser) = self.browser.take() else {
            return;
        };

        warn!("Rendering session dropped without close, killing browser");
        let profile_dir = std::mem::take(&mut self.profile_dir);
        self.runtime.spawn(async move {
            if let Some(Err(e)) = browser.kill().await {
                warn!("Failed to kill abandoned browser: {}", e);
            }
            remove_profile_dir(&profile_dir);
        });
    }
}

async fn capture_page(page: &Page, url: &str, config: &RenderConfig) -> ImportResult<RenderedDocument> {
    page.execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
        .await
        .map_err(|e| ImportError::navigation_failed(url, e))?;

    let timeout = config.navigation_timeout();
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(Ok(_)) => debug!("Navigated to {}", url),
        Ok(Err(e)) => return Err(ImportError::navigation_failed(url, e)),
        Err(_) => {
            return Err(ImportError::RenderTimeout {
                step: "navigation",
                url: url.to_string(),
                timeout,
            });
        }
    }

    wait_for_marker(page, url, config).await?;

    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| url.to_string());
    let html = page
        .content()
        .await
        .map_err(|e| ImportError::navigation_failed(url, e))?;

    info!("Rendered {} ({} bytes)", final_url, html.len());
    Ok(RenderedDocument::new(final_url, html))
}

async fn wait_for_marker(page: &Page, url: &str, config: &RenderConfig) -> ImportResult<()> {
    let selector = config.marker_selector.as_str();
    let poll = async {
        loop {
            if page.find_element(selector).await.is_ok() {
                return;
            }
            tokio::time::sleep(config.marker_poll_interval()).await;
        }
    };

    tokio::time::timeout(config.marker_timeout(), poll)
        .await
        .map_err(|_| ImportError::PageNotRecognized {
            url: url.to_string(),
            marker: selector.to_string(),
        })?;
    debug!("Found marker {} on {}", selector, url);
    Ok(())
}

fn remove_profile_dir(path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(path) {
        debug!("Failed to remove browser profile {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Live processes whose command line mentions `dir`
    fn processes_using(dir: &Path) -> usize {
        let needle = dir.to_string_lossy().into_owned();
        std::fs::read_dir("/proc")
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter_map(|entry| std::fs::read(entry.path().join("cmdline")).ok())
                    .filter(|cmdline| String::from_utf8_lossy(cmdline).contains(&needle))
                    .count()
            })
            .unwrap_or(0)
    }

    fn profile_count(root: &Path) -> usize {
        std::fs::read_dir(root).map(Iterator::count).unwrap_or(0)
    }

    /// Poll until no browser uses a profile under `root` and every profile is gone
    async fn wait_for_teardown(root: &Path) -> bool {
        for _ in 0..50 {
            if processes_using(root) == 0 && profile_count(root) == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        false
    }

    fn chrome_config(root: &Path) -> RenderConfig {
        RenderConfig {
            marker_timeout_secs: 1,
            no_sandbox: true,
            profile_root: Some(root.to_path_buf()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_failure() {
        let root = tempfile::tempdir().unwrap();
        let config = RenderConfig {
            chrome_executable: Some(PathBuf::from("/nonexistent/chrome-for-tests")),
            profile_root: Some(root.path().to_path_buf()),
            ..Default::default()
        };
        let err = ChromeRenderer::new(config)
            .render("https://www.amazon.com/dp/B0ABCDE123")
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::BrowserLaunchFailed { .. }), "{err}");
        assert_eq!(err.stage(), crate::domain::ImportStage::Rendering);
        assert_eq!(profile_count(root.path()), 0);
    }

    #[test]
    fn test_profile_root_defaults_to_temp_dir() {
        assert_eq!(RenderConfig::default().profile_root(), std::env::temp_dir());
        let config = RenderConfig {
            profile_root: Some(PathBuf::from("/var/tmp/profiles")),
            ..Default::default()
        };
        assert_eq!(config.profile_root(), PathBuf::from("/var/tmp/profiles"));
    }

    #[tokio::test]
    #[ignore = "needs a local Chrome installation"]
    async fn test_page_without_marker_is_not_recognized() {
        let root = tempfile::tempdir().unwrap();
        let err = ChromeRenderer::new(chrome_config(root.path()))
            .render("data:text/html,<h1>Not a product</h1>")
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::PageNotRecognized { .. }), "{err}");
        assert!(wait_for_teardown(root.path()).await);
    }

    #[tokio::test]
    #[ignore = "needs a local Chrome installation"]
    async fn test_dropped_render_kills_browser() {
        let root = tempfile::tempdir().unwrap();
        let config = RenderConfig {
            marker_timeout_secs: 60,
            ..chrome_config(root.path())
        };
        let session = RenderingSession::launch(&config).await.unwrap();
        assert_eq!(profile_count(root.path()), 1);
        assert!(processes_using(root.path()) > 0);

        let render = session.render("data:text/html,<h1>Still waiting</h1>", &config);
        assert!(tokio::time::timeout(Duration::from_secs(2), render).await.is_err());
        drop(session);

        assert!(wait_for_teardown(root.path()).await);
    }
}
