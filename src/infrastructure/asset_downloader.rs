//! Image downloads into the asset store
//!
//! Each candidate URL is fetched independently. A failed image is logged and
//! skipped; the batch itself never fails.

use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::asset_store::AssetStore;
use super::config::DownloadConfig;
use super::http_client::{HttpClient, HttpClientConfig};
use crate::domain::product::DownloadedAsset;

/// Why a single image was skipped
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not an image (content-type '{content_type}')")]
    NotAnImage { url: String, content_type: String },

    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub fn request(url: &str, timeout: Duration, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            Self::Request {
                url: url.to_string(),
                source,
            }
        }
    }

    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Known image formats: (content-type subtype, extension, canonical mime)
const IMAGE_FORMATS: &[(&str, &str, &str)] = &[
    ("jpeg", "jpg", "image/jpeg"),
    ("jpg", "jpg", "image/jpeg"),
    ("pjpeg", "jpg", "image/jpeg"),
    ("png", "png", "image/png"),
    ("gif", "gif", "image/gif"),
    ("webp", "webp", "image/webp"),
    ("avif", "avif", "image/avif"),
    ("bmp", "bmp", "image/bmp"),
    ("svg+xml", "svg", "image/svg+xml"),
    ("tiff", "tiff", "image/tiff"),
];

/// URL path extensions we trust when the content type doesn't help
const URL_EXTENSIONS: &[(&str, &str, &str)] = &[
    ("jpg", "jpg", "image/jpeg"),
    ("jpeg", "jpg", "image/jpeg"),
    ("png", "png", "image/png"),
    ("gif", "gif", "image/gif"),
    ("webp", "webp", "image/webp"),
    ("avif", "avif", "image/avif"),
    ("bmp", "bmp", "image/bmp"),
    ("svg", "svg", "image/svg+xml"),
    ("tif", "tiff", "image/tiff"),
    ("tiff", "tiff", "image/tiff"),
];

const FALLBACK_FORMAT: (&str, &str) = ("jpg", "image/jpeg");

/// Extension and mime type chosen for a stored image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFormat {
    pub extension: &'static str,
    pub mime_type: &'static str,
    /// Picked without a recognized content type
    pub guessed: bool,
}

/// Decide how to store a response.
///
/// A recognized `image/*` type wins. Non-image types are rejected, except
/// generic octet streams which are treated like a missing header. Anything
/// unrecognized falls back to the URL extension, then to JPEG.
pub fn classify_image(content_type: Option<&str>, url: &str) -> Result<ImageFormat, DownloadError> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    if let Some(essence) = essence.as_deref() {
        let (top, sub) = essence.split_once('/').unwrap_or((essence, ""));
        match top {
            "image" => {
                if let Some(&(_, extension, mime_type)) = IMAGE_FORMATS.iter().find(|(s, ..)| *s == sub) {
                    return Ok(ImageFormat {
                        extension,
                        mime_type,
                        guessed: false,
                    });
                }
            }
            "application" | "binary" if sub == "octet-stream" => {}
            _ => {
                return Err(DownloadError::NotAnImage {
                    url: url.to_string(),
                    content_type: essence.to_string(),
                });
            }
        }
    }

    let (extension, mime_type) = url_extension(url)
        .and_then(|ext| URL_EXTENSIONS.iter().find(|(e, ..)| *e == ext))
        .map_or(FALLBACK_FORMAT, |(_, extension, mime_type)| (*extension, *mime_type));

    Ok(ImageFormat {
        extension,
        mime_type,
        guessed: true,
    })
}

fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path_segments()?.next_back()?;
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Last path segment of the URL, or `image` when there is none
pub fn original_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

/// Fetches image candidates and stores them under UUID filenames
#[derive(Debug, Clone)]
pub struct AssetDownloader {
    client: HttpClient,
    store: AssetStore,
    max_concurrent: usize,
}

impl AssetDownloader {
    pub fn new(config: &DownloadConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: HttpClient::new(HttpClientConfig::from(config))?,
            store: AssetStore::new(&config.asset_dir),
            max_concurrent: config.max_concurrent.max(1),
        })
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Download every URL, keeping input order and skipping failures.
    /// `tenant_id` only tags log lines; the store is shared.
    pub async fn download_images(&self, urls: &[String], tenant_id: &str) -> Vec<DownloadedAsset> {
        if urls.is_empty() {
            return Vec::new();
        }

        if let Err(e) = self.store.ensure_dir().await {
            warn!(
                tenant = tenant_id,
                "Asset directory {:?} unavailable, skipping {} image(s): {}",
                self.store.root(),
                urls.len(),
                e
            );
            return Vec::new();
        }

        info!(tenant = tenant_id, "Downloading {} image(s)", urls.len());

        let assets: Vec<DownloadedAsset> = stream::iter(urls)
            .map(|url| async move { (url, self.download_one(url).await) })
            .buffered(self.max_concurrent)
            .filter_map(|(url, result)| async move {
                match result {
                    Ok(asset) => Some(asset),
                    Err(e) => {
                        warn!(tenant = tenant_id, "Skipping image {}: {}", url, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        info!(
            tenant = tenant_id,
            "Stored {}/{} image(s)",
            assets.len(),
            urls.len()
        );
        assets
    }

    async fn download_one(&self, url: &str) -> Result<DownloadedAsset, DownloadError> {
        let mut response = self.client.get(url).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let format = classify_image(content_type.as_deref(), url)?;
        if format.guessed {
            warn!(
                "Unrecognized content type {:?} for {}, storing as {}",
                content_type, url, format.mime_type
            );
        }

        let filename = AssetStore::new_filename(format.extension);
        let mut file = self
            .store
            .create(&filename)
            .await
            .map_err(|e| DownloadError::io(self.store.path_for(&filename), e))?;

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = file.write_chunk(&chunk).await {
                        let path = file.path().to_path_buf();
                        file.discard().await;
                        return Err(DownloadError::io(path, e));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    file.discard().await;
                    return Err(DownloadError::request(url, self.client.timeout(), e));
                }
            }
        }

        let path = file.path().to_path_buf();
        let size_bytes = file.finish().await.map_err(|e| DownloadError::io(&path, e))?;
        if size_bytes == 0 {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!("Failed to remove empty asset {:?}: {}", path, e);
            }
            return Err(DownloadError::EmptyBody { url: url.to_string() });
        }

        debug!("Stored {} as {} ({} bytes)", url, filename, size_bytes);
        Ok(DownloadedAsset {
            filename,
            original_name: original_name(url),
            mime_type: format.mime_type.to_string(),
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rstest::rstest;

    fn downloader(dir: &std::path::Path) -> AssetDownloader {
        AssetDownloader::new(&DownloadConfig {
            asset_dir: dir.join("assets"),
            ..Default::default()
        })
        .unwrap()
    }

    #[rstest]
    #[case(Some("image/png"), "https://x.example/a.jpg", "png", "image/png", false)]
    #[case(Some("image/jpeg; charset=binary"), "https://x.example/a", "jpg", "image/jpeg", false)]
    #[case(Some("IMAGE/WEBP"), "https://x.example/a", "webp", "image/webp", false)]
    #[case(Some("image/x-weird"), "https://x.example/a.gif", "gif", "image/gif", true)]
    #[case(None, "https://x.example/a.PNG", "png", "image/png", true)]
    #[case(Some("application/octet-stream"), "https://x.example/a", "jpg", "image/jpeg", true)]
    #[case(None, "https://x.example/no-extension", "jpg", "image/jpeg", true)]
    fn test_classify_image(
        #[case] content_type: Option<&str>,
        #[case] url: &str,
        #[case] extension: &str,
        #[case] mime_type: &str,
        #[case] guessed: bool,
    ) {
        let format = classify_image(content_type, url).unwrap();
        assert_eq!(format.extension, extension);
        assert_eq!(format.mime_type, mime_type);
        assert_eq!(format.guessed, guessed);
    }

    #[test]
    fn test_html_response_is_not_an_image() {
        let err = classify_image(Some("text/html; charset=utf-8"), "https://x.example/a.jpg").unwrap_err();
        assert!(matches!(err, DownloadError::NotAnImage { .. }));
    }

    #[test]
    fn test_original_name() {
        assert_eq!(original_name("https://m.media-amazon.com/images/I/71abc._AC_SL1500_.jpg"), "71abc._AC_SL1500_.jpg");
        assert_eq!(original_name("https://x.example/"), "image");
    }

    #[tokio::test]
    async fn test_partial_failures_are_isolated_and_order_kept() {
        let server = MockServer::start_async().await;
        for (path, status) in [("/1.jpg", 200), ("/2.jpg", 404), ("/3.png", 200), ("/4.jpg", 404), ("/5.webp", 200)] {
            let content_type = match path.rsplit_once('.').map(|(_, ext)| ext) {
                Some("png") => "image/png",
                Some("webp") => "image/webp",
                _ => "image/jpeg",
            };
            server
                .mock_async(|when, then| {
                    when.method(GET).path(path);
                    then.status(status)
                        .header("content-type", content_type)
                        .body(format!("bytes of {path}"));
                })
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader(dir.path());
        let urls: Vec<String> = ["/1.jpg", "/2.jpg", "/3.png", "/4.jpg", "/5.webp"]
            .iter()
            .map(|p| server.url(*p))
            .collect();

        let assets = downloader.download_images(&urls, "tenant-a").await;

        let names: Vec<_> = assets.iter().map(|a| a.original_name.as_str()).collect();
        assert_eq!(names, vec!["1.jpg", "3.png", "5.webp"]);
        assert_eq!(assets[1].mime_type, "image/png");
        assert!(assets[2].filename.ends_with(".webp"));

        for asset in &assets {
            let path = downloader.store().path_for(&asset.filename);
            let on_disk = std::fs::metadata(&path).unwrap().len();
            assert_eq!(asset.size_bytes, on_disk);
        }
        let stored = std::fs::read_dir(downloader.store().root()).unwrap().count();
        assert_eq!(stored, 3);
    }

    #[tokio::test]
    async fn test_html_and_empty_responses_leave_no_files() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/login");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html>sign in</html>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/empty.jpg");
                then.status(200).header("content-type", "image/jpeg");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader(dir.path());
        let assets = downloader
            .download_images(&[server.url("/login"), server.url("/empty.jpg")], "t")
            .await;

        assert!(assets.is_empty());
        assert_eq!(std::fs::read_dir(downloader.store().root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let assets = downloader(dir.path())
            .download_images(&["http://127.0.0.1:9/never.jpg".to_string()], "t")
            .await;
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn test_no_urls_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader(dir.path());
        assert!(downloader.download_images(&[], "t").await.is_empty());
        assert!(!downloader.store().root().exists());
    }
}
