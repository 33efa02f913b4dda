//! Image candidate resolution for product pages

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

use super::config::{ImageSelectors, ImageSourceSpec};
use super::{ParsingError, ParsingResult};
use crate::domain::product::ImageCandidate;

#[derive(Debug)]
struct ImageSource {
    selector: Selector,
    attributes: Vec<String>,
}

/// Finds the hero image and gallery thumbnails, upgrades thumbnails to their
/// high-resolution variant and returns at most `max_images` unique URLs.
#[derive(Debug)]
pub struct ImageResolver {
    primary: Vec<ImageSource>,
    gallery: Vec<ImageSource>,
    upgrade_pattern: Regex,
    upgrade_replacement: String,
    max_images: usize,
}

impl ImageResolver {
    pub fn new(config: &ImageSelectors) -> ParsingResult<Self> {
        let upgrade_pattern = Regex::new(&config.upgrade_pattern)
            .map_err(|e| ParsingError::invalid_pattern("images", &config.upgrade_pattern, e))?;

        Ok(Self {
            primary: compile_sources("primary_image", &config.primary)?,
            gallery: compile_sources("gallery_images", &config.gallery)?,
            upgrade_pattern,
            upgrade_replacement: config.upgrade_replacement.clone(),
            max_images: config.max_images,
        })
    }

    pub const fn max_images(&self) -> usize {
        self.max_images
    }

    /// Ordered, de-duplicated candidates with the primary image first
    pub fn resolve(&self, html: &Html, page_url: &Url) -> Vec<ImageCandidate> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        let primary = self.primary_image(html, page_url);
        match &primary {
            Some(url) => debug!("Primary image: {}", url),
            None => debug!("No primary image found"),
        }

        let thumbnails = self.gallery_images(html, page_url);
        debug!("Found {} gallery thumbnails", thumbnails.len());

        for url in primary.into_iter().chain(thumbnails) {
            if candidates.len() >= self.max_images {
                break;
            }
            if seen.insert(url.clone()) {
                candidates.push(ImageCandidate::new(url));
            }
        }

        candidates
    }

    /// Rewrite a thumbnail URL's size segment; unmatched URLs pass through
    pub fn upgrade_thumbnail(&self, url: &str) -> String {
        self.upgrade_pattern
            .replace(url, self.upgrade_replacement.as_str())
            .into_owned()
    }

    fn primary_image(&self, html: &Html, page_url: &Url) -> Option<String> {
        self.primary.iter().find_map(|source| {
            html.select(&source.selector).find_map(|element| {
                source.attributes.iter().find_map(|attribute| {
                    let raw = element.value().attr(attribute)?;
                    resolve_image_url(&pick_attribute_url(raw)?, page_url)
                })
            })
        })
    }

    fn gallery_images(&self, html: &Html, page_url: &Url) -> Vec<String> {
        for source in &self.gallery {
            let elements: Vec<_> = html.select(&source.selector).collect();
            if elements.is_empty() {
                continue;
            }

            return elements
                .into_iter()
                .filter_map(|element| {
                    source.attributes.iter().find_map(|attribute| {
                        let raw = element.value().attr(attribute)?;
                        resolve_image_url(&pick_attribute_url(raw)?, page_url)
                    })
                })
                .map(|url| self.upgrade_thumbnail(&url))
                .collect();
        }
        Vec::new()
    }
}

fn compile_sources(field: &str, specs: &[ImageSourceSpec]) -> ParsingResult<Vec<ImageSource>> {
    let mut sources = Vec::with_capacity(specs.len());
    let mut errors = Vec::new();

    for spec in specs {
        match Selector::parse(&spec.selector) {
            Ok(selector) => sources.push(ImageSource {
                selector,
                attributes: spec.attributes.clone(),
            }),
            Err(e) => {
                warn!("Skipping image selector '{}' for {}: {}", spec.selector, field, e);
                errors.push(format!("'{}': {}", spec.selector, e));
            }
        }
    }

    if sources.is_empty() && !specs.is_empty() {
        return Err(ParsingError::EmptyStrategyChain {
            field: field.to_string(),
            errors: errors.join("; "),
        });
    }

    Ok(sources)
}

/// Attribute value as a URL. A `{"url": [width, height], ...}` map yields its
/// largest entry.
fn pick_attribute_url(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if !value.starts_with('{') {
        return Some(value.to_string());
    }

    let sizes: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(value) {
        Ok(map) => map,
        Err(e) => {
            debug!("Ignoring malformed dynamic image map: {}", e);
            return None;
        }
    };

    sizes
        .into_iter()
        .max_by_key(|(_, dims)| {
            let dims = dims.as_array();
            let side = |i: usize| dims.and_then(|d| d.get(i)).and_then(serde_json::Value::as_u64).unwrap_or(0);
            side(0).saturating_mul(side(1))
        })
        .map(|(url, _)| url)
}

/// Absolute http(s) URL or nothing; `data:` URIs and the like are dropped
fn resolve_image_url(value: &str, page_url: &Url) -> Option<String> {
    let url = page_url.join(value).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}
