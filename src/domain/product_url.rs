//! Product link canonicalization
//!
//! Accepts links only from the configured storefront domains and rewrites them
//! to `https://<host>/<marker>/<PRODUCT_ID>`, dropping tracking segments and
//! query parameters. Canonicalizing an already canonical URL is a no-op.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::debug;
use url::Url;

use crate::infrastructure::config::SiteConfig;
use crate::infrastructure::import_error::ImportError;
use crate::infrastructure::parsing_error::ParsingError;

/// Normalized product page link
/// Only [`UrlCanonicalizer`] builds these, so the host has passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalUrl {
    /// `https://<host>`
    pub origin: String,
    /// Product identifier, when one could be located in the path
    pub product_id: Option<String>,
    href: String,
}

impl CanonicalUrl {
    /// Full canonical link; the original link when no identifier was found
    pub fn as_str(&self) -> &str {
        &self.href
    }

    pub const fn has_product_id(&self) -> bool {
        self.product_id.is_some()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.href
    }
}

impl From<CanonicalUrl> for String {
    fn from(url: CanonicalUrl) -> Self {
        url.href
    }
}

/// Domain allow-list check plus best-effort product id extraction
#[derive(Debug, Clone)]
pub struct UrlCanonicalizer {
    allowed_domains: Vec<String>,
    markers: Vec<Vec<String>>,
    id_pattern: Regex,
    canonical_marker: String,
}

impl UrlCanonicalizer {
    pub fn new(site: &SiteConfig) -> Result<Self, ParsingError> {
        let id_pattern = Regex::new(&site.product_id_pattern)
            .map_err(|e| ParsingError::invalid_pattern("product_id", &site.product_id_pattern, e))?;

        let markers = site
            .product_path_markers
            .iter()
            .map(|marker| {
                marker
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_ascii_lowercase)
                    .collect::<Vec<_>>()
            })
            .filter(|segments| !segments.is_empty())
            .collect();

        Ok(Self {
            allowed_domains: site
                .allowed_domains
                .iter()
                .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            markers,
            id_pattern,
            canonical_marker: site.canonical_marker.trim_matches('/').to_string(),
        })
    }

    /// Validate the link's host and reduce it to its canonical form
    pub fn canonicalize(&self, raw: &str) -> Result<CanonicalUrl, ImportError> {
        let trimmed = raw.trim();
        let parsed = Url::parse(trimmed).map_err(|e| ImportError::invalid_url(trimmed, e))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImportError::invalid_url(
                trimmed,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ImportError::invalid_url(trimmed, "missing host"))?
            .trim_end_matches('.')
            .to_ascii_lowercase();

        if !self.is_allowed_host(&host) {
            return Err(ImportError::InvalidSourceDomain { host });
        }

        let origin = format!("https://{host}");
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match self.find_product_id(&segments) {
            Some(product_id) => {
                let href = format!("{origin}/{}/{product_id}", self.canonical_marker);
                debug!("Canonicalized {} -> {}", trimmed, href);
                Ok(CanonicalUrl {
                    origin,
                    product_id: Some(product_id),
                    href,
                })
            }
            None => {
                debug!("No product identifier in {}, keeping link as-is", trimmed);
                Ok(CanonicalUrl {
                    origin,
                    product_id: None,
                    href: trimmed.to_string(),
                })
            }
        }
    }

    /// Re-check a canonical link against this allow-list and parse it for page use
    pub fn verify(&self, url: &CanonicalUrl) -> Result<Url, ImportError> {
        let parsed = Url::parse(url.as_str()).map_err(|e| ImportError::invalid_url(url.as_str(), e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImportError::invalid_url(
                url.as_str(),
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ImportError::invalid_url(url.as_str(), "missing host"))?
            .trim_end_matches('.')
            .to_ascii_lowercase();
        if !self.is_allowed_host(&host) {
            return Err(ImportError::InvalidSourceDomain { host });
        }
        Ok(parsed)
    }

    /// Exact domain or any subdomain of an allowed domain
    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.allowed_domains.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    fn find_product_id(&self, segments: &[&str]) -> Option<String> {
        for start in 0..segments.len() {
            for marker in &self.markers {
                let id_index = start + marker.len();
                if id_index >= segments.len() {
                    continue;
                }
                let matches_marker = segments[start..id_index]
                    .iter()
                    .zip(marker)
                    .all(|(segment, expected)| segment.eq_ignore_ascii_case(expected));

                if matches_marker && self.id_pattern.is_match(segments[id_index]) {
                    return Some(segments[id_index].to_ascii_uppercase());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn canonicalizer() -> UrlCanonicalizer {
        UrlCanonicalizer::new(&SiteConfig::default()).unwrap()
    }

    #[rstest]
    #[case(
        "https://www.amazon.com/Widget-Pro-Stainless/dp/B0ABCDE123/ref=sr_1_3?keywords=widget&qid=1",
        "https://www.amazon.com/dp/B0ABCDE123"
    )]
    #[case("https://amazon.com/gp/product/B0ABCDE123?psc=1", "https://amazon.com/dp/B0ABCDE123")]
    #[case("http://www.amazon.co.uk/dp/b0abcde123/", "https://www.amazon.co.uk/dp/B0ABCDE123")]
    #[case("https://www.amazon.de/gp/aw/d/B0ABCDE123#reviews", "https://www.amazon.de/dp/B0ABCDE123")]
    #[case(
        "https://smile.amazon.com/exec/obidos/ASIN/B0ABCDE123/some-tag",
        "https://smile.amazon.com/dp/B0ABCDE123"
    )]
    #[case("https://www.amazon.co.jp/dp/B0ABCDE123", "https://www.amazon.co.jp/dp/B0ABCDE123")]
    fn test_canonical_forms(#[case] input: &str, #[case] expected: &str) {
        let canonical = canonicalizer().canonicalize(input).unwrap();
        assert_eq!(canonical.as_str(), expected);
        assert_eq!(canonical.product_id.as_deref(), Some("B0ABCDE123"));
    }

    #[rstest]
    #[case("https://not-allowed.example/dp/X1")]
    #[case("https://amazon.com.evil.example/dp/B0ABCDE123")]
    #[case("https://notamazon.com/dp/B0ABCDE123")]
    fn test_disallowed_domains_rejected(#[case] input: &str) {
        let err = canonicalizer().canonicalize(input).unwrap_err();
        assert!(matches!(err, ImportError::InvalidSourceDomain { .. }), "{err}");
    }

    #[test]
    fn test_verify_rejects_links_outside_allow_list() {
        let c = canonicalizer();
        let canonical = c.canonicalize("https://www.amazon.com/dp/B0ABCDE123").unwrap();
        assert_eq!(c.verify(&canonical).unwrap().host_str(), Some("www.amazon.com"));

        let metadata_host = CanonicalUrl {
            origin: "http://169.254.169.254".to_string(),
            product_id: None,
            href: "http://169.254.169.254/latest/meta-data/".to_string(),
        };
        let err = c.verify(&metadata_host).unwrap_err();
        assert!(matches!(err, ImportError::InvalidSourceDomain { ref host } if host == "169.254.169.254"));

        let other_site = UrlCanonicalizer::new(&SiteConfig {
            allowed_domains: vec!["shop.example".to_string()],
            ..SiteConfig::default()
        })
        .unwrap();
        let foreign = other_site.canonicalize("https://shop.example/dp/B0ABCDE123").unwrap();
        assert!(c.verify(&foreign).is_err());
    }

    #[test]
    fn test_unparseable_and_non_http_links_rejected() {
        let c = canonicalizer();
        assert!(matches!(c.canonicalize("not a url"), Err(ImportError::InvalidUrl { .. })));
        assert!(matches!(
            c.canonicalize("ftp://www.amazon.com/dp/B0ABCDE123"),
            Err(ImportError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_missing_identifier_keeps_link() {
        let link = "https://www.amazon.com/s?k=widgets";
        let canonical = canonicalizer().canonicalize(link).unwrap();
        assert_eq!(canonical.as_str(), link);
        assert!(!canonical.has_product_id());
        assert_eq!(canonical.origin, "https://www.amazon.com");

        // segment after the marker must look like an identifier
        let canonical = canonicalizer()
            .canonicalize("https://www.amazon.com/dp/short")
            .unwrap();
        assert!(canonical.product_id.is_none());
    }

    #[test]
    fn test_share_link_hosts_are_allowed() {
        let canonical = canonicalizer().canonicalize("https://amzn.to/3xYzAbC").unwrap();
        assert!(canonical.product_id.is_none());
        assert_eq!(canonical.as_str(), "https://amzn.to/3xYzAbC");
    }

    proptest! {
        #[test]
        fn prop_canonicalization_is_idempotent(
            asin in "[A-Z0-9]{10}",
            slug in "[A-Za-z0-9-]{1,30}",
            tracking in "[a-z0-9_=&]{0,40}",
            host in prop::sample::select(vec!["www.amazon.com", "amazon.ca", "www.amazon.co.uk", "www.amazon.com.au"]),
        ) {
            let c = canonicalizer();
            let input = format!("https://{host}/{slug}/dp/{asin}/ref=abc?{tracking}");
            let once = c.canonicalize(&input).unwrap();
            let twice = c.canonicalize(once.as_str()).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once.product_id.as_deref(), Some(asin.as_str()));
        }
    }
}
