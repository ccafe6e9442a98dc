//! HTTP acquisition engine.
//!
//! Fetches one search results page, collects the recipe links it lists, then
//! fetches each detail page sequentially under a rate limit.

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use recipefinder_shared::{AcquisitionConfig, RawDocument, RecipeError, Result};

use crate::{DocumentSource, FetchOutcome, SkippedItem};

/// User-Agent string for acquisition requests.
const USER_AGENT: &str = concat!("RecipeFinder/", env!("CARGO_PKG_VERSION"));

/// Placeholder in `search_url_template` replaced by the encoded query.
const QUERY_PLACEHOLDER: &str = "{query}";

/// Length of the hex `source_id` derived from a locator hash.
const SOURCE_ID_LEN: usize = 16;

// ---------------------------------------------------------------------------
// HttpRecipeSource
// ---------------------------------------------------------------------------

/// Recipe site scraper over plain HTTP.
pub struct HttpRecipeSource {
    config: AcquisitionConfig,
    client: Client,
    link_selector: Selector,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl HttpRecipeSource {
    /// Create a source from the `[acquisition]` config section.
    pub fn new(config: AcquisitionConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RecipeError::Network(format!("failed to build HTTP client: {e}")))?;

        let link_selector = Selector::parse(&config.result_link_selector).map_err(|e| {
            RecipeError::config(format!(
                "invalid result_link_selector {:?}: {e}",
                config.result_link_selector
            ))
        })?;

        Ok(Self {
            config,
            client,
            link_selector,
            allow_localhost: false,
        })
    }

    /// Allow fetching from localhost/private IPs (for integration tests).
    #[cfg(test)]
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Build the search page URL for the given terms.
    fn search_url(&self, terms: &[String]) -> Result<Url> {
        let query = terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if query.is_empty() {
            return Err(RecipeError::validation("no search terms to query"));
        }

        // byte_serialize writes spaces as '+'; a literal '+' is already %2B.
        let encoded = url::form_urlencoded::byte_serialize(query.as_bytes())
            .collect::<String>()
            .replace('+', "%20");

        let raw = self
            .config
            .search_url_template
            .replace(QUERY_PLACEHOLDER, &encoded);

        Url::parse(&raw).map_err(|e| RecipeError::config(format!("invalid search URL {raw}: {e}")))
    }

    fn check_target(&self, url: &Url) -> Result<()> {
        if !self.allow_localhost && is_ssrf_target(url) {
            return Err(RecipeError::Network(format!("{url}: blocked by SSRF protection")));
        }
        Ok(())
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        self.check_target(url)?;

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| RecipeError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecipeError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| RecipeError::Network(format!("{url}: body read failed: {e}")))
    }

    /// Fetch a single detail page.
    async fn fetch_document(&self, locator: &str) -> Result<RawDocument> {
        let url = Url::parse(locator).map_err(|e| RecipeError::parse(format!("{locator}: {e}")))?;
        debug!(%url, "fetching recipe page");

        let body = self.get_text(&url).await?;
        let title = page_title(&body);

        Ok(RawDocument {
            source_id: source_id(locator),
            locator: locator.to_string(),
            title,
            body,
        })
    }
}

#[async_trait]
impl DocumentSource for HttpRecipeSource {
    #[instrument(skip_all, fields(terms = ?terms, limit = limit))]
    async fn fetch(&self, terms: &[String], limit: usize) -> Result<FetchOutcome> {
        let search_url = self.search_url(terms)?;
        info!(%search_url, "searching recipes");

        let listing = self.get_text(&search_url).await?;
        let locators = result_locators(&listing, &self.link_selector, &search_url, limit);

        if locators.is_empty() {
            info!("search returned no recipe links");
            return Ok(FetchOutcome::default());
        }

        let mut outcome = FetchOutcome::default();
        let rate_limit = Duration::from_millis(self.config.rate_limit_ms);

        for (i, locator) in locators.iter().enumerate() {
            if i > 0 && !rate_limit.is_zero() {
                tokio::time::sleep(rate_limit).await;
            }

            match self.fetch_document(locator).await {
                Ok(doc) => outcome.documents.push(doc),
                Err(e) => {
                    warn!(%locator, error = %e, "skipping recipe page");
                    outcome.skipped.push(SkippedItem {
                        locator: locator.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if outcome.documents.is_empty() {
            return Err(RecipeError::Network(format!(
                "all {} recipe pages failed to load",
                locators.len()
            )));
        }

        info!(
            fetched = outcome.documents.len(),
            skipped = outcome.skipped.len(),
            "acquisition completed"
        );

        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Page parsing
// ---------------------------------------------------------------------------

/// Canonical, deduplicated detail-page locators listed on a search page,
/// in page order, at most `limit` of them.
fn result_locators(listing: &str, selector: &Selector, base: &Url, limit: usize) -> Vec<String> {
    let doc = Html::parse_document(listing);
    let mut seen = HashSet::new();
    let mut locators = Vec::new();

    for el in doc.select(selector) {
        if locators.len() >= limit {
            break;
        }

        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
            continue;
        }

        let Ok(resolved) = base.join(href) else {
            continue;
        };

        let locator = canonical_locator(&resolved);
        if seen.insert(locator.clone()) {
            locators.push(locator);
        }
    }

    debug!(count = locators.len(), "collected result links");
    locators
}

/// Text of the first `h1`, falling back to `<title>`.
fn page_title(body: &str) -> String {
    static H1: std::sync::LazyLock<Selector> =
        std::sync::LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
    static TITLE: std::sync::LazyLock<Selector> =
        std::sync::LazyLock::new(|| Selector::parse("title").expect("valid selector"));

    let doc = Html::parse_document(body);
    [&*H1, &*TITLE]
        .into_iter()
        .filter_map(|sel| doc.select(sel).next())
        .map(|el| el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// Normalize a URL for deduplication (strip fragment and trailing slash).
pub fn canonical_locator(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    // Keep the slash of a bare origin ("https://host/").
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}

/// Stable identifier for a canonical locator: leading hex of its SHA-256.
pub fn source_id(locator: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(locator.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(SOURCE_ID_LEN);
    hex
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> AcquisitionConfig {
        AcquisitionConfig {
            search_url_template: format!("{}/search/recipe/{{query}}", server.uri()),
            rate_limit_ms: 0,
            timeout_secs: 5,
            ..AcquisitionConfig::default()
        }
    }

    fn listing(hrefs: &[&str]) -> String {
        let items: String = hrefs
            .iter()
            .map(|h| format!(r#"<li class="clearfix"><a class="cookname" href="{h}">recipe</a></li>"#))
            .collect();
        format!(r#"<html><body><ul class="cook-list">{items}</ul></body></html>"#)
    }

    fn detail(title: &str) -> String {
        format!("<html><head><title>site</title></head><body><h1 class=\"title\">{title}</h1></body></html>")
    }

    async fn mount_search(server: &MockServer, body: String) {
        Mock::given(method("GET"))
            .and(path_regex("^/search/recipe/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_page(server: &MockServer, route: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    #[test]
    fn canonical_locator_strips_fragment_and_slash() {
        let url = Url::parse("https://www.douguo.com/cookbook/42/#comments").unwrap();
        assert_eq!(canonical_locator(&url), "https://www.douguo.com/cookbook/42");

        let root = Url::parse("https://www.douguo.com/").unwrap();
        assert_eq!(canonical_locator(&root), "https://www.douguo.com/");
    }

    #[test]
    fn source_id_is_short_stable_hex() {
        let a = source_id("https://www.douguo.com/cookbook/42.html");
        let b = source_id("https://www.douguo.com/cookbook/42.html");
        let c = source_id("https://www.douguo.com/cookbook/43.html");
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn search_url_encodes_terms() {
        let source = HttpRecipeSource::new(AcquisitionConfig::default()).unwrap();
        let url = source.search_url(&terms(&["鸡蛋", " 生菜 "])).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.douguo.com/search/recipe/%E9%B8%A1%E8%9B%8B%20%E7%94%9F%E8%8F%9C"
        );
    }

    #[test]
    fn search_url_rejects_blank_terms() {
        let source = HttpRecipeSource::new(AcquisitionConfig::default()).unwrap();
        assert!(source.search_url(&terms(&["  "])).is_err());
    }

    #[test]
    fn invalid_link_selector_is_config_error() {
        let config = AcquisitionConfig {
            result_link_selector: "a[[".into(),
            ..AcquisitionConfig::default()
        };
        let err = HttpRecipeSource::new(config).err().unwrap();
        assert!(matches!(err, RecipeError::Config { .. }));
    }

    #[test]
    fn page_title_prefers_h1() {
        assert_eq!(page_title(&detail("  番茄  炒蛋 ")), "番茄 炒蛋");
        assert_eq!(
            page_title("<html><head><title>Only title</title></head><body></body></html>"),
            "Only title"
        );
        assert_eq!(page_title("<p>nothing</p>"), "");
    }

    #[test]
    fn result_locators_dedup_and_limit() {
        let base = Url::parse("https://www.douguo.com/search/recipe/x").unwrap();
        let selector = Selector::parse("ul.cook-list li.clearfix a.cookname").unwrap();
        let html = listing(&["/cookbook/1.html", "/cookbook/1.html#top", "#", "/cookbook/2.html", "/cookbook/3.html"]);

        let all = result_locators(&html, &selector, &base, 10);
        assert_eq!(
            all,
            vec![
                "https://www.douguo.com/cookbook/1.html".to_string(),
                "https://www.douguo.com/cookbook/2.html".to_string(),
                "https://www.douguo.com/cookbook/3.html".to_string(),
            ]
        );

        let limited = result_locators(&html, &selector, &base, 2);
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn ssrf_blocks_private_targets() {
        assert!(is_ssrf_target(&Url::parse("file:///etc/passwd").unwrap()));
        assert!(is_ssrf_target(&Url::parse("http://192.168.1.1/admin").unwrap()));
        assert!(is_ssrf_target(&Url::parse("http://127.0.0.1:8080/").unwrap()));
        assert!(is_ssrf_target(&Url::parse("http://[::1]/").unwrap()));
        assert!(is_ssrf_target(&Url::parse("http://localhost:3000/").unwrap()));
        assert!(!is_ssrf_target(&Url::parse("https://www.douguo.com/cookbook/1.html").unwrap()));
    }

    // -----------------------------------------------------------------------
    // Fetch against a mock server
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn fetch_skips_failed_items() {
        let server = MockServer::start().await;
        mount_search(&server, listing(&["/cookbook/1.html", "/cookbook/2.html", "/cookbook/1.html", "/cookbook/3.html"])).await;
        mount_page(&server, "/cookbook/1.html", 200, detail("鸡蛋三明治")).await;
        mount_page(&server, "/cookbook/2.html", 404, String::new()).await;
        mount_page(&server, "/cookbook/3.html", 200, detail("生菜沙拉")).await;

        let source = HttpRecipeSource::new(config_for(&server)).unwrap().allow_localhost();
        let outcome = source.fetch(&terms(&["鸡蛋", "生菜"]), 10).await.unwrap();

        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.documents[0].title, "鸡蛋三明治");
        assert_eq!(outcome.documents[1].title, "生菜沙拉");
        assert_eq!(outcome.documents[0].source_id, source_id(&outcome.documents[0].locator));
        assert_ne!(outcome.documents[0].source_id, outcome.documents[1].source_id);

        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].locator.ends_with("/cookbook/2.html"));
        assert!(outcome.skipped[0].reason.contains("404"));
    }

    #[tokio::test]
    async fn fetch_respects_limit() {
        let server = MockServer::start().await;
        mount_search(&server, listing(&["/cookbook/1.html", "/cookbook/2.html", "/cookbook/3.html"])).await;
        for n in 1..=3 {
            mount_page(&server, &format!("/cookbook/{n}.html"), 200, detail(&format!("recipe {n}"))).await;
        }

        let source = HttpRecipeSource::new(config_for(&server)).unwrap().allow_localhost();
        let outcome = source.fetch(&terms(&["egg"]), 2).await.unwrap();

        let titles: Vec<&str> = outcome.documents.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["recipe 1", "recipe 2"]);
    }

    #[tokio::test]
    async fn empty_listing_is_not_an_error() {
        let server = MockServer::start().await;
        mount_search(&server, listing(&[])).await;

        let source = HttpRecipeSource::new(config_for(&server)).unwrap().allow_localhost();
        let outcome = source.fetch(&terms(&["unobtainium"]), 5).await.unwrap();

        assert!(outcome.documents.is_empty());
        assert!(outcome.skipped.is_empty());
    }

    #[tokio::test]
    async fn search_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/search/recipe/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpRecipeSource::new(config_for(&server)).unwrap().allow_localhost();
        let err = source.fetch(&terms(&["egg"]), 5).await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn every_item_failing_is_an_error() {
        let server = MockServer::start().await;
        mount_search(&server, listing(&["/cookbook/1.html", "/cookbook/2.html"])).await;
        mount_page(&server, "/cookbook/1.html", 500, String::new()).await;
        mount_page(&server, "/cookbook/2.html", 500, String::new()).await;

        let source = HttpRecipeSource::new(config_for(&server)).unwrap().allow_localhost();
        let err = source.fetch(&terms(&["egg"]), 5).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn ssrf_protection_blocks_mock_server_by_default() {
        let server = MockServer::start().await;
        mount_search(&server, listing(&["/cookbook/1.html"])).await;

        let source = HttpRecipeSource::new(config_for(&server)).unwrap();
        let err = source.fetch(&terms(&["egg"]), 5).await.unwrap_err();
        assert!(err.to_string().contains("SSRF"));
    }
}
