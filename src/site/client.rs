//! HTTP client for vendor sites using wreq for TLS fingerprint emulation.

use crate::config::Config;
use crate::error::CollectError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use wreq::header::{HeaderMap, HeaderName, HeaderValue};
use wreq::Client;
use wreq_util::Emulation;

/// Page fetching seam; tests substitute canned responses.
#[async_trait]
pub trait SiteFetch: Send + Sync {
    /// Fetches a URL and returns the response body.
    async fn get(&self, url: &str) -> Result<String>;

    /// Posts a urlencoded form and returns the response body. Session cookies
    /// set by the response are sent with later requests.
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String>;

    /// Origin (`scheme://host`) relative paths are resolved against.
    fn origin(&self) -> &str;
}

/// Browser header set sent with every page request.
pub fn build_browser_headers(origin: &str, referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let pairs: [(&str, &str); 12] = [
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
        ("accept-language", "en-US,en;q=0.9"),
        ("accept-encoding", "gzip, deflate, br"),
        ("cache-control", "no-cache"),
        ("pragma", "no-cache"),
        ("sec-ch-ua", "\"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"macOS\""),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-user", "?1"),
        ("upgrade-insecure-requests", "1"),
    ];
    for (name, value) in pairs {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }

    let site = if referer.is_some() { "same-origin" } else { "none" };
    headers.insert(HeaderName::from_static("sec-fetch-site"), HeaderValue::from_static(site));

    if let Some(value) = referer
        .or((!origin.is_empty()).then_some(origin))
        .and_then(|r| HeaderValue::from_str(r).ok())
    {
        headers.insert(HeaderName::from_static("referer"), value);
    }
    headers
}

/// `application/x-www-form-urlencoded` body for the given fields.
pub fn encode_form(form: &[(String, String)]) -> String {
    form.iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Maps blocking and error statuses to [`CollectError`], else reads the body.
async fn read_body(url: &str, response: wreq::Response) -> Result<String> {
    let status = response.status();
    debug!("Response status: {}", status);

    if matches!(status.as_u16(), 403 | 429 | 503) {
        warn!("Blocked ({}) fetching {}. Consider using a proxy or increasing delay.", status, url);
        return Err(CollectError::Blocked { url: url.to_string(), status: status.as_u16() }.into());
    }

    if !status.is_success() {
        return Err(CollectError::Fetch { url: url.to_string(), status: status.as_u16() }.into());
    }

    response.text().await.context("Failed to read response body")
}

/// Vendor site client with browser impersonation and polite pacing.
pub struct HttpClient {
    client: Client,
    origin: String,
    delay_ms: u64,
    delay_jitter_ms: u64,
}

impl HttpClient {
    /// Creates a client for the given site origin.
    pub fn new(config: &Config, origin: impl Into<String>) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            origin: origin.into().trim_end_matches('/').to_string(),
            delay_ms: config.delay_ms,
            delay_jitter_ms: config.delay_jitter_ms,
        })
    }

    async fn delay(&self) {
        if self.delay_ms == 0 {
            return;
        }
        let jitter = if self.delay_jitter_ms > 0 {
            rand::random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };
        let total = self.delay_ms + jitter;
        debug!("Delaying {}ms", total);
        tokio::time::sleep(Duration::from_millis(total)).await;
    }
}

#[async_trait]
impl SiteFetch for HttpClient {
    async fn get(&self, url: &str) -> Result<String> {
        self.delay().await;

        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .headers(build_browser_headers(&self.origin, None))
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        read_body(url, response).await
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String> {
        self.delay().await;

        debug!("POST {} ({} field(s))", url, form.len());

        let mut headers = build_browser_headers(&self.origin, Some(url));
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        if let Ok(origin) = HeaderValue::from_str(&self.origin) {
            headers.insert(HeaderName::from_static("origin"), origin);
        }

        let response = self
            .client
            .post(url)
            .emulation(Emulation::Chrome131)
            .headers(headers)
            .body(encode_form(form))
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        read_body(url, response).await
    }

    fn origin(&self) -> &str {
        &self.origin
    }
}
