use chrono::Utc;
use reqwest::{
    Client, ClientBuilder,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    fetcher::{
        decode::decode_html,
        errors::{BlockedRedirect, FetchError, is_login_bounce},
        types::PageResponse,
    },
    retry::{RetryPolicy, with_retry},
    safety::{SsrfGuard, UrlGate},
};

pub const MAX_BODY_SIZE: u64 = 5 * 1024 * 1024; // 5MB

pub const MAX_REDIRECTS: usize = 10;

pub const MOBILE_SAFARI_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "zh-CN,zh;q=0.8,en-US;q=0.5,en;q=0.3"),
    ("dnt", "1"),
    ("upgrade-insecure-requests", "1"),
    ("cache-control", "max-age=0"),
];

/// Two retries one second apart.
pub const DEFAULT_RETRY: RetryPolicy = RetryPolicy::fixed(3, Duration::from_secs(1));

/// Per-request knobs layered over the client defaults.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub timeout: Duration,
    pub headers: HeaderMap,
}

impl FetchRequest {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            headers: HeaderMap::new(),
        }
    }

    /// Adds a header, replacing any earlier value. Invalid names or values are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = name, "Skipping invalid request header"),
        }
        self
    }

    pub fn headers<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        pairs
            .into_iter()
            .fold(self, |request, (name, value)| request.header(name, value))
    }

    pub fn header_map(self, map: &HashMap<String, String>) -> Self {
        self.headers(map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// HTTP page loader with browser-like defaults and bounded retries. Every
/// redirect hop must pass the URL gate before it is followed.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    gate: Arc<dyn UrlGate>,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn gated_redirects(gate: Arc<dyn UrlGate>) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !gate.is_safe(attempt.url().as_str()) {
            let target = attempt.url().to_string();
            attempt.error(BlockedRedirect(target))
        } else {
            attempt.follow()
        }
    })
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_retry(DEFAULT_RETRY)
    }

    pub fn with_retry(retry: RetryPolicy) -> Result<Self, FetchError> {
        Self::with_gate(retry, Arc::new(SsrfGuard))
    }

    pub fn with_gate(retry: RetryPolicy, gate: Arc<dyn UrlGate>) -> Result<Self, FetchError> {
        let mut defaults = HeaderMap::new();
        for (name, value) in DEFAULT_HEADERS {
            defaults.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }

        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(MOBILE_SAFARI_UA)
            .redirect(gated_redirects(gate.clone()))
            .default_headers(defaults)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            retry,
            gate,
        })
    }

    /// Whether the gate this fetcher follows redirects under accepts `url`.
    pub fn allows(&self, url: &str) -> bool {
        self.gate.is_safe(url)
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &str, request: &FetchRequest) -> Result<PageResponse, FetchError> {
        let parsed_url = Url::parse(url)?;
        with_retry(
            self.retry,
            || self.fetch_once(parsed_url.clone(), request),
            FetchError::should_retry,
        )
        .await
    }

    async fn fetch_once(&self, url: Url, request: &FetchRequest) -> Result<PageResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(request.timeout)
            .headers(request.headers.clone())
            .send()
            .await?;

        // Check content length before downloading
        if let Some(content_length) = response.content_length()
            && content_length > MAX_BODY_SIZE
        {
            return Err(FetchError::BodyTooLarge(content_length));
        }

        let url_final = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        if is_login_bounce(&url, &url_final) {
            return Err(FetchError::LoginRedirect(url_final));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(FetchError::NotHtml(content_type));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        // Content-Length may be absent or wrong
        if body.len() as u64 > MAX_BODY_SIZE {
            return Err(FetchError::BodyTooLarge(body.len() as u64));
        }

        let (body_utf8, charset) = decode_html(&content_type, &body);
        debug!(status = status.as_u16(), charset = charset.name(), bytes = body.len(), "Fetched page");

        Ok(PageResponse {
            url_final,
            status,
            headers,
            body_utf8,
            charset,
            fetched_at: Utc::now(),
        })
    }

    /// Follows redirects from `url` and returns where they end.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn resolve_redirect(&self, url: &str, timeout: Duration) -> Result<Url, FetchError> {
        let parsed_url = Url::parse(url)?;
        let response = self
            .client
            .get(parsed_url)
            .timeout(timeout)
            .send()
            .await?;

        let resolved = response.url().clone();
        debug!(resolved = %resolved, "Resolved short link");
        Ok(resolved)
    }
}
