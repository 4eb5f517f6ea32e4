use tracing::{debug, instrument, warn};

use crate::{
    errors::ExtractError,
    extractor::{ExtractedContent, ExtractionOptions, PageExtractor},
    fetcher::{FetchRequest, HttpFetcher},
};

/// Loads a page over plain HTTP and hands it to a [`PageExtractor`].
#[derive(Debug, Clone)]
pub struct FetchExtractor {
    http: HttpFetcher,
}

impl FetchExtractor {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    /// The page HTML: the caller's preloaded copy when present, otherwise fetched.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn load_html(
        &self,
        url: &str,
        options: &ExtractionOptions,
        platform_headers: &[(&str, &str)],
    ) -> Result<String, ExtractError> {
        if let Some(html) = options.preloaded() {
            debug!(bytes = html.len(), "Using preloaded HTML");
            return Ok(html.to_string());
        }

        let request = FetchRequest::new(options.timeout())
            .headers(platform_headers.iter().copied())
            .header_map(&options.headers);

        let page = self.http.fetch(url, &request).await?;
        Ok(page.body_utf8)
    }

    pub async fn extract(
        &self,
        url: &str,
        options: &ExtractionOptions,
        page: &dyn PageExtractor,
    ) -> Result<ExtractedContent, ExtractError> {
        let html = self.load_html(url, options, page.request_headers()).await?;
        Ok(page.extract(&html, url))
    }

    /// Follows a short link; on failure, or when the target is not allowed,
    /// the original URL is kept.
    pub async fn resolve_short_link(&self, url: &str, options: &ExtractionOptions) -> String {
        match self.http.resolve_redirect(url, options.timeout()).await {
            Ok(resolved) if self.http.allows(resolved.as_str()) => resolved.to_string(),
            Ok(resolved) => {
                warn!(url, %resolved, "Short link points at a disallowed address");
                url.to_string()
            }
            Err(e) => {
                warn!(url, error = %e, "Short link resolution failed, using original URL");
                url.to_string()
            }
        }
    }
}
