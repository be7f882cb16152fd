// ABOUTME: MetadataService orchestrates normalization, fetching, extraction and fallback merging.
// ABOUTME: Every lookup returns a total MetadataResult; failures are absorbed into the fallback path.

use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use url::Url;

use crate::error::PreviewError;
use crate::extract::MetadataExtractor;
use crate::fallback;
use crate::fetch::{FailureReason, FetchGuard};
use crate::options::{MetadataRequest, Options, ServiceBuilder};
use crate::result::{Diagnostics, MetadataResult, ResolutionPath};

/// Normalize a user-supplied URL for fetching.
///
/// Trims whitespace and assumes `https://` when no scheme is given. Only
/// http(s) URLs with a host are accepted.
pub fn normalize_url(raw: &str) -> Result<Url, PreviewError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PreviewError::invalid_url(
            raw,
            "normalize",
            Some(anyhow::anyhow!("empty URL")),
        ));
    }

    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| {
        PreviewError::invalid_url(raw, "normalize", Some(anyhow::anyhow!("malformed URL: {}", e)))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(PreviewError::invalid_url(
            raw,
            "normalize",
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(PreviewError::invalid_url(
            raw,
            "normalize",
            Some(anyhow::anyhow!("URL has no host")),
        ));
    }

    Ok(url)
}

/// `host:port` is not a scheme; `mailto:x` and `http://x` are.
fn has_scheme(input: &str) -> bool {
    let Some((scheme, rest)) = input.split_once(':') else {
        return false;
    };

    let mut chars = scheme.chars();
    let valid_scheme = chars.next().map_or(false, |c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid_scheme {
        return false;
    }

    let port = rest.split(['/', '?', '#']).next().unwrap_or("");
    port.is_empty() || !port.chars().all(|c| c.is_ascii_digit())
}

/// Fetches link previews. Cheap to clone; holds no per-call state.
#[derive(Debug, Clone)]
pub struct MetadataService {
    opts: Options,
    guard: FetchGuard,
    extractor: MetadataExtractor,
}

impl MetadataService {
    /// Create a new ServiceBuilder for configuring the service.
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    /// Create a service from options, validating them first.
    pub fn new(opts: Options) -> Result<Self, PreviewError> {
        opts.validate()?;
        let guard = FetchGuard::new(&opts)?;
        Ok(Self {
            opts,
            guard,
            extractor: MetadataExtractor::default(),
        })
    }

    /// Replace the extraction rules.
    pub fn with_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Build a request for `url` using this service's timeout and retry budget.
    pub fn request(&self, url: &str) -> MetadataRequest {
        MetadataRequest::from_options(url, &self.opts)
    }

    /// Look up preview metadata for `url`. Never fails.
    pub async fn get_metadata(&self, url: &str) -> MetadataResult {
        self.get_metadata_for(&self.request(url)).await
    }

    /// Look up preview metadata with a per-request budget. Never fails.
    pub async fn get_metadata_for(&self, request: &MetadataRequest) -> MetadataResult {
        self.run(request).await.0
    }

    /// Like `get_metadata`, also returning a diagnostics record of the lookup.
    pub async fn inspect(&self, url: &str) -> (MetadataResult, Diagnostics) {
        self.run(&self.request(url)).await
    }

    /// Look up many URLs with at most `concurrency` lookups in flight. Output order matches input.
    pub async fn get_many<I, S>(&self, urls: I, concurrency: usize) -> Vec<MetadataResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inspect_many(urls, concurrency)
            .await
            .into_iter()
            .map(|(result, _)| result)
            .collect()
    }

    /// Batch variant of `inspect`.
    pub async fn inspect_many<I, S>(
        &self,
        urls: I,
        concurrency: usize,
    ) -> Vec<(MetadataResult, Diagnostics)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requests: Vec<MetadataRequest> = urls
            .into_iter()
            .map(|url| self.request(url.as_ref()))
            .collect();

        stream::iter(requests.iter().map(|request| self.run(request)))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn run(&self, request: &MetadataRequest) -> (MetadataResult, Diagnostics) {
        let clock = Instant::now();
        let target = request.target_url();
        let mut diag = Diagnostics {
            requested_url: target.to_string(),
            normalized_url: None,
            final_url: None,
            started_at: Utc::now(),
            elapsed_ms: 0,
            attempts: 0,
            status: None,
            content_type: None,
            html_length: None,
            path: ResolutionPath::FallbackOnly,
            failure: None,
            extracted: None,
        };

        let url = match normalize_url(target) {
            Ok(url) => url,
            Err(err) => {
                warn!(url = %target, error = %err, "unusable URL, returning fallback metadata");
                diag.failure = Some(err.to_string());
                diag.elapsed_ms = clock.elapsed().as_millis() as u64;
                return (fallback::synthesize(target), diag);
            }
        };
        diag.normalized_url = Some(url.to_string());

        let result = match self
            .guard
            .fetch(&url, request.timeout(), request.max_retries())
            .await
        {
            Ok(page) => {
                let extracted = self.extractor.extract(&page.body_html, &page.final_url);
                let fallback = fallback::synthesize(page.final_url.as_str());

                diag.path = ResolutionPath::Extracted;
                diag.final_url = Some(page.final_url.to_string());
                diag.attempts = page.attempts;
                diag.status = Some(page.status);
                diag.html_length = Some(page.body_html.len());
                diag.content_type = page.content_type.clone();
                diag.extracted = Some(extracted.clone());

                debug!(
                    url = %url,
                    final_url = %page.final_url,
                    attempts = page.attempts,
                    html_length = page.body_html.len(),
                    "extracted page metadata"
                );
                extracted.merge_over(fallback)
            }
            Err(failure) => {
                warn!(
                    url = %url,
                    reason = %failure.reason,
                    attempts = failure.attempts,
                    detail = %failure.detail,
                    "failed to fetch metadata, returning fallback"
                );
                diag.attempts = failure.attempts;
                if let FailureReason::HttpError(code) = failure.reason {
                    diag.status = Some(code);
                }
                diag.failure = Some(failure.to_string());
                fallback::synthesize(url.as_str())
            }
        };

        diag.elapsed_ms = clock.elapsed().as_millis() as u64;
        (result, diag)
    }
}
