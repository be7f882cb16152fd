// ABOUTME: Configuration for the metadata pipeline: Options, ServiceBuilder and MetadataRequest.
// ABOUTME: ServiceBuilder validates options and constructs an immutable MetadataService.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::PreviewError;
use crate::service::MetadataService;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default redirect hop bound.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
/// Maximum allowed content length (10 MB).
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// Desktop Chrome User-Agent sent with the browser header set.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration options for a metadata service.
#[derive(Debug, Clone)]
pub struct Options {
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_redirects: usize,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
    pub max_content_length: usize,
    pub allow_private_networks: bool,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    pub http_client: Option<reqwest::Client>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            allow_private_networks: false,
            user_agent: BROWSER_USER_AGENT.to_string(),
            headers: HashMap::new(),
            http_client: None,
        }
    }
}

impl Options {
    /// Check the invariants the fetch loop relies on.
    pub fn validate(&self) -> Result<(), PreviewError> {
        if self.timeout.is_zero() {
            return Err(PreviewError::invalid_config(
                "build",
                Some(anyhow::anyhow!("timeout must be greater than zero")),
            ));
        }
        if self.max_redirects == 0 {
            return Err(PreviewError::invalid_config(
                "build",
                Some(anyhow::anyhow!("max_redirects must be greater than zero")),
            ));
        }
        if self.max_content_length == 0 {
            return Err(PreviewError::invalid_config(
                "build",
                Some(anyhow::anyhow!("max_content_length must be greater than zero")),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing MetadataService instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    opts: Options,
}

impl ServiceBuilder {
    /// Create a new ServiceBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the number of retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.opts.max_retries = max_retries;
        self
    }

    /// Set the redirect hop bound.
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.opts.max_redirects = max_redirects;
        self
    }

    /// Set the base delay of the exponential backoff.
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.opts.backoff_base = base;
        self
    }

    /// Cap a single backoff sleep.
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.opts.max_backoff = max;
        self
    }

    /// Set the largest body accepted, in bytes.
    pub fn max_content_length(mut self, len: usize) -> Self {
        self.opts.max_content_length = len;
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Add a header on top of the browser header set.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Use a custom HTTP client. Its redirect and timeout settings are used as-is.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Build the service with the configured options.
    pub fn build(self) -> Result<MetadataService, PreviewError> {
        MetadataService::new(self.opts)
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A single metadata lookup: the raw target plus its fetch budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    target_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl MetadataRequest {
    /// Create a request. The target is not validated here; a zero timeout is rejected.
    pub fn new(
        target_url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, PreviewError> {
        let target_url = target_url.into();
        if timeout.is_zero() {
            return Err(PreviewError::invalid_config(
                "request",
                Some(anyhow::anyhow!("timeout must be greater than zero")),
            ));
        }
        Ok(Self {
            target_url,
            timeout,
            max_retries,
        })
    }

    /// Request with the budget from already validated options.
    pub(crate) fn from_options(target_url: impl Into<String>, opts: &Options) -> Self {
        Self {
            target_url: target_url.into(),
            timeout: opts.timeout,
            max_retries: opts.max_retries,
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recommended_policy() {
        let opts = Options::default();
        assert_eq!(opts.timeout, Duration::from_secs(10));
        assert_eq!(opts.max_retries, 2);
        assert_eq!(opts.max_redirects, 10);
        assert_eq!(opts.backoff_base, Duration::from_secs(1));
        assert!(!opts.allow_private_networks);
        assert!(opts.user_agent.contains("Chrome/120"));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ServiceBuilder::new()
            .timeout(Duration::ZERO)
            .build()
            .expect_err("zero timeout must fail");
        assert!(err.is_invalid_config());
    }

    #[test]
    fn zero_redirects_is_rejected() {
        let err = ServiceBuilder::new()
            .max_redirects(0)
            .build()
            .expect_err("zero redirects must fail");
        assert!(err.is_invalid_config());
    }

    #[test]
    fn request_rejects_zero_timeout() {
        let err = MetadataRequest::new("https://example.com", Duration::ZERO, 2)
            .expect_err("zero timeout must fail");
        assert!(err.is_invalid_config());
    }

    #[test]
    fn request_keeps_raw_target() {
        let req = MetadataRequest::new("  not a url ", Duration::from_millis(5), 0).unwrap();
        assert_eq!(req.target_url(), "  not a url ");
        assert_eq!(req.timeout(), Duration::from_millis(5));
        assert_eq!(req.max_retries(), 0);
    }
}
