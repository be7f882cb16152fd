// ABOUTME: FetchGuard wraps a page GET with browser headers, bounded redirects, per-attempt timeout and retry.
// ABOUTME: Every failure is returned as a FetchFailure value; nothing here panics or propagates reqwest errors.

pub mod decode;
pub mod headers;
pub mod network;
pub mod retry;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::redirect::Policy;
use tracing::{debug, warn};
use url::Url;

use crate::error::PreviewError;
use crate::options::Options;
use self::decode::decode_body;
use self::headers::browser_headers;
use self::network::{ensure_public, ensure_public_literal, HostCheck, PublicResolver};
use self::retry::RetryPolicy;

/// Why a fetch did not produce a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The attempt exceeded its wall-clock budget.
    Timeout,
    /// The server answered with a non-2xx status.
    HttpError(u16),
    /// DNS, connect, reset or body transfer failure.
    NetworkError,
    /// The redirect chain exceeded the hop bound.
    TooManyRedirects,
    /// The host (or a redirect hop) resolves to a private address.
    Blocked,
    /// The body exceeds the configured size limit.
    TooLarge,
}

impl FailureReason {
    /// Only transient server and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureReason::NetworkError => true,
            FailureReason::HttpError(code) => (500..600).contains(code),
            _ => false,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::HttpError(code) => write!(f, "HTTP {}", code),
            FailureReason::NetworkError => write!(f, "network error"),
            FailureReason::TooManyRedirects => write!(f, "too many redirects"),
            FailureReason::Blocked => write!(f, "blocked host"),
            FailureReason::TooLarge => write!(f, "content too large"),
        }
    }
}

/// A fetch that exhausted its attempts or hit a non-retryable failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} after {attempts} attempt(s): {detail}")]
pub struct FetchFailure {
    pub reason: FailureReason,
    pub attempts: u32,
    pub detail: String,
}

/// A page retrieved with a 2xx status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL of the page actually served, after redirects.
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body_html: String,
    pub attempts: u32,
}

pub type FetchOutcome = Result<FetchedPage, FetchFailure>;

/// Errors raised from the redirect policy so they can be told apart from transport errors.
#[derive(Debug, thiserror::Error)]
enum RedirectRefused {
    #[error("more than {0} redirects")]
    TooMany(usize),
    #[error("redirect refused: {0}")]
    Blocked(HostCheck),
}

#[derive(Debug)]
struct AttemptError {
    reason: FailureReason,
    detail: String,
}

impl AttemptError {
    fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

fn redirect_policy(max_redirects: usize, allow_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(RedirectRefused::TooMany(max_redirects));
        }
        if !allow_private {
            if let Err(check) = ensure_public_literal(attempt.url()) {
                return attempt.error(RedirectRefused::Blocked(check));
            }
        }
        attempt.follow()
    })
}

fn find_source<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

fn classify(err: &reqwest::Error) -> AttemptError {
    if let Some(refused) = find_source::<RedirectRefused>(err) {
        let reason = match refused {
            RedirectRefused::TooMany(_) => FailureReason::TooManyRedirects,
            RedirectRefused::Blocked(HostCheck::Private(_)) => FailureReason::Blocked,
            RedirectRefused::Blocked(HostCheck::Unresolved { .. }) => FailureReason::NetworkError,
        };
        return AttemptError::new(reason, refused.to_string());
    }
    // raised by PublicResolver while connecting
    if let Some(check) = find_source::<HostCheck>(err) {
        return host_check_error(check.clone());
    }
    if err.is_timeout() {
        return AttemptError::new(FailureReason::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return AttemptError::new(FailureReason::TooManyRedirects, err.to_string());
    }
    AttemptError::new(FailureReason::NetworkError, err.to_string())
}

fn host_check_error(check: HostCheck) -> AttemptError {
    match check {
        HostCheck::Private(_) => AttemptError::new(FailureReason::Blocked, check.to_string()),
        HostCheck::Unresolved { .. } => {
            AttemptError::new(FailureReason::NetworkError, check.to_string())
        }
    }
}

/// Retrieves pages for metadata extraction.
#[derive(Debug, Clone)]
pub struct FetchGuard {
    http: reqwest::Client,
    headers: HeaderMap,
    retry: RetryPolicy,
    max_content_length: usize,
    allow_private_networks: bool,
    // caller-supplied clients resolve without PublicResolver
    precheck_dns: bool,
}

impl FetchGuard {
    /// Build a guard from validated options.
    pub fn new(opts: &Options) -> Result<Self, PreviewError> {
        let headers = browser_headers(&opts.user_agent, &opts.headers)?;

        let precheck_dns = opts.http_client.is_some();
        let http = match opts.http_client.clone() {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder()
                    .redirect(redirect_policy(
                        opts.max_redirects,
                        opts.allow_private_networks,
                    ))
                    .gzip(true)
                    .brotli(true)
                    .deflate(true);
                if !opts.allow_private_networks {
                    builder = builder.dns_resolver(Arc::new(PublicResolver));
                }
                builder
                    .build()
                    .map_err(|e| PreviewError::client("build", Some(anyhow::Error::new(e))))?
            }
        };

        Ok(Self {
            http,
            headers,
            retry: RetryPolicy::new(opts.backoff_base, opts.max_backoff),
            max_content_length: opts.max_content_length,
            allow_private_networks: opts.allow_private_networks,
            precheck_dns,
        })
    }

    /// Fetch `url`, making at most `max_retries + 1` attempts of at most `timeout` each.
    ///
    /// Timeouts and non-retryable failures end the loop immediately. Retryable
    /// failures sleep `base * 2^n` before the next attempt. Dropping the returned
    /// future cancels the in-flight request or sleep.
    pub async fn fetch(&self, url: &Url, timeout: Duration, max_retries: u32) -> FetchOutcome {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            debug!(url = %url, attempt = attempts, "fetching page");

            let failure = match tokio::time::timeout(timeout, self.attempt(url)).await {
                Ok(Ok(mut page)) => {
                    page.attempts = attempts;
                    return Ok(page);
                }
                Ok(Err(err)) => err,
                Err(_) => AttemptError::new(
                    FailureReason::Timeout,
                    format!("no response within {}ms", timeout.as_millis()),
                ),
            };

            if !failure.reason.is_retryable() || attempts > max_retries {
                debug!(
                    url = %url,
                    attempts,
                    reason = %failure.reason,
                    detail = %failure.detail,
                    "fetch failed"
                );
                return Err(FetchFailure {
                    reason: failure.reason,
                    attempts,
                    detail: failure.detail,
                });
            }

            let delay = self.retry.delay_for_retry(attempts - 1);
            warn!(
                url = %url,
                attempt = attempts,
                reason = %failure.reason,
                detail = %failure.detail,
                delay_ms = delay.as_millis() as u64,
                "fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, url: &Url) -> Result<FetchedPage, AttemptError> {
        if !self.allow_private_networks {
            if self.precheck_dns {
                ensure_public(url).await.map_err(host_check_error)?;
            } else {
                ensure_public_literal(url).map_err(host_check_error)?;
            }
        }

        let mut response = self
            .http
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let final_url = response.url().clone();
        if !self.allow_private_networks
            && self.precheck_dns
            && final_url.host_str() != url.host_str()
        {
            ensure_public(&final_url).await.map_err(host_check_error)?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::new(
                FailureReason::HttpError(status.as_u16()),
                format!("{} returned {}", final_url, status),
            ));
        }

        let declared_length = response.content_length().or_else(|| {
            response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
        });
        if let Some(len) = declared_length {
            if len > self.max_content_length as u64 {
                return Err(AttemptError::new(
                    FailureReason::TooLarge,
                    format!("declared length {} exceeds limit", len),
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(&e))? {
            if body.len() + chunk.len() > self.max_content_length {
                return Err(AttemptError::new(
                    FailureReason::TooLarge,
                    format!("body exceeds {} bytes", self.max_content_length),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            body_html: decode_body(&body, content_type.as_deref()),
            content_type,
            attempts: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_guard() -> FetchGuard {
        let opts = Options {
            allow_private_networks: true,
            backoff_base: Duration::from_millis(10),
            ..Default::default()
        };
        FetchGuard::new(&opts).unwrap()
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Local server that drops the first `failures` connections and then serves `body`.
    async fn flaky_server(failures: u32, body: &'static str) -> (Url, Arc<AtomicU32>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicU32::new(0));
        let counter = connections.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                if seen < failures {
                    drop(socket);
                    continue;
                }
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/html; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let url = Url::parse(&format!("http://{}/page", addr)).unwrap();
        (url, connections)
    }

    #[tokio::test]
    async fn fetch_returns_page_and_sends_browser_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/page")
                .header("dnt", "1")
                .header("upgrade-insecure-requests", "1")
                .header("accept-language", "en-US,en;q=0.9");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<html><title>Hi</title></html>");
        });

        let url = Url::parse(&server.url("/page")).unwrap();
        let page = test_guard().fetch(&url, TIMEOUT, 2).await.expect("fetch ok");
        mock.assert();

        assert_eq!(page.status, 200);
        assert_eq!(page.attempts, 1);
        assert_eq!(page.final_url, url);
        assert_eq!(page.body_html, "<html><title>Hi</title></html>");
        assert_eq!(
            page.content_type.as_deref(),
            Some("text/html; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn fetch_reports_final_url_after_redirect() {
        let server = MockServer::start();
        let target = server.url("/new/home");
        let redirect = server.mock(|when, then| {
            when.method(GET).path("/old");
            then.status(301).header("location", target.as_str());
        });
        let landing = server.mock(|when, then| {
            when.method(GET).path("/new/home");
            then.status(200).body("<html></html>");
        });

        let url = Url::parse(&server.url("/old")).unwrap();
        let page = test_guard().fetch(&url, TIMEOUT, 0).await.expect("fetch ok");
        redirect.assert();
        landing.assert();

        assert_eq!(page.final_url.path(), "/new/home");
    }

    #[tokio::test]
    async fn redirect_chain_is_bounded() {
        let server = MockServer::start();
        let hops: Vec<_> = (0..6)
            .map(|i| {
                let path = format!("/hop{}", i);
                let next = format!("/hop{}", i + 1);
                server.mock(move |when, then| {
                    when.method(GET).path(path.as_str());
                    then.status(302).header("location", next.as_str());
                })
            })
            .collect();

        let opts = Options {
            allow_private_networks: true,
            max_redirects: 3,
            ..Default::default()
        };
        let guard = FetchGuard::new(&opts).unwrap();
        let url = Url::parse(&server.url("/hop0")).unwrap();
        let failure = guard.fetch(&url, TIMEOUT, 2).await.expect_err("chain too long");

        assert_eq!(failure.reason, FailureReason::TooManyRedirects);
        assert_eq!(failure.attempts, 1);
        for hop in &hops[..4] {
            hop.assert_calls(1);
        }
        hops[4].assert_calls(0);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("not found");
        });

        let url = Url::parse(&server.url("/missing")).unwrap();
        let failure = test_guard().fetch(&url, TIMEOUT, 2).await.expect_err("404");

        assert_eq!(failure.reason, FailureReason::HttpError(404));
        assert_eq!(failure.attempts, 1);
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn server_error_is_retried_until_exhausted() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503);
        });

        let url = Url::parse(&server.url("/flaky")).unwrap();
        let failure = test_guard().fetch(&url, TIMEOUT, 2).await.expect_err("503");

        assert_eq!(failure.reason, FailureReason::HttpError(503));
        assert_eq!(failure.attempts, 3);
        mock.assert_calls(3);
    }

    #[tokio::test]
    async fn dropped_connections_are_retried_then_succeed() {
        let (url, connections) = flaky_server(2, "<html>ok</html>").await;

        let page = test_guard().fetch(&url, TIMEOUT, 2).await.expect("third try");

        assert_eq!(page.attempts, 3);
        assert_eq!(page.body_html, "<html>ok</html>");
        assert_eq!(connections.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistent_network_error_makes_max_retries_plus_one_attempts() {
        let (url, connections) = flaky_server(u32::MAX, "").await;

        let failure = test_guard().fetch(&url, TIMEOUT, 2).await.expect_err("always down");

        assert_eq!(failure.reason, FailureReason::NetworkError);
        assert_eq!(failure.attempts, 3);
        assert_eq!(connections.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_is_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicU32::new(0));
        let counter = connections.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let url = Url::parse(&format!("http://{}/slow", addr)).unwrap();
        let started = Instant::now();
        let failure = test_guard()
            .fetch(&url, Duration::from_millis(200), 2)
            .await
            .expect_err("never answers");

        assert_eq!(failure.reason, FailureReason::Timeout);
        assert_eq!(failure.attempts, 1);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn private_host_is_blocked_without_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/internal");
            then.status(200).body("secret");
        });

        let guard = FetchGuard::new(&Options::default()).unwrap();
        let url = Url::parse(&format!("http://127.0.0.1:{}/internal", server.port())).unwrap();
        let failure = guard.fetch(&url, TIMEOUT, 2).await.expect_err("blocked");

        assert_eq!(failure.reason, FailureReason::Blocked);
        assert_eq!(failure.attempts, 1);
        mock.assert_calls(0);
    }

    #[tokio::test]
    async fn private_name_is_refused_at_resolution() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/internal");
            then.status(200).body("secret");
        });

        let guard = FetchGuard::new(&Options::default()).unwrap();
        let url = Url::parse(&format!("http://localhost:{}/internal", server.port())).unwrap();
        let failure = guard.fetch(&url, TIMEOUT, 2).await.expect_err("blocked");

        assert_eq!(failure.reason, FailureReason::Blocked);
        assert_eq!(failure.attempts, 1);
        mock.assert_calls(0);
    }

    #[tokio::test]
    async fn cookies_are_not_kept_between_fetches() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/login");
            then.status(200)
                .header("set-cookie", "sid=secret; Path=/")
                .body("<html></html>");
        });
        let replayed = server.mock(|when, then| {
            when.method(GET).path("/other").header_exists("cookie");
            then.status(200).body("replayed");
        });
        let clean = server.mock(|when, then| {
            when.method(GET).path("/other").header_missing("cookie");
            then.status(200).body("clean");
        });

        let guard = test_guard();
        let login = Url::parse(&server.url("/login")).unwrap();
        guard.fetch(&login, TIMEOUT, 0).await.expect("login");

        let other = Url::parse(&server.url("/other")).unwrap();
        let page = guard.fetch(&other, TIMEOUT, 0).await.expect("other");

        assert_eq!(page.body_html, "clean");
        replayed.assert_calls(0);
        clean.assert_calls(1);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/big");
            then.status(200).body("x".repeat(64));
        });

        let opts = Options {
            allow_private_networks: true,
            max_content_length: 16,
            ..Default::default()
        };
        let guard = FetchGuard::new(&opts).unwrap();
        let url = Url::parse(&server.url("/big")).unwrap();
        let failure = guard.fetch(&url, TIMEOUT, 2).await.expect_err("too big");

        assert_eq!(failure.reason, FailureReason::TooLarge);
        assert_eq!(failure.attempts, 1);
    }

    #[test]
    fn retryable_reasons() {
        assert!(FailureReason::NetworkError.is_retryable());
        assert!(FailureReason::HttpError(500).is_retryable());
        assert!(FailureReason::HttpError(503).is_retryable());
        assert!(!FailureReason::HttpError(404).is_retryable());
        assert!(!FailureReason::HttpError(429).is_retryable());
        assert!(!FailureReason::Timeout.is_retryable());
        assert!(!FailureReason::TooManyRedirects.is_retryable());
        assert!(!FailureReason::Blocked.is_retryable());
        assert!(!FailureReason::TooLarge.is_retryable());
    }
}
