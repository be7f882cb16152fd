// ABOUTME: Browser-impersonating request headers sent with every page fetch.
// ABOUTME: Caller-supplied headers are merged over the fixed set.

use std::collections::HashMap;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION,
    DNT, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};

use crate::error::PreviewError;

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// Build the header set for page requests.
pub fn browser_headers(
    user_agent: &str,
    extra: &HashMap<String, String>,
) -> Result<HeaderMap, PreviewError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, header_value(user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

    for (key, value) in extra {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            PreviewError::invalid_config(
                "headers",
                Some(anyhow::anyhow!("invalid header name {:?}: {}", key, e)),
            )
        })?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, PreviewError> {
    HeaderValue::from_str(value).map_err(|e| {
        PreviewError::invalid_config(
            "headers",
            Some(anyhow::anyhow!("invalid header value {:?}: {}", value, e)),
        )
    })
}
