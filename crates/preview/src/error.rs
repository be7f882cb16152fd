// ABOUTME: Error types for urlist-preview construction and validation seams.
// ABOUTME: PreviewError never escapes a metadata lookup; it only guards builders and URL normalization.

use std::fmt;

/// Error codes representing the categories of setup failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    InvalidConfig,
    Client,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::InvalidConfig => "invalid configuration",
            ErrorCode::Client => "HTTP client error",
        };
        write!(f, "{}", s)
    }
}

/// The error type for building a service or validating its inputs.
#[derive(Debug, thiserror::Error)]
pub struct PreviewError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urlist-preview: {}", self.op)?;
        if !self.url.is_empty() {
            write!(f, " {}", self.url)?;
        }
        write!(f, ": {}", self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl PreviewError {
    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidUrl,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self {
            code: ErrorCode::InvalidConfig,
            url: String::new(),
            op: op.into(),
            source,
        }
    }

    /// Create a Client error.
    pub fn client(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self {
            code: ErrorCode::Client,
            url: String::new(),
            op: op.into(),
            source,
        }
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    /// Returns true if this is an InvalidConfig error.
    pub fn is_invalid_config(&self) -> bool {
        self.code == ErrorCode::InvalidConfig
    }

    /// Returns true if this is a Client error.
    pub fn is_client(&self) -> bool {
        self.code == ErrorCode::Client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_op_url_and_code() {
        let err = PreviewError::invalid_url(
            "ftp://example.com",
            "normalize",
            Some(anyhow::anyhow!("scheme must be http or https")),
        );
        assert_eq!(
            err.to_string(),
            "urlist-preview: normalize ftp://example.com: invalid URL: scheme must be http or https"
        );
        assert!(err.is_invalid_url());
    }

    #[test]
    fn display_omits_empty_url() {
        let err = PreviewError::invalid_config("build", None);
        assert_eq!(err.to_string(), "urlist-preview: build: invalid configuration");
        assert!(err.is_invalid_config());
        assert!(!err.is_client());
    }
}
