//! Upstream error type shared by the catalog clients.

use super::http::HttpError;
use super::retry::Retryable;
use thiserror::Error;

/// A transient or upstream-side fault talking to an external service.
///
/// Raised only after the client's retry budget is exhausted, or straight away
/// for failures that retrying cannot fix (4xx status).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Network failure or non-success status
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The service answered but the document could not be understood
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl UpstreamError {
    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status code, when the failure was a status response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(HttpError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

impl Retryable for UpstreamError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_transient(),
            // A half-written or proxy-mangled document may come back whole
            Self::Malformed { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_is_retryable() {
        assert!(UpstreamError::malformed("http://x", "bad json").is_retryable());
    }

    #[test]
    fn test_client_status_not_retryable() {
        let e: UpstreamError = HttpError::Status {
            status: 404,
            url: "http://x".into(),
        }
        .into();
        assert!(!e.is_retryable());
        assert_eq!(e.status(), Some(404));
    }

    #[test]
    fn test_display_includes_url() {
        let e = UpstreamError::malformed("http://catalog", "missing features");
        assert_eq!(
            e.to_string(),
            "malformed response from http://catalog: missing features"
        );
    }
}
