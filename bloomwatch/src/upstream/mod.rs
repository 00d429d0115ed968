//! Shared plumbing for talking to external services.
//!
//! - [`http`] - the [`AsyncHttpClient`] seam and its reqwest implementation
//! - [`retry`] - bounded exponential backoff with jitter
//! - [`error`] - [`UpstreamError`], the failure every catalog client reports

mod error;
pub mod http;
pub mod retry;

pub use error::UpstreamError;
pub use http::{AsyncHttpClient, AsyncReqwestClient, HttpError, DEFAULT_HTTP_TIMEOUT_SECS};
pub use retry::{
    Retryable, RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY_MS,
    DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
};
