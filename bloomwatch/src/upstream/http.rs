//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Default User-Agent string for upstream requests.
const DEFAULT_USER_AGENT: &str = concat!("bloomwatch/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Transport-level failure of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The request did not complete in time
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Connection or protocol failure before a response arrived
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be read
    #[error("failed to read response from {url}: {message}")]
    Body { url: String, message: String },

    /// The client itself could not be constructed
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl HttpError {
    /// Returns true if repeating the same request may succeed.
    ///
    /// Client errors (4xx) are permanent except for 408 and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Request { .. } | Self::Body { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Client(_) => false,
        }
    }

    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Trait for asynchronous HTTP client operations.
///
/// Every upstream client in the crate talks HTTP through this trait so tests
/// can substitute scripted responses.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an async HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;

    /// Performs an async HTTP GET request with custom headers.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `headers` - Slice of (header_name, header_value) tuples
    fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;

    /// Performs an async HTTP POST request with JSON body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `json_body` - JSON body as a string
    fn post_json(
        &self,
        url: &str,
        json_body: &str,
    ) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;

    /// Performs an async HTTP POST request with a raw body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `content_type` - Value of the `Content-Type` header
    /// * `body` - Request payload
    /// * `headers` - Extra (header_name, header_value) tuples
    fn post_bytes(
        &self,
        url: &str,
        content_type: &str,
        body: &[u8],
        headers: &[(&str, &str)],
    ) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;
}

/// Async HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a new client with the default timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT_SECS)
    }

    /// Creates a new client with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    async fn execute(&self, url: &str, request: reqwest::RequestBuilder) -> Result<Vec<u8>, HttpError> {
        trace!(url = url, "HTTP request starting");

        let response = match request.send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(HttpError::from_reqwest(url, e));
            }
        };

        if !response.status().is_success() {
            warn!(
                url = url,
                status = response.status().as_u16(),
                "HTTP error status"
            );
            return Err(HttpError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                if e.is_timeout() {
                    Err(HttpError::Timeout {
                        url: url.to_string(),
                    })
                } else {
                    Err(HttpError::Body {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.execute(url, self.client.get(url)).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, HttpError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.execute(url, request).await
    }

    async fn post_json(&self, url: &str, json_body: &str) -> Result<Vec<u8>, HttpError> {
        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(json_body.to_string());
        self.execute(url, request).await
    }

    async fn post_bytes(
        &self,
        url: &str,
        content_type: &str,
        body: &[u8],
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, HttpError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", content_type)
            .body(body.to_vec());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.execute(url, request).await
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock async HTTP client returning the same response for every call
    #[derive(Clone)]
    pub struct MockAsyncHttpClient {
        pub response: Result<Vec<u8>, HttpError>,
    }

    impl AsyncHttpClient for MockAsyncHttpClient {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, HttpError> {
            self.response.clone()
        }

        async fn get_with_headers(
            &self,
            _url: &str,
            _headers: &[(&str, &str)],
        ) -> Result<Vec<u8>, HttpError> {
            self.response.clone()
        }

        async fn post_json(&self, _url: &str, _json_body: &str) -> Result<Vec<u8>, HttpError> {
            self.response.clone()
        }

        async fn post_bytes(
            &self,
            _url: &str,
            _content_type: &str,
            _body: &[u8],
            _headers: &[(&str, &str)],
        ) -> Result<Vec<u8>, HttpError> {
            self.response.clone()
        }
    }

    /// One request seen by [`ScriptedHttpClient`].
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: &'static str,
        pub url: String,
        pub body: Vec<u8>,
        pub headers: Vec<(String, String)>,
    }

    /// Mock client that replays queued responses in order.
    ///
    /// When the queue runs dry every further call fails with a 500.
    #[derive(Default)]
    pub struct ScriptedHttpClient {
        responses: Mutex<VecDeque<(Duration, Result<Vec<u8>, HttpError>)>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl ScriptedHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_ok(&self, body: impl Into<Vec<u8>>) -> &Self {
            self.push(Ok(body.into()))
        }

        pub fn push(&self, response: Result<Vec<u8>, HttpError>) -> &Self {
            self.push_delayed(Duration::ZERO, response)
        }

        /// Queues a response that is only returned after `delay`.
        pub fn push_delayed(&self, delay: Duration, response: Result<Vec<u8>, HttpError>) -> &Self {
            self.responses.lock().unwrap().push_back((delay, response));
            self
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        async fn respond(
            &self,
            method: &'static str,
            url: &str,
            body: &[u8],
            headers: &[(&str, &str)],
        ) -> Result<Vec<u8>, HttpError> {
            self.requests.lock().unwrap().push(RecordedRequest {
                method,
                url: url.to_string(),
                body: body.to_vec(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some((delay, response)) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    response
                }
                None => Err(HttpError::Status {
                    status: 500,
                    url: url.to_string(),
                }),
            }
        }
    }

    impl AsyncHttpClient for ScriptedHttpClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
            self.respond("GET", url, &[], &[]).await
        }

        async fn get_with_headers(
            &self,
            url: &str,
            headers: &[(&str, &str)],
        ) -> Result<Vec<u8>, HttpError> {
            self.respond("GET", url, &[], headers).await
        }

        async fn post_json(&self, url: &str, json_body: &str) -> Result<Vec<u8>, HttpError> {
            self.respond("POST", url, json_body.as_bytes(), &[("Content-Type", "application/json")])
                .await
        }

        async fn post_bytes(
            &self,
            url: &str,
            content_type: &str,
            body: &[u8],
            headers: &[(&str, &str)],
        ) -> Result<Vec<u8>, HttpError> {
            let mut all = vec![("Content-Type", content_type)];
            all.extend_from_slice(headers);
            self.respond("POST", url, body, &all).await
        }
    }

    #[tokio::test]
    async fn test_mock_async_client_success() {
        let mock = MockAsyncHttpClient {
            response: Ok(vec![1, 2, 3, 4]),
        };

        let result = mock.get("http://example.com").await;
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_scripted_client_replays_in_order() {
        let client = ScriptedHttpClient::new();
        client.push_ok("first").push_ok("second");

        assert_eq!(client.get("http://a").await.unwrap(), b"first");
        assert_eq!(
            client.post_json("http://b", "{}").await.unwrap(),
            b"second"
        );
        assert!(client.get("http://c").await.is_err());

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].body, b"{}");
    }

    #[test]
    fn test_transient_classification() {
        let status = |status| HttpError::Status {
            status,
            url: "u".into(),
        };
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(400).is_transient());
        assert!(HttpError::Timeout { url: "u".into() }.is_transient());
        assert!(!HttpError::Client("x".into()).is_transient());
    }
}
