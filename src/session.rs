//! The session document describing a load test.
//!
//! A load test is defined by a single JSON document naming the server to load test,
//! how many sessions may run at once, how many sessions to run in total, and the
//! ordered list of requests that make up one session. For example:
//!
//! ```json
//! {
//!   "serverUrl": "http://127.0.0.1:8080",
//!   "concurrencyNumber": 2,
//!   "totalRequests": 4,
//!   "requests": [
//!     {"requestId": 1, "requestName": "login", "url": "/login", "method": "POST",
//!      "reqBody": "{\"user\":\"foo\"}", "contentType": "application/json"},
//!     {"requestId": 2, "requestName": "profile", "url": "/profile", "method": "GET"}
//!   ]
//! }
//! ```
//!
//! The document is loaded once and never modified while sessions are running.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::io::Read;
use tokio::sync::Semaphore;

use crate::KaskadeError;

/// One `key: value` header sent with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}

/// A single HTTP call within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDefinition {
    /// Per-request statistics are aggregated by this identifier. It does not need to
    /// be unique: requests sharing an id share statistics.
    #[serde(rename = "requestId")]
    pub id: i64,
    /// Display label included in the per-request statistics.
    #[serde(rename = "requestName", default)]
    pub name: String,
    /// Path fragment appended to the server url.
    #[serde(default)]
    pub url: String,
    /// HTTP verb, `GET` if empty.
    #[serde(default)]
    pub method: String,
    /// Raw request body, sent as is.
    #[serde(rename = "reqBody", default)]
    pub body: String,
    /// Headers in the order they are applied; later keys replace earlier ones.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Default `Content-Type` header, replaced by an explicit `Content-Type` header.
    #[serde(rename = "contentType", default)]
    pub content_type: String,
}
impl RequestDefinition {
    /// Create a new `GET` request definition with no body or headers.
    ///
    /// # Example
    /// ```rust
    /// use kaskade::session::RequestDefinition;
    ///
    /// let request = RequestDefinition::new(1, "/index.html")
    ///     .set_name("index")
    ///     .set_method("get");
    /// assert_eq!(request.method(), "GET");
    /// ```
    pub fn new(id: i64, url: &str) -> Self {
        RequestDefinition {
            id,
            name: String::new(),
            url: url.to_string(),
            method: String::new(),
            body: String::new(),
            headers: Vec::new(),
            content_type: String::new(),
        }
    }

    pub fn set_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn set_method(mut self, method: &str) -> Self {
        self.method = method.to_string();
        self
    }

    pub fn set_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn set_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// Append a header. Headers are applied in the order they were added.
    pub fn set_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push(Header {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// The upper-cased HTTP verb, defaulting to `GET`.
    pub fn method(&self) -> String {
        let method = self.method.trim();
        if method.is_empty() {
            "GET".to_string()
        } else {
            method.to_uppercase()
        }
    }
}

/// The complete definition of a load test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base url every request's path fragment is appended to.
    #[serde(rename = "serverUrl")]
    pub server_url: String,
    /// Maximum number of sessions running at the same time.
    #[serde(rename = "concurrencyNumber")]
    pub concurrency: i64,
    /// Total number of sessions to run.
    #[serde(rename = "totalRequests")]
    pub iterations: i64,
    /// Requests run in this order by every session.
    pub requests: Vec<RequestDefinition>,
    /// Optional test duration in seconds, only used to derive throughput.
    #[serde(
        rename = "testDuration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub test_duration: Option<f64>,
}
impl SessionConfig {
    /// Create a new session configuration with no requests.
    pub fn new(server_url: &str, concurrency: i64, iterations: i64) -> Self {
        SessionConfig {
            server_url: server_url.to_string(),
            concurrency,
            iterations,
            requests: Vec::new(),
            test_duration: None,
        }
    }

    /// Append a request to the session.
    pub fn register_request(mut self, request: RequestDefinition) -> Self {
        self.requests.push(request);
        self
    }

    /// Parse a session document from a string.
    ///
    /// # Example
    /// ```rust
    /// use kaskade::session::SessionConfig;
    ///
    /// let session = SessionConfig::from_json(
    ///     r#"{"serverUrl": "http://x", "concurrencyNumber": 2, "totalRequests": 4,
    ///         "requests": [{"requestId": 1, "url": "/a", "method": "GET"}]}"#,
    /// ).unwrap();
    /// assert_eq!(session.requests.len(), 1);
    /// assert!(session.validate().is_ok());
    /// ```
    pub fn from_json(document: &str) -> Result<Self, KaskadeError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Parse a session document from a reader, such as stdin.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, KaskadeError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Confirm the session can be run. Nothing is dispatched unless this succeeds.
    pub fn validate(&self) -> Result<(), KaskadeError> {
        if self.requests.is_empty() {
            return Err(KaskadeError::NoRequests {
                detail: "At least one request must be defined in `requests`.".to_string(),
            });
        }

        if self.concurrency < 1 {
            return Err(KaskadeError::InvalidOption {
                option: "`concurrencyNumber`".to_string(),
                value: self.concurrency.to_string(),
                detail: "`concurrencyNumber` must be set to at least 1.".to_string(),
            });
        }

        if self.iterations < 1 {
            return Err(KaskadeError::InvalidOption {
                option: "`totalRequests`".to_string(),
                value: self.iterations.to_string(),
                detail: "`totalRequests` must be set to at least 1.".to_string(),
            });
        }

        // Malformed urls are recorded as request failures rather than refused here.
        if let Err(e) = url::Url::parse(&self.server_url) {
            warn!("`serverUrl` {:?} does not parse as a url: {}", self.server_url, e);
        }

        Ok(())
    }

    /// Number of sessions allowed to run at once, only meaningful once validated.
    ///
    /// Never more than the number of sessions to run, nor more permits than a
    /// semaphore can hold.
    pub(crate) fn concurrency_limit(&self) -> usize {
        let concurrency = usize::try_from(self.concurrency.max(1)).unwrap_or(usize::MAX);
        concurrency
            .min(self.total_iterations().max(1))
            .min(Semaphore::MAX_PERMITS)
    }

    /// Number of sessions to run, only meaningful once validated.
    pub(crate) fn total_iterations(&self) -> usize {
        usize::try_from(self.iterations.max(0)).unwrap_or(usize::MAX)
    }
}
