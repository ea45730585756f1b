use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use http::Method;
use reqwest::{Client, Request};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics::LatencyRecorder;
use crate::session::{RequestDefinition, SessionConfig};
use crate::util;
use crate::KaskadeError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The outcome of one executed request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RequestOutcome {
    /// Time from dispatch until response headers were received, or an error occurred.
    pub response_time: Duration,
    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,
    /// A response was received with a status code below 400.
    pub success: bool,
}

/// A simulated user running one iteration of the session.
///
/// Each user owns its own client and cookie store, so cookies set by a request are
/// sent by later requests in the same iteration and never shared between iterations.
#[derive(Debug)]
pub(crate) struct SessionUser {
    /// Zero-based iteration this user is running.
    pub index: usize,
    /// Base url every request path is appended to.
    pub base_url: String,
    client: Client,
}
impl SessionUser {
    pub(crate) fn new(index: usize, base_url: &str) -> Result<Self, KaskadeError> {
        let builder = Client::builder().user_agent(APP_USER_AGENT).gzip(true);
        #[cfg(feature = "cookies")]
        let builder = builder.cookie_store(true);

        Ok(SessionUser {
            index,
            base_url: base_url.to_string(),
            client: builder.build()?,
        })
    }

    /// Build the request, applying `contentType` first so explicit headers replace it.
    pub(crate) fn build_request(
        &self,
        definition: &RequestDefinition,
    ) -> Result<Request, KaskadeError> {
        let method = Method::from_bytes(definition.method().as_bytes()).map_err(|e| {
            KaskadeError::InvalidRequest {
                request_id: definition.id,
                detail: format!("invalid method {:?}: {}", definition.method, e),
            }
        })?;

        let mut headers = HeaderMap::new();
        if !definition.content_type.is_empty() {
            let value = HeaderValue::from_str(&definition.content_type).map_err(|e| {
                KaskadeError::InvalidRequest {
                    request_id: definition.id,
                    detail: format!("invalid content type {:?}: {}", definition.content_type, e),
                }
            })?;
            headers.insert(CONTENT_TYPE, value);
        }
        for header in &definition.headers {
            let name = HeaderName::from_bytes(header.key.as_bytes()).map_err(|e| {
                KaskadeError::InvalidRequest {
                    request_id: definition.id,
                    detail: format!("invalid header name {:?}: {}", header.key, e),
                }
            })?;
            let value = HeaderValue::from_str(&header.value).map_err(|e| {
                KaskadeError::InvalidRequest {
                    request_id: definition.id,
                    detail: format!("invalid value for header {:?}: {}", header.key, e),
                }
            })?;
            headers.insert(name, value);
        }

        let url = util::compose_url(&self.base_url, &definition.url);
        let mut builder = self.client.request(method, &url).headers(headers);
        if !definition.body.is_empty() {
            builder = builder.body(definition.body.clone());
        }
        Ok(builder.build()?)
    }

    /// Build and send one request. Never returns an error: failures are part of the
    /// outcome.
    pub(crate) async fn send(&self, definition: &RequestDefinition) -> RequestOutcome {
        let building = Instant::now();
        match self.build_request(definition) {
            Ok(request) => self.dispatch(request, definition).await,
            Err(e) => {
                warn!("[session {}] failed to build request: {}", self.index, e);
                // The time spent failing to build is the only sample available.
                RequestOutcome {
                    response_time: building.elapsed(),
                    status_code: None,
                    success: false,
                }
            }
        }
    }

    /// Send a built request, timing it from dispatch until response headers arrive.
    pub(crate) async fn dispatch(
        &self,
        request: Request,
        definition: &RequestDefinition,
    ) -> RequestOutcome {
        let url = request.url().to_string();

        let started = Instant::now();
        let response = self.client.execute(request).await;
        let response_time = started.elapsed();

        match response {
            Ok(r) => {
                let status_code = r.status().as_u16();
                debug!(
                    "[session {}] {} {}: status_code {} in {:?}",
                    self.index,
                    definition.method(),
                    url,
                    status_code,
                    response_time
                );
                let success = status_code < 400;
                if success {
                    // Drain the body so the connection can be reused.
                    if let Err(e) = r.bytes().await {
                        warn!("[session {}] {}: failed to read body: {}", self.index, url, e);
                    }
                }
                RequestOutcome {
                    response_time,
                    status_code: Some(status_code),
                    success,
                }
            }
            Err(e) => {
                warn!("[session {}] {}: {}", self.index, url, e);
                RequestOutcome {
                    response_time,
                    status_code: None,
                    success: false,
                }
            }
        }
    }
}

/// Run iteration `index` of the session, recording every executed request and the
/// session as a whole.
///
/// Requests run one at a time in the order defined. The first failing request ends
/// the iteration: later requests are not sent and the session is recorded as failed.
/// The session time runs from the first dispatch until the last executed request
/// completes.
pub(crate) async fn session_main(
    index: usize,
    session: Arc<SessionConfig>,
    recorder: Arc<LatencyRecorder>,
) {
    debug!("launching session {}...", index);

    let user = match SessionUser::new(index, &session.server_url) {
        Ok(u) => u,
        Err(e) => {
            error!("failed to build client for session {}: {}", index, e);
            recorder.record_session(index, Duration::ZERO, false).await;
            return;
        }
    };

    let started = Instant::now();
    let mut success = true;
    for definition in &session.requests {
        let outcome = user.send(definition).await;
        recorder
            .record_request(definition.id, outcome.response_time, outcome.success)
            .await;
        if !outcome.success {
            debug!(
                "session {} stopped by request {} ({}), status_code {:?}",
                index, definition.id, definition.name, outcome.status_code
            );
            success = false;
            break;
        }
    }
    let elapsed = started.elapsed();
    recorder.record_session(index, elapsed, success).await;

    debug!("exiting session {} after {:?}...", index, elapsed);
}
