//! Latency and outcome metrics collected during a load test.
//!
//! Every running session reports into a shared [`LatencyRecorder`]: one sample for the
//! session as a whole, and one sample for each request it executed. When all sessions
//! have finished the recorder is aggregated into a [`LoadTestResult`], which is what
//! [`LoadTest::execute()`](../struct.LoadTest.html#method.execute) returns.
//!
//! A request is successful when a response is received with a status code below 400.
//! A session is successful when every request in it is successful.

pub mod percentile;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::session::SessionConfig;
use crate::util;
use self::percentile::{mean_ms, PercentileTable};

/// Timing samples and outcome counters for one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeMetrics {
    /// Every recorded latency, in the order recorded.
    pub times: Vec<Duration>,
    /// How many recorded outcomes were successful.
    pub success_count: usize,
    /// How many recorded outcomes failed.
    pub fail_count: usize,
}
impl ScopeMetrics {
    /// Record one sample and its outcome.
    pub(crate) fn set_time(&mut self, time: Duration, success: bool) {
        self.times.push(time);
        if success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
    }
}

/// Session samples, one slot per iteration.
#[derive(Debug, Default)]
struct SessionMetrics {
    times: Vec<Option<Duration>>,
    success_count: usize,
    fail_count: usize,
}

/// Shared sink for all samples recorded while sessions run.
///
/// Session samples and request samples are guarded by independent locks.
#[derive(Debug)]
pub struct LatencyRecorder {
    sessions: Mutex<SessionMetrics>,
    requests: Mutex<HashMap<i64, ScopeMetrics>>,
}
/// Session slots allocated up front, larger runs grow as sessions are recorded.
pub(crate) const PRESIZED_SESSIONS: usize = 65_536;

impl LatencyRecorder {
    /// Create a recorder expecting `iterations` session samples.
    pub fn new(iterations: usize) -> Self {
        LatencyRecorder {
            sessions: Mutex::new(SessionMetrics {
                times: vec![None; iterations.min(PRESIZED_SESSIONS)],
                success_count: 0,
                fail_count: 0,
            }),
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Record the total time and outcome of the session run as iteration `index`.
    pub async fn record_session(&self, index: usize, time: Duration, success: bool) {
        let mut sessions = self.sessions.lock().await;
        if index >= sessions.times.len() {
            // Iterations beyond the initial capacity still count.
            trace!("session {} beyond initial capacity", index);
            sessions.times.resize(index + 1, None);
        }
        if sessions.times[index].replace(time).is_some() {
            warn!("session {} recorded more than once", index);
        }
        if success {
            sessions.success_count += 1;
        } else {
            sessions.fail_count += 1;
        }
    }

    /// Record the latency and outcome of one request.
    pub async fn record_request(&self, request_id: i64, time: Duration, success: bool) {
        self.requests
            .lock()
            .await
            .entry(request_id)
            .or_default()
            .set_time(time, success);
    }

    /// Copy of the metrics recorded for the session scope.
    pub async fn session_metrics(&self) -> ScopeMetrics {
        let sessions = self.sessions.lock().await;
        ScopeMetrics {
            times: sessions.times.iter().flatten().copied().collect(),
            success_count: sessions.success_count,
            fail_count: sessions.fail_count,
        }
    }

    /// Copy of the metrics recorded for one request id, if any were recorded.
    pub async fn request_metrics(&self, request_id: i64) -> Option<ScopeMetrics> {
        self.requests.lock().await.get(&request_id).cloned()
    }

    /// Build the final result once every session has finished.
    ///
    /// Per-request statistics follow the order requests are defined in the session,
    /// once per distinct request id, named after the first request with that id.
    /// Requests that never ran are left out.
    pub async fn aggregate(&self, session: &SessionConfig) -> LoadTestResult {
        let session_metrics = self.session_metrics().await;
        if session_metrics.times.is_empty() {
            warn!("no session samples were recorded");
        }

        let mut request_stats = Vec::new();
        for request in session.requests.iter().unique_by(|r| r.id) {
            match self.request_metrics(request.id).await {
                Some(metrics) if !metrics.times.is_empty() => {
                    request_stats.push(RequestStats {
                        request_id: request.id,
                        request_name: request.name.clone(),
                        avg_time_ms: mean_ms(&metrics.times).unwrap_or_default(),
                        success: metrics.success_count,
                        failures: metrics.fail_count,
                        percentile_time_ms: PercentileTable::from_samples(&metrics.times),
                    });
                }
                _ => {
                    debug!(
                        "request {} ({}) never ran, omitting statistics",
                        request.id, request.name
                    );
                }
            }
        }

        LoadTestResult {
            avg_time_ms: mean_ms(&session_metrics.times).unwrap_or_default(),
            success: session_metrics.success_count,
            failures: session_metrics.fail_count,
            percentile_time_ms: PercentileTable::from_samples(&session_metrics.times),
            request_stats,
        }
    }
}

/// Statistics for one distinct request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub request_id: i64,
    pub request_name: String,
    /// Average latency in milliseconds.
    pub avg_time_ms: f64,
    /// Requests that received a response with a status code below 400.
    pub success: usize,
    /// Requests that failed to send or received a status code of 400 or above.
    pub failures: usize,
    /// Latency percentiles in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile_time_ms: Option<PercentileTable>,
}

/// The result of a complete load test.
///
/// Session-level statistics measure each session from the start of its first request
/// to the end of its last executed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestResult {
    /// Average session latency in milliseconds.
    pub avg_time_ms: f64,
    /// Sessions in which every request succeeded.
    pub success: usize,
    /// Sessions stopped by a failing request.
    pub failures: usize,
    /// Session latency percentiles in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile_time_ms: Option<PercentileTable>,
    /// Per-request statistics, in the order requests are defined.
    pub request_stats: Vec<RequestStats>,
}
impl LoadTestResult {
    /// Total number of sessions that ran.
    pub fn sessions(&self) -> usize {
        self.success + self.failures
    }

    /// Statistics for a request id, if it ran.
    pub fn request(&self, request_id: i64) -> Option<&RequestStats> {
        self.request_stats
            .iter()
            .find(|stats| stats.request_id == request_id)
    }

    /// Log a short overview of the result.
    pub(crate) fn log_overview(&self) {
        info!(
            "sessions: {} succeeded, {} failed, average {:.2} ms",
            util::format_number(self.success),
            util::format_number(self.failures),
            self.avg_time_ms
        );
        if let Some(table) = &self.percentile_time_ms {
            info!(
                "session latency: p50 {:.2} ms, p95 {:.2} ms, p100 {:.2} ms",
                table.get(50).unwrap_or_default(),
                table.get(95).unwrap_or_default(),
                table.get(100).unwrap_or_default()
            );
        }
        for stats in &self.request_stats {
            info!(
                "request {} ({}): {} succeeded, {} failed, average {:.2} ms",
                stats.request_id,
                stats.request_name,
                util::format_number(stats.success),
                util::format_number(stats.failures),
                stats.avg_time_ms
            );
        }
    }
}
