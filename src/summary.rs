//! Summary metrics derived from a completed load test.
//!
//! Benchmark results are typically submitted to an ingestion service as a
//! [`BenchmarkPayload`], pairing the session document with the result document. The
//! service reduces each payload to four scalars, which [`SummaryMetrics`] computes
//! the same way so they can be reported at the end of a run:
//!
//!  - success ratio: `success / (success + failures) * 100`
//!  - p50 latency: `result.percentileTimeMs["50"]`
//!  - p95 latency: `result.percentileTimeMs["95"]`
//!  - throughput: `(success + failures) / config.testDuration`
//!
//! Any metric that can't be derived is set to [`UNAVAILABLE`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel for a summary metric that can't be derived.
pub const UNAVAILABLE: f64 = -1.0;

/// A benchmark run as submitted to the ingestion service.
///
/// `config` and `result` are arbitrary documents; a session document and a
/// [`LoadTestResult`](../metrics/struct.LoadTestResult.html) are one valid pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkPayload {
    pub session_id: String,
    pub version: String,
    pub config: Value,
    pub result: Value,
}
impl BenchmarkPayload {
    /// Derive the summary metrics of this payload.
    pub fn summary(&self) -> SummaryMetrics {
        SummaryMetrics::from_payload(&self.config, &self.result)
    }
}

/// The four scalars reported for a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    /// Percentage of successful sessions.
    pub success_ratio: f64,
    /// Median session latency in milliseconds.
    pub p50_latency: f64,
    /// 95th percentile session latency in milliseconds.
    pub p95_latency: f64,
    /// Sessions per second of configured test duration.
    pub throughput: f64,
}
impl SummaryMetrics {
    /// Derive the summary metrics from a config document and a result document.
    ///
    /// # Example
    /// ```rust
    /// use serde_json::json;
    /// use kaskade::summary::{SummaryMetrics, UNAVAILABLE};
    ///
    /// let summary = SummaryMetrics::from_payload(
    ///     &json!({"testDuration": 10}),
    ///     &json!({"success": 3, "failures": 1, "percentileTimeMs": {"50": 12.5}}),
    /// );
    /// assert_eq!(summary.success_ratio, 75.0);
    /// assert_eq!(summary.p50_latency, 12.5);
    /// assert_eq!(summary.p95_latency, UNAVAILABLE);
    /// assert_eq!(summary.throughput, 0.4);
    /// ```
    pub fn from_payload(config: &Value, result: &Value) -> Self {
        let success = result["success"].as_f64().unwrap_or(0.0);
        let failures = result["failures"].as_f64().unwrap_or(0.0);
        let total = success + failures;

        let success_ratio = if total > 0.0 {
            success / total * 100.0
        } else {
            UNAVAILABLE
        };

        let percentile = |key: &str| {
            result["percentileTimeMs"][key]
                .as_f64()
                .unwrap_or(UNAVAILABLE)
        };

        let throughput = match config["testDuration"].as_f64() {
            Some(duration) if duration > 0.0 => total / duration,
            _ => UNAVAILABLE,
        };

        SummaryMetrics {
            success_ratio,
            p50_latency: percentile("50"),
            p95_latency: percentile("95"),
            throughput,
        }
    }
}
