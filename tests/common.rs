use httpmock::MockServer;

use kaskade::prelude::*;

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// Build a session against the mock server with the given concurrency, iterations
/// and requests.
#[allow(dead_code)]
pub fn build_session(
    server: &MockServer,
    concurrency: i64,
    iterations: i64,
    requests: Vec<RequestDefinition>,
) -> SessionConfig {
    let mut session = SessionConfig::new(&server.base_url(), concurrency, iterations);
    for request in requests {
        session = session.register_request(request);
    }
    session
}

/// Run a load test to completion, panicking on configuration errors.
#[allow(dead_code)]
pub fn run_load_test(session: SessionConfig) -> LoadTestResult {
    LoadTest::initialize(session)
        .expect("failed to initialize load test")
        .execute()
        .expect("failed to execute load test")
}

/// Confirm the counters and percentile table of a result are self-consistent.
#[allow(dead_code)]
pub fn validate_result(result: &LoadTestResult, success: usize, failures: usize) {
    assert_eq!(result.success, success);
    assert_eq!(result.failures, failures);

    let table = result
        .percentile_time_ms
        .as_ref()
        .expect("session percentiles missing");
    let values: Vec<f64> = table.iter().map(|(_, value)| value).collect();
    assert_eq!(values.len(), 101);
    // Percentiles never decrease.
    for pair in values.windows(2) {
        assert!(pair[0] <= pair[1], "percentiles out of order: {:?}", pair);
    }
    assert!(result.avg_time_ms >= values[0]);
    assert!(result.avg_time_ms <= values[100]);
}
