use httpmock::{Method::GET, MockServer};
use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Output, Stdio};

use kaskade::prelude::*;

const INDEX_PATH: &str = "/";

// Run the loadtester binary, writing the document to its stdin.
fn run_loadtester(document: &str, args: &[&str]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_loadtester"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to launch loadtester");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(document.as_bytes())
        .expect("failed to write session document");
    child
        .wait_with_output()
        .expect("failed to wait for loadtester")
}

#[test]
// The session document is read from stdin and the result written to stdout.
fn stdin_to_stdout() {
    let server = MockServer::start();
    let index = server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        then.status(200);
    });

    let document = json!({
        "serverUrl": server.base_url(),
        "concurrencyNumber": 2,
        "totalRequests": 5,
        "requests": [{"requestId": 1, "requestName": "index", "url": INDEX_PATH, "method": "GET"}]
    });
    let output = run_loadtester(&document.to_string(), &[]);
    assert!(output.status.success());
    assert_eq!(index.hits(), 5);

    // Stdout holds exactly one result document.
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    let result: LoadTestResult = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result.success, 5);
    assert_eq!(result.failures, 0);
    assert_eq!(result.request(1).unwrap().request_name, "index");

    let raw: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(raw["percentileTimeMs"].as_object().unwrap().len(), 101);
    assert!(raw["requestStats"][0]["percentileTimeMs"]["50"].is_number());
}

#[test]
// Command line options override the document.
fn overrides() {
    let server = MockServer::start();
    let index = server.mock(|when, then| {
        when.method(GET).path(INDEX_PATH);
        then.status(200);
    });

    let document = json!({
        "serverUrl": "http://127.0.0.1:1",
        "concurrencyNumber": 1,
        "totalRequests": 1,
        "requests": [{"requestId": 1, "url": INDEX_PATH}]
    });
    let host = server.base_url();
    let output = run_loadtester(
        &document.to_string(),
        &["--host", &host, "-i", "3", "-u", "3", "--format", "pretty", "-q"],
    );
    assert!(output.status.success());
    assert_eq!(index.hits(), 3);

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().count() > 1);
    let result: LoadTestResult = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result.success, 3);
}

#[test]
// Invalid documents exit with an error and no result.
fn invalid_documents() {
    let no_requests = json!({
        "serverUrl": "http://127.0.0.1:1",
        "concurrencyNumber": 1,
        "totalRequests": 1,
        "requests": []
    });
    let no_concurrency = json!({
        "serverUrl": "http://127.0.0.1:1",
        "concurrencyNumber": 0,
        "totalRequests": 1,
        "requests": [{"requestId": 1, "url": "/"}]
    });
    let documents = [
        "not json".to_string(),
        no_requests.to_string(),
        no_concurrency.to_string(),
    ];
    for document in &documents {
        let output = run_loadtester(document, &[]);
        assert!(!output.status.success(), "accepted {}", document);
        assert!(output.stdout.is_empty());
        assert!(!output.stderr.is_empty());
    }
}

#[test]
fn version() {
    let output = run_loadtester("", &["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("kaskade "));
}
