//! # Kaskade
//!
//! Kaskade runs an HTTP session, an ordered list of requests simulating one user,
//! repeatedly and in parallel against a server, and reports how long each session
//! and each request took.
//!
//! Kaskade uses [`reqwest`](https://docs.rs/reqwest/) to provide the HTTP client and
//! [`tokio`](https://docs.rs/tokio/) to run sessions concurrently.
//!
//! ## Defining a load test
//!
//! A load test is described by a [`SessionConfig`](./session/struct.SessionConfig.html):
//! the server to load test, how many sessions may run at the same time, how many
//! sessions to run in total, and the requests that make up one session. It can be
//! built programmatically or parsed from a JSON document:
//!
//! ```rust
//! use kaskade::prelude::*;
//!
//! fn main() -> Result<(), KaskadeError> {
//!     let session = SessionConfig::new("http://127.0.0.1:8080", 4, 100)
//!         .register_request(
//!             RequestDefinition::new(1, "/login")
//!                 .set_name("login")
//!                 .set_method("POST")
//!                 .set_body(r#"{"user":"foo","password":"bar"}"#)
//!                 .set_content_type("application/json"),
//!         )
//!         .register_request(RequestDefinition::new(2, "/profile").set_name("profile"));
//!
//!     let load_test = LoadTest::initialize(session)?;
//!     # let _ = load_test;
//!     // let result = load_test.execute()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Running a load test
//!
//! Each session runs its requests one after another in the order they were defined,
//! with its own cookie store so later requests can depend on cookies set by earlier
//! ones. A request fails when it can't be sent or the server responds with a status
//! code of 400 or above. The first failing request ends its session: the remaining
//! requests of that session are not sent, and the session counts as a failure.
//!
//! No more than `concurrencyNumber` sessions run at the same time, and exactly
//! `totalRequests` sessions run in total. Failed requests are not retried.
//!
//! ## Results
//!
//! When every session has finished, [`LoadTest::execute()`](./struct.LoadTest.html#method.execute)
//! returns a [`LoadTestResult`](./metrics/struct.LoadTestResult.html) with the number of
//! successful and failed sessions, the average session time, and the session time at
//! every percentile from 0 to 100. The same statistics are included for each distinct
//! request id, except for requests that never ran because an earlier request always
//! failed.
//!
//! Percentiles use the nearest rank: samples are sorted and percentile `p` is the
//! sample at index `floor(n * p / 100)`. The 100th percentile is the slowest sample.
//!
//! ## The `loadtester` binary
//!
//! The `loadtester` binary reads a session document on stdin and writes the result
//! document to stdout:
//!
//! ```bash
//! $ echo '{"serverUrl": "http://127.0.0.1:8080", "concurrencyNumber": 2,
//!          "totalRequests": 4, "requests": [{"requestId": 1, "url": "/", "method": "GET"}]}' \
//!     | loadtester
//! {"avgTimeMs":1.92,"success":4,"failures":0,"percentileTimeMs":{"0":1.41, ... ,"100":2.57},"requestStats":[...]}
//! ```
//!
//! Logs are written to stderr. Run `loadtester -h` for all options.
//!
//! ## License
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! <http://www.apache.org/licenses/LICENSE-2.0>
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

#[macro_use]
extern crate log;

pub mod config;
pub mod metrics;
pub mod prelude;
pub mod session;
pub mod summary;
mod user;
pub mod util;

use chrono::prelude::*;
use futures::future::join_all;
use std::sync::Arc;
use std::{fmt, io, time};
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;

use crate::metrics::{LatencyRecorder, LoadTestResult};
use crate::session::SessionConfig;
use crate::summary::SummaryMetrics;

/// An enumeration of all errors a [`LoadTest`](./struct.LoadTest.html) can return.
#[derive(Debug)]
pub enum KaskadeError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a [`serde_json::Error`](https://docs.rs/serde_json/*/serde_json/struct.Error.html).
    Json(serde_json::Error),
    /// Wraps a ['tokio::task::JoinError'](https://docs.rs/tokio/*/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// A request definition could not be turned into an HTTP request.
    InvalidRequest {
        /// The `requestId` of the offending definition.
        request_id: i64,
        /// An optional explanation of the error.
        detail: String,
    },
    /// The session defines no requests.
    NoRequests {
        /// An optional explanation of the error.
        detail: String,
    },
}
/// Implement a helper to provide a text description of all possible types of errors.
impl KaskadeError {
    fn describe(&self) -> &str {
        match *self {
            KaskadeError::Io(_) => "io::Error",
            KaskadeError::Reqwest(_) => "reqwest::Error",
            KaskadeError::Json(_) => "serde_json::Error",
            KaskadeError::TokioJoin(_) => "tokio::task::JoinError",
            KaskadeError::InvalidOption { .. } => "invalid option or value specified",
            KaskadeError::InvalidRequest { .. } => "invalid request definition",
            KaskadeError::NoRequests { .. } => "no requests defined",
        }
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for KaskadeError {
    // Implement display of error with `{}` marker.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            KaskadeError::Io(ref source) => {
                write!(f, "KaskadeError: {} ({})", self.describe(), source)
            }
            KaskadeError::Reqwest(ref source) => {
                write!(f, "KaskadeError: {} ({})", self.describe(), source)
            }
            KaskadeError::Json(ref source) => {
                write!(f, "KaskadeError: {} ({})", self.describe(), source)
            }
            KaskadeError::TokioJoin(ref source) => {
                write!(f, "KaskadeError: {} ({})", self.describe(), source)
            }
            KaskadeError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "KaskadeError: {} ({} = {:?}: {})",
                self.describe(),
                option,
                value,
                detail
            ),
            KaskadeError::InvalidRequest {
                request_id,
                ref detail,
            } => write!(
                f,
                "KaskadeError: {} (requestId {}: {})",
                self.describe(),
                request_id,
                detail
            ),
            KaskadeError::NoRequests { ref detail } => {
                write!(f, "KaskadeError: {} ({})", self.describe(), detail)
            }
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for KaskadeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            KaskadeError::Io(ref source) => Some(source),
            KaskadeError::Reqwest(ref source) => Some(source),
            KaskadeError::Json(ref source) => Some(source),
            KaskadeError::TokioJoin(ref source) => Some(source),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for KaskadeError {
    fn from(err: reqwest::Error) -> KaskadeError {
        KaskadeError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for KaskadeError {
    fn from(err: io::Error) -> KaskadeError {
        KaskadeError::Io(err)
    }
}

/// Auto-convert JSON errors.
impl From<serde_json::Error> for KaskadeError {
    fn from(err: serde_json::Error) -> KaskadeError {
        KaskadeError::Json(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for KaskadeError {
    fn from(err: tokio::task::JoinError) -> KaskadeError {
        KaskadeError::TokioJoin(err)
    }
}

/// A validated load test, ready to run.
#[derive(Debug, Clone)]
pub struct LoadTest {
    /// The session every iteration runs, shared read-only with all iterations.
    session: Arc<SessionConfig>,
}
impl LoadTest {
    /// Validate the session and prepare a [`LoadTest`](./struct.LoadTest.html).
    ///
    /// Configuration errors are returned here, before any request is sent.
    ///
    /// # Example
    /// ```rust
    /// use kaskade::prelude::*;
    ///
    /// // A session with no requests is refused.
    /// let session = SessionConfig::new("http://127.0.0.1", 1, 1);
    /// assert!(LoadTest::initialize(session).is_err());
    /// ```
    pub fn initialize(session: SessionConfig) -> Result<LoadTest, KaskadeError> {
        session.validate()?;
        Ok(LoadTest {
            session: Arc::new(session),
        })
    }

    /// The session this load test runs.
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Run the load test on a new multi-threaded runtime, blocking until every
    /// session has finished.
    pub fn execute(self) -> Result<LoadTestResult, KaskadeError> {
        let rt = Runtime::new()?;
        rt.block_on(self.run())
    }

    /// Run the load test on the current runtime.
    ///
    /// Exactly `totalRequests` sessions are launched, each waiting for one of
    /// `concurrencyNumber` permits before it starts and releasing it when it finishes.
    /// Statistics are only computed once every session has finished.
    pub async fn run(self) -> Result<LoadTestResult, KaskadeError> {
        let concurrency = self.session.concurrency_limit();
        let iterations = self.session.total_iterations();

        let started = time::Instant::now();
        info!(
            "launching {} sessions of {} requests against {} at {}, concurrency {}",
            util::format_number(iterations),
            self.session.requests.len(),
            self.session.server_url,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            concurrency
        );

        let recorder = Arc::new(LatencyRecorder::new(iterations));
        let capacity = Arc::new(Semaphore::new(concurrency));

        let mut sessions = Vec::with_capacity(iterations.min(metrics::PRESIZED_SESSIONS));
        for index in 0..iterations {
            // Wait for capacity before launching the next session. The semaphore is
            // never closed, so acquiring only fails if tokio breaks that contract.
            let permit = capacity
                .clone()
                .acquire_owned()
                .await
                .expect("capacity semaphore closed");
            let session = self.session.clone();
            let recorder = recorder.clone();
            sessions.push(tokio::spawn(async move {
                user::session_main(index, session, recorder).await;
                // Release capacity on every exit path.
                drop(permit);
            }));
        }

        // Wait for every session to finish.
        let mut join_error = None;
        for (index, finished) in join_all(sessions).await.into_iter().enumerate() {
            if let Err(e) = finished {
                error!("session {} did not complete: {}", index, e);
                join_error.get_or_insert(e);
            }
        }
        if let Some(e) = join_error {
            return Err(e.into());
        }

        let elapsed = started.elapsed();
        info!(
            "all sessions finished at {} after {:.3} seconds",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            elapsed.as_secs_f64()
        );

        let result = recorder.aggregate(&self.session).await;
        result.log_overview();

        let summary = SummaryMetrics::from_payload(
            &serde_json::to_value(&*self.session)?,
            &serde_json::to_value(&result)?,
        );
        debug!("summary: {:?}", summary);

        Ok(result)
    }
}
