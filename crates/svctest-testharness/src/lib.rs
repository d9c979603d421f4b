//! ---
//! svctest_section: "05-test-driver"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Sample-service test driver: fixtures, checks and the ordered run."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
//! Drives a fixed sequence of calls against the sample service. Introspection
//! documents are compared byte-for-byte against golden fixtures (or recorded
//! into them), then every functional, error-path, dispatch, interface and
//! signal check runs in order. The first failed expectation ends the run.

use std::path::PathBuf;
use std::time::Duration;

use svctest_msg::BusError;
use thiserror::Error;

mod checks;
pub mod driver;
pub mod fixtures;

pub use driver::{DriverSettings, RunMode, RunSummary, TestDriver};
pub use fixtures::FixtureStore;

/// Result alias for harness operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Failed expectation or I/O failure ending a run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(
        "introspection of {path} differs from fixture #{index} ({}) at line {line}: expected {expected_line:?}, got {actual_line:?}",
        fixture.display()
    )]
    FixtureMismatch {
        index: usize,
        path: String,
        fixture: PathBuf,
        line: usize,
        expected_line: String,
        actual_line: String,
    },
    #[error("unable to read fixture {}", path.display())]
    FixtureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to write fixture {}", path.display())]
    FixtureWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{check}: expected {expected}, got {actual}")]
    UnexpectedValue {
        check: String,
        expected: String,
        actual: String,
    },
    #[error("{check}: expected a remote error but the call succeeded")]
    MissingError { check: String },
    #[error("{check}: expected remote error {expected:?}, got {actual:?}")]
    WrongErrorMessage {
        check: String,
        expected: String,
        actual: String,
    },
    #[error("{check}: call failed")]
    Call {
        check: String,
        #[source]
        source: BusError,
    },
    #[error("{check}: no signal from {path} within {timeout:?}")]
    SignalMissing {
        check: String,
        path: String,
        timeout: Duration,
    },
}
