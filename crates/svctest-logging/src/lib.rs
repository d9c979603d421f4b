//! ---
//! svctest_section: "03-logging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Structured logging adapters and check events."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Environment variable taking precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "SVCTEST_LOG";
const DEFAULT_FILTER: &str = "info";

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Initialize the tracing subscriber. Events go to stderr; stdout is left to
/// the driver's result marker.
///
/// Filter precedence: `SVCTEST_LOG`, `RUST_LOG`, `configured`, then `info`.
/// Calling this more than once is harmless.
pub fn init(format: LogFormat, configured: Option<&str>) {
    let directive = select_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
        configured,
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("invalid log directive {directive:?} ({err}); defaulting to {DEFAULT_FILTER}");
        EnvFilter::new(DEFAULT_FILTER)
    });

    let fmt_layer = match format {
        LogFormat::Pretty => subscriber_fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => subscriber_fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let _ = Registry::default().with(filter).with(fmt_layer).try_init();
}

fn select_directive(
    svctest_log: Option<String>,
    rust_log: Option<String>,
    configured: Option<&str>,
) -> String {
    svctest_log
        .into_iter()
        .chain(rust_log)
        .chain(configured.map(str::to_owned))
        .find(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}

/// Structured context propagated by the logging macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Object path the event concerns.
    pub object_path: Option<&'a str>,
    /// Interface qualifier, when one was used.
    pub interface: Option<&'a str>,
    /// Remote member name.
    pub member: Option<&'a str>,
    /// Name of the running check.
    pub check: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an object path.
    pub fn with_object_path(mut self, object_path: &'a str) -> Self {
        self.object_path = Some(object_path);
        self
    }

    /// Attach an interface name.
    pub fn with_interface(mut self, interface: &'a str) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Attach a member name.
    pub fn with_member(mut self, member: &'a str) -> Self {
        self.member = Some(member);
        self
    }

    /// Attach a check name.
    pub fn with_check(mut self, check: &'a str) -> Self {
        self.check = Some(check);
        self
    }
}

/// Result of a single assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The expectation held.
    Pass,
    /// The expectation was violated.
    Fail,
}

impl CheckOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Pass => "pass",
            CheckOutcome::Fail => "fail",
        }
    }
}

/// Emit a standardized check event with a pass/fail outcome.
pub fn log_check_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: CheckOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let object_path = ctx.object_path.unwrap_or("");
    let interface = ctx.interface.unwrap_or("");
    let member = ctx.member.unwrap_or("");
    let check = ctx.check.unwrap_or("");
    // Event levels must be constant at the callsite.
    match outcome {
        CheckOutcome::Fail => tracing::error!(
            event,
            outcome = outcome.as_str(),
            object_path,
            interface,
            member,
            check,
            message = %message
        ),
        CheckOutcome::Pass => tracing::info!(
            event,
            outcome = outcome.as_str(),
            object_path,
            interface,
            member,
            check,
            message = %message
        ),
    }
}
