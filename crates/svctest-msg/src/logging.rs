//! ---
//! svctest_section: "02-bus-messaging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Call logging and call counters."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::types::MethodCall;
use crate::BusError;

/// Direction of a call event, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    /// Call handed to the transport.
    Outbound,
    /// Successful reply received.
    Reply,
    /// Error reply or transport failure received.
    Error,
}

/// Emit a structured log entry for call activity.
pub fn log_call(direction: CallDirection, call: &MethodCall) {
    debug!(
        destination = %call.destination,
        path = %call.path,
        interface = call.interface.as_deref().unwrap_or(""),
        member = %call.member,
        signature = %call.signature(),
        direction = ?direction,
        "bus call activity"
    );
}

/// Snapshot of call counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallMetrics {
    /// Calls issued.
    pub calls: u64,
    /// Successful replies.
    pub replies: u64,
    /// Error replies produced by the service.
    pub remote_errors: u64,
    /// Local or connection-level failures.
    pub transport_errors: u64,
}

#[derive(Default)]
pub(crate) struct CallCounters {
    calls: AtomicU64,
    replies: AtomicU64,
    remote_errors: AtomicU64,
    transport_errors: AtomicU64,
}

impl CallCounters {
    pub(crate) fn observe_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn observe_outcome<T>(&self, outcome: &Result<T, BusError>) {
        let counter = match outcome {
            Ok(_) => &self.replies,
            Err(BusError::Remote(_)) => &self.remote_errors,
            Err(_) => &self.transport_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CallMetrics {
        CallMetrics {
            calls: self.calls.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}
