//! ---
//! svctest_section: "02-bus-messaging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Bus call model, transports and the typed sample service client."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod client;
pub mod logging;
pub mod session;
pub mod transcript;
pub mod transport;
pub mod types;

use std::time::Duration;

/// Shared result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Failure modes of a bus call, from connection setup to reply decoding.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The bus could not be reached.
    #[error("unable to connect to the {bus} bus: {reason}")]
    Connect {
        /// Human-readable bus description.
        bus: String,
        /// Underlying failure.
        reason: String,
    },
    /// The remote side answered with an error reply.
    #[error("remote error: {0}")]
    Remote(RemoteError),
    /// No reply arrived within the configured call timeout.
    #[error("call {call} timed out after {timeout:?}")]
    Timeout {
        /// Rendered call description.
        call: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },
    /// The call could not be built locally (bad path, name or member).
    #[error("invalid call {call}: {reason}")]
    InvalidCall {
        /// Rendered call description.
        call: String,
        /// Validation failure.
        reason: String,
    },
    /// The reply body could not be decoded.
    #[error("unable to decode reply to {call}: {reason}")]
    Decode {
        /// Rendered call description.
        call: String,
        /// Decoder failure.
        reason: String,
    },
    /// The reply decoded fine but carried a value of the wrong kind.
    #[error("unexpected reply to {call}: expected {expected}, got {actual}")]
    UnexpectedReply {
        /// Rendered call description.
        call: String,
        /// Expected value kind.
        expected: &'static str,
        /// Received value, rendered.
        actual: String,
    },
    /// Connection-level failure while a call was in flight.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Wrapper for IO errors (runtime setup, transcripts).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for transcript (de)serialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BusError {
    /// The remote error carried by this failure, if the service produced one.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            BusError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

pub use client::{SampleObject, ServiceClient, INTERFACE1, INTERFACE2, INTROSPECTABLE};
pub use logging::{log_call, CallDirection, CallMetrics};
pub use session::{BusAddress, SessionTransport};
pub use transcript::{replay_from_file, RecordingTransport, TranscriptEntry, TranscriptOutcome};
pub use transport::{ScriptedTransport, SignalWatch, Transport};
pub use types::{Arg, MethodCall, RemoteError, ReplyValue, SignalRecord};
