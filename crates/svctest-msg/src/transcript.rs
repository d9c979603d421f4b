//! ---
//! svctest_section: "02-bus-messaging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Call transcripts: recording live sessions and replaying them offline."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::transport::{ScriptedTransport, SignalWatch, Transport};
use crate::types::{MethodCall, RemoteError, ReplyValue};
use crate::{BusError, Result};

/// Outcome of a recorded call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum TranscriptOutcome {
    /// Successful reply.
    Reply(ReplyValue),
    /// Error reply produced by the service.
    Remote(RemoteError),
    /// Local or connection-level failure, rendered.
    Failure(String),
}

/// One line of a call transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Time the outcome was observed.
    pub timestamp: DateTime<Utc>,
    /// Call as sent.
    pub call: MethodCall,
    /// What came back.
    pub outcome: TranscriptOutcome,
}

/// Transport decorator appending every call and its outcome to a
/// newline-delimited JSON transcript.
pub struct RecordingTransport<T> {
    inner: T,
    sink: Mutex<File>,
}

impl<T: Transport> RecordingTransport<T> {
    /// Wrap `inner`, truncating any transcript already at `path`.
    pub fn create(inner: T, path: impl AsRef<Path>) -> Result<Self> {
        let sink = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            inner,
            sink: Mutex::new(sink),
        })
    }

    fn append(&self, entry: &TranscriptEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.sink.lock().write_all(line.as_bytes())?;
        Ok(())
    }
}

impl<T: Transport> Transport for RecordingTransport<T> {
    fn call(&self, call: &MethodCall) -> Result<ReplyValue> {
        let outcome = self.inner.call(call);
        let recorded = match &outcome {
            Ok(value) => TranscriptOutcome::Reply(value.clone()),
            Err(BusError::Remote(err)) => TranscriptOutcome::Remote(err.clone()),
            Err(other) => TranscriptOutcome::Failure(other.to_string()),
        };
        let entry = TranscriptEntry {
            timestamp: Utc::now(),
            call: call.clone(),
            outcome: recorded,
        };
        if let Err(err) = self.append(&entry) {
            warn!(call = %call, error = %err, "unable to append transcript entry");
        }
        outcome
    }

    fn subscribe(&self, sender: &str, path: &str) -> Result<Box<dyn SignalWatch>> {
        self.inner.subscribe(sender, path)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Build a scripted transport that replays the outcomes of a transcript.
///
/// Outcomes are queued per member in file order. Recorded local failures are
/// skipped; only replies and remote errors replay.
pub fn replay_from_file<P: AsRef<Path>>(path: P) -> Result<(ScriptedTransport, usize)> {
    let reader = BufReader::new(File::open(path)?);
    let transport = ScriptedTransport::new();
    let mut count = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: TranscriptEntry = serde_json::from_str(&line)?;
        let outcome = match entry.outcome {
            TranscriptOutcome::Reply(value) => Ok(value),
            TranscriptOutcome::Remote(err) => Err(err),
            TranscriptOutcome::Failure(_) => continue,
        };
        transport.enqueue(&entry.call.member, outcome);
        count += 1;
    }

    Ok((transport, count))
}
