//! ---
//! svctest_section: "02-bus-messaging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Transport abstraction and the scripted in-memory transport."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::types::{MethodCall, RemoteError, ReplyValue, SignalRecord};
use crate::{BusError, Result};

/// Blocking call interface shared by every bus backend.
pub trait Transport: Send + Sync {
    /// Issue a method call and block until its reply or error arrives.
    fn call(&self, call: &MethodCall) -> Result<ReplyValue>;
    /// Start collecting signals emitted by `sender` from the object at `path`.
    fn subscribe(&self, sender: &str, path: &str) -> Result<Box<dyn SignalWatch>>;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

/// Handle on an active signal subscription.
pub trait SignalWatch: Send {
    /// Wait up to `timeout` for the next signal. `Ok(None)` means nothing arrived.
    fn next_signal(&mut self, timeout: Duration) -> Result<Option<SignalRecord>>;
}

type Handler =
    Arc<dyn Fn(&MethodCall) -> std::result::Result<ReplyValue, RemoteError> + Send + Sync>;

type Outcome = std::result::Result<ReplyValue, RemoteError>;

#[derive(Default)]
struct Script {
    handlers: HashMap<String, Handler>,
    queued: HashMap<String, VecDeque<Outcome>>,
    emits: HashMap<String, Vec<SignalRecord>>,
}

/// In-memory transport answering calls from per-member handlers.
///
/// Queued outcomes take precedence over handlers and are consumed in order.
/// Members with neither fail like a real bus does, with `UnknownMethod`.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    calls: Arc<Mutex<Vec<MethodCall>>>,
    signals: Arc<Mutex<VecDeque<SignalRecord>>>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `member` with `handler`.
    pub fn on<F>(&self, member: &str, handler: F)
    where
        F: Fn(&MethodCall) -> std::result::Result<ReplyValue, RemoteError> + Send + Sync + 'static,
    {
        self.script
            .lock()
            .handlers
            .insert(member.to_owned(), Arc::new(handler));
    }

    /// Answer every call to `member` with a fixed value.
    pub fn reply(&self, member: &str, value: ReplyValue) {
        self.on(member, move |_| Ok(value.clone()));
    }

    /// Answer every call to `member` with a fixed remote error.
    pub fn fail(&self, member: &str, error: RemoteError) {
        self.on(member, move |_| Err(error.clone()));
    }

    /// Queue a one-shot outcome for the next call to `member`.
    pub fn enqueue(&self, member: &str, outcome: std::result::Result<ReplyValue, RemoteError>) {
        self.script
            .lock()
            .queued
            .entry(member.to_owned())
            .or_default()
            .push_back(outcome);
    }

    /// Emit `signal` every time `member` is called successfully.
    pub fn emit_on(&self, member: &str, signal: SignalRecord) {
        self.script
            .lock()
            .emits
            .entry(member.to_owned())
            .or_default()
            .push(signal);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.calls.lock().clone()
    }

    /// Members called so far, in order.
    pub fn members(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.member.clone()).collect()
    }

    fn resolve(&self, call: &MethodCall) -> Option<(Outcome, Vec<SignalRecord>)> {
        let mut script = self.script.lock();
        let emits = script.emits.get(&call.member).cloned().unwrap_or_default();
        if let Some(outcome) = script
            .queued
            .get_mut(&call.member)
            .and_then(VecDeque::pop_front)
        {
            return Some((outcome, emits));
        }
        let handler = script.handlers.get(&call.member).cloned()?;
        drop(script);
        Some((handler(call), emits))
    }
}

impl Transport for ScriptedTransport {
    fn call(&self, call: &MethodCall) -> Result<ReplyValue> {
        self.calls.lock().push(call.clone());
        let (outcome, emits) = match self.resolve(call) {
            Some(resolved) => resolved,
            None => (Err(RemoteError::unknown_method(call)), Vec::new()),
        };
        match outcome {
            Ok(value) => {
                self.signals.lock().extend(emits);
                Ok(value)
            }
            Err(err) => Err(BusError::Remote(err)),
        }
    }

    // Scripted signals all come from the scripted service itself.
    fn subscribe(&self, _sender: &str, path: &str) -> Result<Box<dyn SignalWatch>> {
        Ok(Box::new(ScriptedSignalWatch {
            path: path.to_owned(),
            signals: Arc::clone(&self.signals),
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedSignalWatch {
    path: String,
    signals: Arc<Mutex<VecDeque<SignalRecord>>>,
}

impl SignalWatch for ScriptedSignalWatch {
    fn next_signal(&mut self, _timeout: Duration) -> Result<Option<SignalRecord>> {
        let mut queue = self.signals.lock();
        let position = queue.iter().position(|s| s.path == self.path);
        Ok(position.and_then(|idx| queue.remove(idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Arg;

    fn call(member: &str) -> MethodCall {
        MethodCall::new("com.example.SampleService", "/ServerObject", member)
    }

    #[test]
    fn handlers_answer_and_calls_are_logged() {
        let transport = ScriptedTransport::new();
        transport.on("test_call1", |call| match call.args.as_slice() {
            [Arg::Int32(v)] => Ok(ReplyValue::Int32(*v)),
            _ => Err(RemoteError::invalid_args("expected i")),
        });

        let ok = transport
            .call(&call("test_call1").with_args(vec![Arg::Int32(1)]))
            .expect("scripted reply");
        assert_eq!(ok, ReplyValue::Int32(1));

        let err = transport
            .call(&call("test_call1").with_args(vec![Arg::Double(0.5)]))
            .expect_err("signature mismatch");
        assert_eq!(
            err.remote().map(|r| r.name.as_str()),
            Some("org.freedesktop.DBus.Error.InvalidArgs")
        );
        assert_eq!(transport.members(), vec!["test_call1", "test_call1"]);
    }

    #[test]
    fn unknown_members_fail_like_the_bus() {
        let transport = ScriptedTransport::new();
        let err = transport.call(&call("missing")).expect_err("unknown");
        assert_eq!(
            err.remote().map(|r| r.name.as_str()),
            Some("org.freedesktop.DBus.Error.UnknownMethod")
        );
    }

    #[test]
    fn queued_outcomes_win_over_handlers_and_drain_in_order() {
        let transport = ScriptedTransport::new();
        transport.reply("stop", ReplyValue::Unit);
        transport.enqueue("stop", Ok(ReplyValue::Int32(7)));
        transport.enqueue("stop", Err(RemoteError::new("a.b", "boom")));

        assert_eq!(transport.call(&call("stop")).ok(), Some(ReplyValue::Int32(7)));
        assert!(transport.call(&call("stop")).is_err());
        assert_eq!(transport.call(&call("stop")).ok(), Some(ReplyValue::Unit));
    }

    #[test]
    fn signals_are_delivered_to_matching_watches() {
        let transport = ScriptedTransport::new();
        transport.reply("test_signal", ReplyValue::Unit);
        transport.emit_on(
            "test_signal",
            SignalRecord::new("/ServerObject", Some("com.example.Sample"), "signal1"),
        );

        let mut other = transport.subscribe("com.example.SampleService", "/Elsewhere").expect("subscribe");
        let mut watch = transport.subscribe("com.example.SampleService", "/ServerObject").expect("subscribe");
        transport.call(&call("test_signal")).expect("trigger");

        assert!(other
            .next_signal(Duration::from_millis(1))
            .expect("poll")
            .is_none());
        let signal = watch
            .next_signal(Duration::from_millis(1))
            .expect("poll")
            .expect("signal emitted");
        assert_eq!(signal.member, "signal1");
    }
}
