//! ---
//! svctest_section: "02-bus-messaging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Typed client for the sample service."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
//! One function per remote operation of the sample service. Arguments and
//! reply kinds are fixed by the Rust signatures; [`SampleObject::call_untyped`]
//! remains for calls that must deliberately violate the remote signature.

use std::sync::Arc;

use crate::logging::{log_call, CallCounters, CallDirection, CallMetrics};
use crate::transport::{SignalWatch, Transport};
use crate::types::{Arg, MethodCall, ReplyValue};
use crate::{BusError, Result};

/// Standard introspection interface.
pub const INTROSPECTABLE: &str = "org.freedesktop.DBus.Introspectable";
/// First of the two interfaces exporting `test_if`.
pub const INTERFACE1: &str = "com.example.Interface1";
/// Second of the two interfaces exporting `test_if`.
pub const INTERFACE2: &str = "com.example.Interface2";

/// Handle on a named service reachable through a transport.
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
    destination: String,
    counters: CallCounters,
}

impl ServiceClient {
    /// Bind a client to `destination` over `transport`.
    pub fn new(transport: Arc<dyn Transport>, destination: impl Into<String>) -> Self {
        Self {
            transport,
            destination: destination.into(),
            counters: CallCounters::default(),
        }
    }

    /// Bus name of the service.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Name of the underlying transport.
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Call counters accumulated so far.
    pub fn metrics(&self) -> CallMetrics {
        self.counters.snapshot()
    }

    /// Fetch the introspection document of the object at `path`.
    pub fn introspect(&self, path: &str) -> Result<String> {
        let call = MethodCall::new(&self.destination, path, "Introspect")
            .with_interface(INTROSPECTABLE);
        let reply = self.invoke(&call)?;
        match reply {
            ReplyValue::Str(xml) => Ok(xml),
            other => Err(unexpected(&call, "string", &other)),
        }
    }

    /// Address the object at `path`.
    pub fn object(&self, path: impl Into<String>) -> SampleObject<'_> {
        SampleObject {
            client: self,
            path: path.into(),
        }
    }

    fn invoke(&self, call: &MethodCall) -> Result<ReplyValue> {
        self.counters.observe_call();
        log_call(CallDirection::Outbound, call);
        let outcome = self.transport.call(call);
        self.counters.observe_outcome(&outcome);
        match &outcome {
            Ok(_) => log_call(CallDirection::Reply, call),
            Err(_) => log_call(CallDirection::Error, call),
        }
        outcome
    }
}

/// Object exported by the sample service.
pub struct SampleObject<'a> {
    client: &'a ServiceClient,
    path: String,
}

impl SampleObject<'_> {
    /// Object path this handle addresses.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Start collecting signals the service emits from this object.
    pub fn watch_signals(&self) -> Result<Box<dyn SignalWatch>> {
        self.client
            .transport
            .subscribe(&self.client.destination, &self.path)
    }

    /// Void call taking 0 int32 arguments.
    pub fn test_callvoid0(&self) -> Result<()> {
        self.call_void("test_callvoid0", Vec::new())
    }

    /// Void call taking 1 int32 argument.
    pub fn test_callvoid1(&self, a: i32) -> Result<()> {
        self.call_void("test_callvoid1", vec![a.into()])
    }

    /// Void call taking 2 int32 arguments.
    pub fn test_callvoid2(&self, a: i32, b: i32) -> Result<()> {
        self.call_void("test_callvoid2", vec![a.into(), b.into()])
    }

    /// Void call taking 3 int32 arguments.
    pub fn test_callvoid3(&self, a: i32, b: i32, c: i32) -> Result<()> {
        self.call_void("test_callvoid3", vec![a.into(), b.into(), c.into()])
    }

    /// Returns the sum of its 0 int32 arguments.
    pub fn test_call0(&self) -> Result<i64> {
        self.call_integer("test_call0", Vec::new())
    }

    /// Returns the sum of its 1 int32 argument.
    pub fn test_call1(&self, a: i32) -> Result<i64> {
        self.call_integer("test_call1", vec![a.into()])
    }

    /// Returns the sum of its 2 int32 arguments.
    pub fn test_call2(&self, a: i32, b: i32) -> Result<i64> {
        self.call_integer("test_call2", vec![a.into(), b.into()])
    }

    /// Returns the sum of its 3 int32 arguments.
    pub fn test_call3(&self, a: i32, b: i32, c: i32) -> Result<i64> {
        self.call_integer("test_call3", vec![a.into(), b.into(), c.into()])
    }

    /// Raises a service-defined exception.
    pub fn test_ex1(&self) -> Result<()> {
        self.call_void("test_ex1", Vec::new())
    }

    /// Raises a native exception with a known message.
    pub fn test_ex2(&self) -> Result<()> {
        self.call_void("test_ex2", Vec::new())
    }

    /// Raises a native exception of unknown type.
    pub fn test_ex3(&self) -> Result<()> {
        self.call_void("test_ex3", Vec::new())
    }

    /// Divides `a` by `b` through the service's pluggable executor.
    pub fn test_flexible_executor(&self, a: f64, b: f64) -> Result<f64> {
        let call = self.call("test_flexible_executor", vec![a.into(), b.into()]);
        let reply = self.client.invoke(&call)?;
        reply
            .as_f64()
            .ok_or_else(|| unexpected(&call, "number", &reply))
    }

    /// Calls `test_if`, optionally qualified with an interface.
    ///
    /// Unqualified calls reply with nothing; qualified calls reply with the
    /// interface name.
    pub fn test_if(&self, interface: Option<&str>) -> Result<Option<String>> {
        let mut call = self.call("test_if", Vec::new());
        call.interface = interface.map(str::to_owned);
        match self.client.invoke(&call)? {
            ReplyValue::Unit => Ok(None),
            ReplyValue::Str(name) => Ok(Some(name)),
            other => Err(unexpected(&call, "string or nothing", &other)),
        }
    }

    /// Triggers a signal from this object.
    pub fn test_signal(&self) -> Result<()> {
        self.call_void("test_signal", Vec::new())
    }

    /// Triggers a second signal.
    pub fn test_signal2(&self) -> Result<()> {
        self.call_void("test_signal2", Vec::new())
    }

    /// Triggers a third signal.
    pub fn test_signal3(&self) -> Result<()> {
        self.call_void("test_signal3", Vec::new())
    }

    /// Ask the service to shut down.
    pub fn stop(&self) -> Result<()> {
        self.call_void("stop", Vec::new())
    }

    /// Send an unqualified call with arbitrary arguments.
    pub fn call_untyped(&self, member: &str, args: Vec<Arg>) -> Result<ReplyValue> {
        self.client.invoke(&self.call(member, args))
    }

    fn call(&self, member: &str, args: Vec<Arg>) -> MethodCall {
        MethodCall::new(&self.client.destination, &self.path, member).with_args(args)
    }

    fn call_void(&self, member: &str, args: Vec<Arg>) -> Result<()> {
        self.client.invoke(&self.call(member, args)).map(|_| ())
    }

    fn call_integer(&self, member: &str, args: Vec<Arg>) -> Result<i64> {
        let call = self.call(member, args);
        let reply = self.client.invoke(&call)?;
        reply
            .as_i64()
            .ok_or_else(|| unexpected(&call, "integer", &reply))
    }
}

fn unexpected(call: &MethodCall, expected: &'static str, actual: &ReplyValue) -> BusError {
    BusError::UnexpectedReply {
        call: call.to_string(),
        expected,
        actual: actual.to_string(),
    }
}
