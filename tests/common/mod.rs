//! ---
//! svctest_section: "07-testing"
//! svctest_subsection: "integration-tests"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "In-memory emulation of the sample service."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use svctest_config::SignalPolicy;
use svctest_msg::{
    Arg, MethodCall, RemoteError, ReplyValue, ScriptedTransport, ServiceClient, SignalRecord,
    Transport,
};
use svctest_testharness::{DriverSettings, FixtureStore, TestDriver};

pub const SERVICE: &str = "com.example.SampleService";
pub const OBJECT: &str = "/ServerObject";

/// Introspection document the emulated service returns for `path`.
pub fn introspection_xml(path: &str) -> String {
    format!(
        "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\
         \"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n\
         <node name=\"{path}\">\n  <interface name=\"org.freedesktop.DBus.Introspectable\">\n    \
         <method name=\"Introspect\">\n      <arg name=\"data\" direction=\"out\" type=\"s\"/>\n    \
         </method>\n  </interface>\n</node>\n"
    )
}

fn int_args(call: &MethodCall, count: usize) -> Result<Vec<i32>, RemoteError> {
    let values: Vec<i32> = call
        .args
        .iter()
        .filter_map(|arg| match arg {
            Arg::Int32(v) => Some(*v),
            _ => None,
        })
        .collect();
    if values.len() != count || call.args.len() != count {
        return Err(RemoteError::invalid_args(format!(
            "{} expects {count} int32 arguments, got signature {:?}",
            call.member,
            call.signature()
        )));
    }
    Ok(values)
}

/// A scripted transport behaving like the real sample service.
pub fn sample_service() -> ScriptedTransport {
    let service = ScriptedTransport::new();
    service.on("Introspect", |call| Ok(ReplyValue::Str(introspection_xml(&call.path))));

    for (count, member) in ["test_callvoid0", "test_callvoid1", "test_callvoid2", "test_callvoid3"]
        .into_iter()
        .enumerate()
    {
        service.on(member, move |call| int_args(call, count).map(|_| ReplyValue::Unit));
    }
    for (count, member) in ["test_call0", "test_call1", "test_call2", "test_call3"]
        .into_iter()
        .enumerate()
    {
        service.on(member, move |call| {
            int_args(call, count).map(|values| ReplyValue::Int32(values.iter().sum()))
        });
    }

    service.fail(
        "test_ex1",
        RemoteError::new("org.mycompany.test", "This is a test exception"),
    );
    service.fail("test_ex2", RemoteError::new("org.dbustl.CPPException", "Error"));
    service.fail(
        "test_ex3",
        RemoteError::new("org.dbustl.CPPException", "Unknown C++ exception"),
    );
    service.on("test_flexible_executor", |call| match call.args.as_slice() {
        [Arg::Double(_), Arg::Double(b)] if *b == 0.0 => {
            Err(RemoteError::new("org.mycompany.test", "Division by 0"))
        }
        [Arg::Double(a), Arg::Double(b)] => Ok(ReplyValue::Double(a / b)),
        _ => Err(RemoteError::invalid_args("expected (dd)")),
    });
    service.on("test_if", |call| {
        Ok(match &call.interface {
            Some(name) => ReplyValue::Str(name.clone()),
            None => ReplyValue::Unit,
        })
    });
    for member in ["test_signal", "test_signal2", "test_signal3", "stop"] {
        service.reply(member, ReplyValue::Unit);
    }
    service
}

/// Make every signal trigger emit a signal from the tested object.
pub fn emit_signals(service: &ScriptedTransport) {
    for (member, signal) in [
        ("test_signal", "signal1"),
        ("test_signal2", "signal2"),
        ("test_signal3", "signal3"),
    ] {
        service.emit_on(
            member,
            SignalRecord::new(OBJECT, Some("com.example.Interface1"), signal),
        );
    }
}

pub fn driver(
    transport: impl Transport + 'static,
    fixtures: &Path,
    policy: SignalPolicy,
) -> TestDriver {
    let client = ServiceClient::new(Arc::new(transport), SERVICE);
    TestDriver::new(
        client,
        FixtureStore::new(fixtures, "introspection", "xml"),
        DriverSettings {
            signal_policy: policy,
            ..DriverSettings::default()
        },
    )
}
