//! ---
//! svctest_section: "07-testing"
//! svctest_subsection: "integration-tests"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Record/verify runs against the emulated sample service."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
mod common;

use std::fs;

use common::{driver, emit_signals, introspection_xml, sample_service, OBJECT};
use svctest_config::SignalPolicy;
use svctest_msg::{RemoteError, ReplyValue};
use svctest_testharness::{HarnessError, RunMode};
use tempfile::tempdir;

const PATHS: [&str; 7] = [
    "/",
    "/ServerObject",
    "/ServerObject/Child",
    "/Not",
    "/Not/A",
    "/Not/A/Child",
    "/Not/A/Child/Class",
];

#[test]
fn record_then_verify_round_trip() {
    let dir = tempdir().unwrap();
    let service = sample_service();

    let recorded = driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();
    assert_eq!(recorded.fixtures, 7);
    for (index, path) in (1..).zip(PATHS) {
        let written = fs::read_to_string(dir.path().join(format!("introspection{index}.xml"))).unwrap();
        assert_eq!(written, introspection_xml(path));
    }

    let verified = driver(service, dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap();
    assert_eq!(verified.mode, RunMode::Verify);
    assert_eq!(verified.fixtures, 7);
    assert_eq!(verified.metrics.transport_errors, 0);
}

#[test]
fn record_mode_stops_after_introspection() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();

    let calls = service.calls();
    assert_eq!(calls.len(), 7);
    let paths: Vec<_> = calls.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, PATHS);
    assert!(calls.iter().all(|c| c.member == "Introspect"));
}

#[test]
fn verify_runs_every_call_in_order() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Off)
        .run(RunMode::Record)
        .unwrap();
    let before = service.calls().len();

    let summary = driver(service.clone(), dir.path(), SignalPolicy::Off)
        .run(RunMode::Verify)
        .unwrap();

    let members = service.members().split_off(before + 7);
    assert_eq!(
        members,
        vec![
            "test_callvoid0",
            "test_callvoid1",
            "test_callvoid2",
            "test_callvoid3",
            "test_call0",
            "test_call1",
            "test_call2",
            "test_call3",
            "test_call2",
            "test_call2",
            "test_ex1",
            "test_ex2",
            "test_ex3",
            "test_flexible_executor",
            "test_flexible_executor",
            "test_if",
            "test_if",
            "test_if",
            "test_signal",
            "test_signal2",
            "test_signal3",
            "stop",
        ]
    );
    assert!(service.calls()[before + 7..]
        .iter()
        .all(|call| call.path == OBJECT));
    assert_eq!(summary.metrics.remote_errors, 6);
    assert_eq!(summary.signals_observed, 0);
    assert_eq!(summary.signals_missed, 0);
}

#[test]
fn tampered_fixture_fails_before_functional_calls() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();
    let fixture = dir.path().join("introspection3.xml");
    let tampered = fs::read_to_string(&fixture)
        .unwrap()
        .replace("Introspectable", "Properties");
    fs::write(&fixture, tampered).unwrap();
    let before = service.calls().len();

    let err = driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap_err();
    match err {
        HarnessError::FixtureMismatch { index, path, line, .. } => {
            assert_eq!(index, 3);
            assert_eq!(path, "/ServerObject/Child");
            assert_eq!(line, 4);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(service.members()[before..].iter().all(|m| m == "Introspect"));
}

#[test]
fn missing_fixture_fails_verification() {
    let dir = tempdir().unwrap();
    let err = driver(sample_service(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap_err();
    assert!(matches!(err, HarnessError::FixtureRead { .. }));
    assert!(err.to_string().contains("introspection1.xml"));
}

#[test]
fn wrong_sum_is_reported() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();
    service.reply("test_call2", ReplyValue::Int32(5));

    let err = driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap_err();
    assert_eq!(err.to_string(), "test_call2(1, 1): expected 2, got 5");
    assert!(!service.members().contains(&"stop".to_owned()));
}

#[test]
fn accepted_malformed_call_is_reported() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();
    service.on("test_call2", |call| Ok(ReplyValue::Int32(call.args.len() as i32)));

    let err = driver(service, dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap_err();
    match err {
        HarnessError::MissingError { check } => assert!(check.contains("0.5")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn wrong_exception_message_is_reported() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();
    service.fail(
        "test_ex3",
        RemoteError::new("org.dbustl.CPPException", "std::bad_alloc"),
    );

    let err = driver(service, dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap_err();
    match err {
        HarnessError::WrongErrorMessage {
            check,
            expected,
            actual,
        } => {
            assert_eq!(check, "test_ex3()");
            assert_eq!(expected, "org.dbustl.CPPException: Unknown C++ exception");
            assert_eq!(actual, "org.dbustl.CPPException: std::bad_alloc");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn division_by_zero_must_raise() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();
    service.reply("test_flexible_executor", ReplyValue::Double(1.0));

    let err = driver(service, dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap_err();
    assert!(matches!(err, HarnessError::MissingError { ref check } if check == "test_flexible_executor(1.0, 0.0)"));
}

#[test]
fn interface_qualified_call_must_echo_interface() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();
    service.on("test_if", |_| Ok(ReplyValue::Str("com.example.Interface1".into())));

    let err = driver(service, dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "com.example.Interface2.test_if(): expected com.example.Interface2, got com.example.Interface1"
    );
}

#[test]
fn required_signals_must_arrive() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Require)
        .run(RunMode::Record)
        .unwrap();

    let err = driver(service.clone(), dir.path(), SignalPolicy::Require)
        .run(RunMode::Verify)
        .unwrap_err();
    match err {
        HarnessError::SignalMissing { check, path, .. } => {
            assert_eq!(check, "test_signal()");
            assert_eq!(path, OBJECT);
        }
        other => panic!("unexpected error {other:?}"),
    }

    emit_signals(&service);
    let summary = driver(service, dir.path(), SignalPolicy::Require)
        .run(RunMode::Verify)
        .unwrap();
    assert_eq!(summary.signals_observed, 3);
    assert_eq!(summary.signals_missed, 0);
}

#[test]
fn missing_signals_only_warn_by_default() {
    let dir = tempdir().unwrap();
    let service = sample_service();
    driver(service.clone(), dir.path(), SignalPolicy::Warn)
        .run(RunMode::Record)
        .unwrap();

    let summary = driver(service, dir.path(), SignalPolicy::Warn)
        .run(RunMode::Verify)
        .unwrap();
    assert_eq!(summary.signals_observed, 0);
    assert_eq!(summary.signals_missed, 3);
}
