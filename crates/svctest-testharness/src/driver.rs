//! ---
//! svctest_section: "05-test-driver"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Ordered record/verify run against the sample service."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::time::Duration;

use svctest_config::{DriverConfig, SignalPolicy, DEFAULT_INTROSPECTION_PATHS, DEFAULT_OBJECT_PATH};
use svctest_logging::{svc_info, svc_warn, LogContext};
use svctest_msg::{Arg, CallMetrics, SampleObject, ServiceClient, SignalWatch, INTERFACE1, INTERFACE2};
use tracing::{debug, info};

use crate::checks::CheckLog;
use crate::fixtures::FixtureStore;
use crate::{HarnessError, HarnessResult};

const TEST_EXCEPTION: &str = "org.mycompany.test: This is a test exception";
const NATIVE_EXCEPTION: &str = "org.dbustl.CPPException: Error";
const UNKNOWN_NATIVE_EXCEPTION: &str = "org.dbustl.CPPException: Unknown C++ exception";
const DIVISION_BY_ZERO: &str = "org.mycompany.test: Division by 0";

/// What to do with the introspection documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Overwrite the fixtures and stop.
    Record,
    /// Compare against the fixtures, then run every functional check.
    Verify,
}

/// Objects and signal handling for a run.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub object_path: String,
    pub introspection_paths: Vec<String>,
    pub signal_policy: SignalPolicy,
    pub signal_timeout: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            object_path: DEFAULT_OBJECT_PATH.to_owned(),
            introspection_paths: DEFAULT_INTROSPECTION_PATHS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            signal_policy: SignalPolicy::default(),
            signal_timeout: Duration::from_millis(250),
        }
    }
}

impl DriverSettings {
    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            object_path: config.service.object_path.clone(),
            introspection_paths: config.service.introspection_paths.clone(),
            signal_policy: config.signals.policy,
            signal_timeout: config.signals.timeout,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: RunMode,
    /// Fixtures written or verified.
    pub fixtures: usize,
    /// Expectations that held after the fixture stage.
    pub checks: usize,
    pub signals_observed: usize,
    pub signals_missed: usize,
    pub metrics: CallMetrics,
}

/// Runs the fixed check sequence against one service.
pub struct TestDriver {
    client: ServiceClient,
    fixtures: FixtureStore,
    settings: DriverSettings,
}

impl TestDriver {
    pub fn new(client: ServiceClient, fixtures: FixtureStore, settings: DriverSettings) -> Self {
        Self {
            client,
            fixtures,
            settings,
        }
    }

    /// Execute the run. The first failed expectation is returned as the error.
    pub fn run(&self, mode: RunMode) -> HarnessResult<RunSummary> {
        info!(
            service = self.client.destination(),
            transport = self.client.transport_name(),
            mode = ?mode,
            fixtures = %self.fixtures.directory().display(),
            "starting sample service run"
        );

        let documents = self.introspect_all()?;
        let fixtures = match mode {
            RunMode::Record => {
                self.record_fixtures(&documents)?;
                let summary = self.summary(mode, documents.len(), 0, SignalTally::default());
                info!(fixtures = summary.fixtures, "fixtures recorded");
                return Ok(summary);
            }
            RunMode::Verify => self.verify_fixtures(&documents)?,
        };

        let object = self.client.object(self.settings.object_path.as_str());
        let mut checks = CheckLog::new(object.path());
        self.call_checks(&object, &mut checks)?;
        self.error_path_checks(&object, &mut checks)?;
        self.executor_checks(&object, &mut checks)?;
        self.interface_checks(&object, &mut checks)?;
        let signals = self.signal_checks(&object, &mut checks)?;
        checks.succeeds("stop()", object.stop())?;

        let summary = self.summary(mode, fixtures, checks.passed(), signals);
        info!(
            checks = summary.checks,
            signals_observed = summary.signals_observed,
            signals_missed = summary.signals_missed,
            calls = summary.metrics.calls,
            replies = summary.metrics.replies,
            remote_errors = summary.metrics.remote_errors,
            transport_errors = summary.metrics.transport_errors,
            "sample service run passed"
        );
        Ok(summary)
    }

    fn introspect_all(&self) -> HarnessResult<Vec<(String, String)>> {
        self.settings
            .introspection_paths
            .iter()
            .map(|path| {
                let document = self.client.introspect(path).map_err(|source| {
                    HarnessError::Call {
                        check: format!("Introspect {path}"),
                        source,
                    }
                })?;
                debug!(object_path = %path, bytes = document.len(), "introspected");
                Ok((path.clone(), document))
            })
            .collect()
    }

    fn record_fixtures(&self, documents: &[(String, String)]) -> HarnessResult<()> {
        for (index, (path, document)) in (1..).zip(documents) {
            let fixture = self.fixtures.record(index, document)?;
            let ctx = LogContext::new().with_object_path(path);
            svc_info!(context = ctx, "recorded {}", fixture.display());
        }
        Ok(())
    }

    fn verify_fixtures(&self, documents: &[(String, String)]) -> HarnessResult<usize> {
        let mut log = CheckLog::new("");
        for (index, (path, document)) in (1..).zip(documents) {
            let check = format!("introspection fixture #{index} ({path})");
            match self.fixtures.verify(index, path, document) {
                Ok(()) => log.pass(&check, "matches"),
                Err(err) => {
                    log.fail(&check, &err.to_string());
                    return Err(err);
                }
            }
        }
        Ok(log.passed())
    }

    fn call_checks(&self, object: &SampleObject<'_>, checks: &mut CheckLog) -> HarnessResult<()> {
        checks.succeeds("test_callvoid0()", object.test_callvoid0())?;
        checks.succeeds("test_callvoid1(1)", object.test_callvoid1(1))?;
        checks.succeeds("test_callvoid2(1, 1)", object.test_callvoid2(1, 1))?;
        checks.succeeds("test_callvoid3(1, 1, 1)", object.test_callvoid3(1, 1, 1))?;

        checks.returns("test_call0()", 0, object.test_call0())?;
        checks.returns("test_call1(1)", 1, object.test_call1(1))?;
        checks.returns("test_call2(1, 1)", 2, object.test_call2(1, 1))?;
        checks.returns("test_call3(1, 1, 1)", 3, object.test_call3(1, 1, 1))?;
        Ok(())
    }

    fn error_path_checks(
        &self,
        object: &SampleObject<'_>,
        checks: &mut CheckLog,
    ) -> HarnessResult<()> {
        checks.raises(
            "test_call2(1, 0.5) rejects a double argument",
            object.call_untyped("test_call2", vec![Arg::Int32(1), Arg::Double(0.5)]),
        )?;
        checks.raises(
            "test_call2(1, 1, 1) rejects an extra argument",
            object.call_untyped("test_call2", vec![Arg::Int32(1); 3]),
        )?;

        checks.raises_message("test_ex1()", TEST_EXCEPTION, object.test_ex1())?;
        checks.raises_message("test_ex2()", NATIVE_EXCEPTION, object.test_ex2())?;
        checks.raises_message("test_ex3()", UNKNOWN_NATIVE_EXCEPTION, object.test_ex3())?;
        Ok(())
    }

    fn executor_checks(
        &self,
        object: &SampleObject<'_>,
        checks: &mut CheckLog,
    ) -> HarnessResult<()> {
        checks.returns(
            "test_flexible_executor(1.0, 1.0)",
            1.0,
            object.test_flexible_executor(1.0, 1.0),
        )?;
        checks.raises_message(
            "test_flexible_executor(1.0, 0.0)",
            DIVISION_BY_ZERO,
            object.test_flexible_executor(1.0, 0.0),
        )?;
        Ok(())
    }

    fn interface_checks(
        &self,
        object: &SampleObject<'_>,
        checks: &mut CheckLog,
    ) -> HarnessResult<()> {
        let unqualified = checks.succeeds("test_if()", object.test_if(None))?;
        if let Some(name) = unqualified {
            debug!(interface = %name, "unqualified test_if returned a value");
        }
        for interface in [INTERFACE1, INTERFACE2] {
            let check = format!("{interface}.test_if()");
            let reply = object
                .test_if(Some(interface))
                .map(|name| name.unwrap_or_default());
            checks.returns(&check, interface.to_owned(), reply)?;
        }
        Ok(())
    }

    fn signal_checks(
        &self,
        object: &SampleObject<'_>,
        checks: &mut CheckLog,
    ) -> HarnessResult<SignalTally> {
        let policy = self.settings.signal_policy;
        let mut tally = SignalTally::default();
        let mut watch = match policy {
            SignalPolicy::Off => None,
            SignalPolicy::Warn | SignalPolicy::Require => match object.watch_signals() {
                Ok(watch) => Some(watch),
                Err(source) if policy == SignalPolicy::Require => {
                    return Err(HarnessError::Call {
                        check: "signal subscription".to_owned(),
                        source,
                    })
                }
                Err(err) => {
                    let ctx = LogContext::new().with_object_path(object.path());
                    svc_warn!(context = ctx, "signal subscription failed, delivery not observed: {err}");
                    None
                }
            },
        };

        let path = object.path();
        let mut step = |check: &str, outcome| {
            self.trigger(path, check, outcome, &mut watch, checks, &mut tally)
        };
        step("test_signal()", object.test_signal())?;
        step("test_signal2()", object.test_signal2())?;
        step("test_signal3()", object.test_signal3())?;
        Ok(tally)
    }

    fn trigger(
        &self,
        path: &str,
        check: &str,
        outcome: svctest_msg::Result<()>,
        watch: &mut Option<Box<dyn SignalWatch>>,
        checks: &mut CheckLog,
        tally: &mut SignalTally,
    ) -> HarnessResult<()> {
        checks.succeeds(check, outcome)?;
        let Some(watch) = watch.as_mut() else {
            return Ok(());
        };
        let timeout = self.settings.signal_timeout;
        let require = self.settings.signal_policy == SignalPolicy::Require;
        let ctx = LogContext::new().with_object_path(path).with_check(check);
        match watch.next_signal(timeout) {
            Ok(Some(signal)) => {
                tally.observed += 1;
                checks.pass(check, &format!("signal {} received", signal.member));
                Ok(())
            }
            Ok(None) if require => {
                checks.fail(check, "no signal received");
                Err(HarnessError::SignalMissing {
                    check: check.to_owned(),
                    path: path.to_owned(),
                    timeout,
                })
            }
            Ok(None) => {
                tally.missed += 1;
                svc_warn!(context = ctx, "no signal received within {timeout:?}");
                Ok(())
            }
            Err(source) if require => Err(HarnessError::Call {
                check: check.to_owned(),
                source,
            }),
            Err(err) => {
                tally.missed += 1;
                svc_warn!(context = ctx, "signal watch failed: {err}");
                Ok(())
            }
        }
    }

    fn summary(
        &self,
        mode: RunMode,
        fixtures: usize,
        checks: usize,
        signals: SignalTally,
    ) -> RunSummary {
        RunSummary {
            mode,
            fixtures,
            checks,
            signals_observed: signals.observed,
            signals_missed: signals.missed,
            metrics: self.client.metrics(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SignalTally {
    observed: usize,
    missed: usize,
}
