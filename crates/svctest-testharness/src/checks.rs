//! ---
//! svctest_section: "05-test-driver"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Expectation helpers emitting pass/fail check events."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::fmt::{Debug, Display};

use svctest_logging::{log_check_event, CheckOutcome, LogContext};
use svctest_msg::{BusError, RemoteError};

use crate::{HarnessError, HarnessResult};

/// Evaluates expectations for one object and counts the ones that held.
pub(crate) struct CheckLog {
    object_path: String,
    passed: usize,
}

impl CheckLog {
    pub(crate) fn new(object_path: impl Into<String>) -> Self {
        Self {
            object_path: object_path.into(),
            passed: 0,
        }
    }

    pub(crate) fn passed(&self) -> usize {
        self.passed
    }

    pub(crate) fn pass(&mut self, check: &str, message: &str) {
        self.passed += 1;
        self.emit(check, message, CheckOutcome::Pass);
    }

    pub(crate) fn fail(&self, check: &str, message: &str) {
        self.emit(check, message, CheckOutcome::Fail);
    }

    /// The call must succeed.
    pub(crate) fn succeeds<T>(
        &mut self,
        check: &str,
        outcome: svctest_msg::Result<T>,
    ) -> HarnessResult<T> {
        match outcome {
            Ok(value) => {
                self.pass(check, "call succeeded");
                Ok(value)
            }
            Err(source) => {
                self.fail(check, &source.to_string());
                Err(HarnessError::Call {
                    check: check.to_owned(),
                    source,
                })
            }
        }
    }

    /// The call must succeed with exactly `expected`.
    pub(crate) fn returns<T>(
        &mut self,
        check: &str,
        expected: T,
        outcome: svctest_msg::Result<T>,
    ) -> HarnessResult<()>
    where
        T: PartialEq + Display,
    {
        let actual = match outcome {
            Ok(actual) => actual,
            Err(source) => {
                self.fail(check, &source.to_string());
                return Err(HarnessError::Call {
                    check: check.to_owned(),
                    source,
                });
            }
        };
        if actual == expected {
            self.pass(check, &format!("returned {actual}"));
            Ok(())
        } else {
            self.fail(check, &format!("expected {expected}, got {actual}"));
            Err(HarnessError::UnexpectedValue {
                check: check.to_owned(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// The call must be answered with an error reply from the service.
    pub(crate) fn raises<T: Debug>(
        &mut self,
        check: &str,
        outcome: svctest_msg::Result<T>,
    ) -> HarnessResult<RemoteError> {
        match outcome {
            Err(BusError::Remote(err)) => {
                self.pass(check, &format!("raised {err}"));
                Ok(err)
            }
            Ok(value) => {
                self.fail(check, &format!("succeeded with {value:?}"));
                Err(HarnessError::MissingError {
                    check: check.to_owned(),
                })
            }
            Err(source) => {
                self.fail(check, &source.to_string());
                Err(HarnessError::Call {
                    check: check.to_owned(),
                    source,
                })
            }
        }
    }

    /// The call must raise a remote error rendering exactly as `expected`.
    pub(crate) fn raises_message<T: Debug>(
        &mut self,
        check: &str,
        expected: &str,
        outcome: svctest_msg::Result<T>,
    ) -> HarnessResult<()> {
        let err = match outcome {
            Err(BusError::Remote(err)) => err,
            other => return self.raises(check, other).map(|_| ()),
        };
        let actual = err.to_string();
        if actual == expected {
            self.pass(check, &format!("raised {actual}"));
            Ok(())
        } else {
            self.fail(check, &format!("expected {expected:?}, raised {actual:?}"));
            Err(HarnessError::WrongErrorMessage {
                check: check.to_owned(),
                expected: expected.to_owned(),
                actual,
            })
        }
    }

    fn emit(&self, check: &str, message: &str, outcome: CheckOutcome) {
        let mut ctx = LogContext::new()
            .with_object_path(&self.object_path)
            .with_check(check);
        let (interface, member) = call_target(check);
        if let Some(interface) = interface {
            ctx = ctx.with_interface(interface);
        }
        if let Some(member) = member {
            ctx = ctx.with_member(member);
        }
        log_check_event(Some(&ctx), "check", message, outcome);
    }
}

/// Interface and member of a check named like a call, e.g.
/// `com.example.Interface1.test_if()` or `test_call2(1, 1)`.
fn call_target(check: &str) -> (Option<&str>, Option<&str>) {
    let Some((target, _)) = check.split_once('(') else {
        return (None, None);
    };
    if target.is_empty() || target.contains(char::is_whitespace) {
        return (None, None);
    }
    match target.rsplit_once('.') {
        Some((interface, member)) => (Some(interface), Some(member)),
        None => (None, Some(target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(name: &str, message: &str) -> svctest_msg::Result<()> {
        Err(BusError::Remote(RemoteError::new(name, message)))
    }

    #[test]
    fn call_shaped_checks_name_their_target() {
        assert_eq!(call_target("test_call2(1, 0.5) rejects a double argument"), (None, Some("test_call2")));
        assert_eq!(
            call_target("com.example.Interface2.test_if()"),
            (Some("com.example.Interface2"), Some("test_if"))
        );
        assert_eq!(call_target("stop()"), (None, Some("stop")));
        assert_eq!(call_target("introspection fixture #1 (/)"), (None, None));
        assert_eq!(call_target("signal subscription"), (None, None));
    }

    #[test]
    fn returns_compares_values() {
        let mut log = CheckLog::new("/ServerObject");
        log.returns("test_call2", 2, Ok(2)).unwrap();
        let err = log.returns("test_call3", 3, Ok(4)).unwrap_err();
        assert_eq!(err.to_string(), "test_call3: expected 3, got 4");
        assert_eq!(log.passed(), 1);
    }

    #[test]
    fn raises_requires_a_remote_error() {
        let mut log = CheckLog::new("/ServerObject");
        log.raises("bad signature", remote("org.freedesktop.DBus.Error.InvalidArgs", "x"))
            .unwrap();
        assert!(matches!(
            log.raises("too many args", Ok(())),
            Err(HarnessError::MissingError { .. })
        ));
        let transport = Err::<(), _>(BusError::Transport("connection reset".into()));
        assert!(matches!(
            log.raises("too many args", transport),
            Err(HarnessError::Call { .. })
        ));
    }

    #[test]
    fn raises_message_compares_rendered_error() {
        let mut log = CheckLog::new("/ServerObject");
        log.raises_message(
            "test_ex2",
            "org.dbustl.CPPException: Error",
            remote("org.dbustl.CPPException", "Error"),
        )
        .unwrap();

        let err = log
            .raises_message(
                "test_ex3",
                "org.dbustl.CPPException: Unknown C++ exception",
                remote("org.dbustl.CPPException", "Error"),
            )
            .unwrap_err();
        match err {
            HarnessError::WrongErrorMessage { actual, .. } => {
                assert_eq!(actual, "org.dbustl.CPPException: Error")
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(matches!(
            log.raises_message("test_ex1", "anything", Ok(())),
            Err(HarnessError::MissingError { .. })
        ));
    }
}
