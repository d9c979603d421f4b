//! ---
//! svctest_section: "02-bus-messaging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Method call, reply and remote error model."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Positional argument of a method call, tagged with its wire type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Arg {
    /// Signed 32-bit integer (`i`).
    Int32(i32),
    /// IEEE 754 double (`d`).
    Double(f64),
    /// UTF-8 string (`s`).
    Str(String),
}

impl Arg {
    /// Single-character wire signature of the argument.
    pub fn signature(&self) -> &'static str {
        match self {
            Arg::Int32(_) => "i",
            Arg::Double(_) => "d",
            Arg::Str(_) => "s",
        }
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int32(value)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Double(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_owned())
    }
}

/// Fully addressed method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Bus name of the service receiving the call.
    pub destination: String,
    /// Object path the call is addressed to.
    pub path: String,
    /// Interface qualifier. `None` lets the service pick by member name.
    #[serde(default)]
    pub interface: Option<String>,
    /// Method name.
    pub member: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl MethodCall {
    /// Construct an unqualified call without arguments.
    pub fn new(
        destination: impl Into<String>,
        path: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            path: path.into(),
            interface: None,
            member: member.into(),
            args: Vec::new(),
        }
    }

    /// Qualify the call with an interface name.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Attach positional arguments.
    pub fn with_args(mut self, args: Vec<Arg>) -> Self {
        self.args = args;
        self
    }

    /// Concatenated wire signature of all arguments.
    pub fn signature(&self) -> String {
        self.args.iter().map(Arg::signature).collect()
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.path)?;
        if let Some(interface) = &self.interface {
            write!(f, "{interface}.")?;
        }
        write!(f, "{}({})", self.member, self.signature())
    }
}

/// Decoded body of a successful method reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ReplyValue {
    /// Empty reply body.
    Unit,
    /// `b`
    Bool(bool),
    /// `y`
    Byte(u8),
    /// `n`
    Int16(i16),
    /// `q`
    UInt16(u16),
    /// `i`
    Int32(i32),
    /// `u`
    UInt32(u32),
    /// `x`
    Int64(i64),
    /// `t`
    UInt64(u64),
    /// `d`
    Double(f64),
    /// `s`
    Str(String),
    /// `o`
    ObjectPath(String),
    /// Any other body, kept only as its signature.
    Other {
        /// Wire signature of the body.
        signature: String,
    },
}

impl ReplyValue {
    /// Integer view of the reply, accepting any integer width.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ReplyValue::Byte(v) => Some(i64::from(v)),
            ReplyValue::Int16(v) => Some(i64::from(v)),
            ReplyValue::UInt16(v) => Some(i64::from(v)),
            ReplyValue::Int32(v) => Some(i64::from(v)),
            ReplyValue::UInt32(v) => Some(i64::from(v)),
            ReplyValue::Int64(v) => Some(v),
            ReplyValue::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Floating point view of the reply; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ReplyValue::Double(v) => Some(v),
            ReplyValue::Int32(v) => Some(f64::from(v)),
            ReplyValue::UInt32(v) => Some(f64::from(v)),
            ReplyValue::Int16(v) => Some(f64::from(v)),
            ReplyValue::UInt16(v) => Some(f64::from(v)),
            ReplyValue::Byte(v) => Some(f64::from(v)),
            _ => None,
        }
    }
}

impl fmt::Display for ReplyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyValue::Unit => f.write_str("()"),
            ReplyValue::Bool(v) => write!(f, "{v}"),
            ReplyValue::Byte(v) => write!(f, "{v}"),
            ReplyValue::Int16(v) => write!(f, "{v}"),
            ReplyValue::UInt16(v) => write!(f, "{v}"),
            ReplyValue::Int32(v) => write!(f, "{v}"),
            ReplyValue::UInt32(v) => write!(f, "{v}"),
            ReplyValue::Int64(v) => write!(f, "{v}"),
            ReplyValue::UInt64(v) => write!(f, "{v}"),
            ReplyValue::Double(v) => write!(f, "{v:?}"),
            ReplyValue::Str(v) => write!(f, "{v:?}"),
            ReplyValue::ObjectPath(v) => write!(f, "object path {v}"),
            ReplyValue::Other { signature } => write!(f, "<body of signature {signature}>"),
        }
    }
}

/// Error reply produced by the remote service.
///
/// Rendered as `"<name>: <message>"`, the form the exception checks compare
/// against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Namespaced error name, e.g. `org.mycompany.test`.
    pub name: String,
    /// Human-readable description, possibly empty.
    #[serde(default)]
    pub message: String,
}

impl RemoteError {
    /// Construct a remote error.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Error the bus returns for a member the object does not export.
    pub fn unknown_method(call: &MethodCall) -> Self {
        Self::new(
            "org.freedesktop.DBus.Error.UnknownMethod",
            format!(
                "Method \"{}\" with signature \"{}\" on interface \"{}\" doesn't exist",
                call.member,
                call.signature(),
                call.interface.as_deref().unwrap_or("(null)")
            ),
        )
    }

    /// Error a service returns when the arguments do not match the declared signature.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new("org.freedesktop.DBus.Error.InvalidArgs", message)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Signal observed on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Object path that emitted the signal.
    pub path: String,
    /// Interface the signal belongs to, if present in the header.
    #[serde(default)]
    pub interface: Option<String>,
    /// Signal name.
    pub member: String,
}

impl SignalRecord {
    /// Construct a signal record.
    pub fn new(path: impl Into<String>, interface: Option<&str>, member: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interface: interface.map(str::to_owned),
            member: member.into(),
        }
    }
}
