//! ---
//! svctest_section: "02-bus-messaging"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Live D-Bus transport backed by zbus."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};
use zbus::fdo::DBusProxy;
use zbus::names::BusName;
use zbus::zvariant::{OwnedObjectPath, Structure, StructureBuilder};
use zbus::{Connection, MatchRule, Message, MessageStream};

use crate::transport::{SignalWatch, Transport};
use crate::types::{Arg, MethodCall, RemoteError, ReplyValue, SignalRecord};
use crate::{BusError, Result};

/// Signals buffered per subscription before the oldest are dropped.
const SIGNAL_QUEUE_DEPTH: usize = 64;

/// Which bus the transport connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusAddress {
    /// Per-login session bus.
    Session,
    /// System-wide bus.
    System,
    /// Explicit D-Bus address, e.g. `unix:path=/run/user/1000/bus`.
    Address(String),
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusAddress::Session => f.write_str("session"),
            BusAddress::System => f.write_str("system"),
            BusAddress::Address(address) => write!(f, "{address}"),
        }
    }
}

/// Blocking transport over a live D-Bus connection.
///
/// Owns its own tokio runtime; every call is a `block_on`, so callers see a
/// plain synchronous sequence of requests.
pub struct SessionTransport {
    connection: Connection,
    call_timeout: Option<Duration>,
    runtime: Runtime,
}

impl SessionTransport {
    /// Connect to `bus`. No retry is attempted.
    pub fn connect(bus: &BusAddress, call_timeout: Option<Duration>) -> Result<Self> {
        let runtime = Runtime::new()?;
        let connection = runtime
            .block_on(open_connection(bus))
            .map_err(|err| BusError::Connect {
                bus: bus.to_string(),
                reason: err.to_string(),
            })?;
        info!(
            bus = %bus,
            unique_name = ?connection.unique_name().map(ToString::to_string),
            "connected to message bus"
        );
        Ok(Self {
            connection,
            call_timeout,
            runtime,
        })
    }

    async fn dispatch(&self, call: &MethodCall) -> zbus::Result<Message> {
        let destination = Some(call.destination.as_str());
        let interface = call.interface.as_deref();
        if call.args.is_empty() {
            return self
                .connection
                .call_method(destination, call.path.as_str(), interface, call.member.as_str(), &())
                .await;
        }
        let body = call_body(&call.args);
        self.connection
            .call_method(destination, call.path.as_str(), interface, call.member.as_str(), &body)
            .await
    }

    /// Unique name currently owning `sender`.
    async fn owner_of(&self, sender: &str) -> zbus::Result<String> {
        let name = BusName::try_from(sender)?;
        let owner = DBusProxy::new(&self.connection)
            .await?
            .get_name_owner(name)
            .await?;
        Ok(owner.to_string())
    }
}

/// Body of a call with at least one argument. The bus sees the fields, not
/// the enclosing structure.
fn call_body(args: &[Arg]) -> Structure<'_> {
    args.iter()
        .fold(StructureBuilder::new(), |builder, arg| match arg {
            Arg::Int32(v) => builder.add_field(*v),
            Arg::Double(v) => builder.add_field(*v),
            Arg::Str(v) => builder.add_field(v.as_str()),
        })
        .build()
}

/// Await a pending call, bounded by `timeout` when one is configured.
async fn within<T, F>(call: &MethodCall, timeout: Option<Duration>, pending: F) -> Result<T>
where
    F: Future<Output = zbus::Result<T>>,
{
    let outcome = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, pending)
            .await
            .map_err(|_| BusError::Timeout {
                call: call.to_string(),
                timeout,
            })?,
        None => pending.await,
    };
    outcome.map_err(|err| map_call_error(call, err))
}

async fn open_connection(bus: &BusAddress) -> zbus::Result<Connection> {
    match bus {
        BusAddress::Session => Connection::session().await,
        BusAddress::System => Connection::system().await,
        BusAddress::Address(address) => {
            zbus::connection::Builder::address(address.as_str())?
                .build()
                .await
        }
    }
}

impl Transport for SessionTransport {
    fn call(&self, call: &MethodCall) -> Result<ReplyValue> {
        let reply = self
            .runtime
            .block_on(within(call, self.call_timeout, self.dispatch(call)))?;
        decode_reply(call, &reply)
    }

    // Signals carry the sender's unique name, so a well-known name is
    // resolved to its current owner before the rule is added.
    fn subscribe(&self, sender: &str, path: &str) -> Result<Box<dyn SignalWatch>> {
        let (owner, stream) = self
            .runtime
            .block_on(async {
                let owner = self.owner_of(sender).await?;
                let rule = MatchRule::builder()
                    .msg_type(zbus::message::Type::Signal)
                    .sender(owner.as_str())?
                    .path(path)?
                    .build();
                let stream =
                    MessageStream::for_match_rule(rule, &self.connection, Some(SIGNAL_QUEUE_DEPTH))
                        .await?;
                Ok::<_, zbus::Error>((owner, stream))
            })
            .map_err(|err| {
                BusError::Transport(format!("signal subscription on {sender} {path}: {err}"))
            })?;
        debug!(sender, owner = %owner, path, "subscribed to signals");
        Ok(Box::new(SessionSignalWatch {
            handle: self.runtime.handle().clone(),
            stream: Some(stream),
        }))
    }

    fn name(&self) -> &'static str {
        "dbus"
    }
}

struct SessionSignalWatch {
    handle: Handle,
    stream: Option<MessageStream>,
}

impl SignalWatch for SessionSignalWatch {
    fn next_signal(&mut self, timeout: Duration) -> Result<Option<SignalRecord>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let next = self
            .handle
            .block_on(async { tokio::time::timeout(timeout, stream.next()).await });
        match next {
            Err(_) | Ok(None) => Ok(None),
            Ok(Some(Err(err))) => Err(BusError::Transport(err.to_string())),
            Ok(Some(Ok(message))) => {
                let header = message.header();
                Ok(Some(SignalRecord {
                    path: header.path().map(ToString::to_string).unwrap_or_default(),
                    interface: header.interface().map(ToString::to_string),
                    member: header.member().map(ToString::to_string).unwrap_or_default(),
                }))
            }
        }
    }
}

impl Drop for SessionSignalWatch {
    fn drop(&mut self) {
        // Removing the match rule spawns onto the runtime.
        if let Some(stream) = self.stream.take() {
            let _guard = self.handle.enter();
            drop(stream);
        }
    }
}

fn map_call_error(call: &MethodCall, err: zbus::Error) -> BusError {
    match err {
        zbus::Error::MethodError(name, description, _) => BusError::Remote(RemoteError::new(
            name.to_string(),
            description.unwrap_or_default(),
        )),
        zbus::Error::Names(err) => BusError::InvalidCall {
            call: call.to_string(),
            reason: err.to_string(),
        },
        other => BusError::Transport(format!("{call}: {other}")),
    }
}

fn decode_reply(call: &MethodCall, reply: &Message) -> Result<ReplyValue> {
    let signature = reply
        .header()
        .signature()
        .map(ToString::to_string)
        .unwrap_or_default();
    let body = reply.body();
    let decode = |err: zbus::Error| BusError::Decode {
        call: call.to_string(),
        reason: err.to_string(),
    };
    let value = match signature.as_str() {
        "" => ReplyValue::Unit,
        "b" => ReplyValue::Bool(body.deserialize().map_err(decode)?),
        "y" => ReplyValue::Byte(body.deserialize().map_err(decode)?),
        "n" => ReplyValue::Int16(body.deserialize().map_err(decode)?),
        "q" => ReplyValue::UInt16(body.deserialize().map_err(decode)?),
        "i" => ReplyValue::Int32(body.deserialize().map_err(decode)?),
        "u" => ReplyValue::UInt32(body.deserialize().map_err(decode)?),
        "x" => ReplyValue::Int64(body.deserialize().map_err(decode)?),
        "t" => ReplyValue::UInt64(body.deserialize().map_err(decode)?),
        "d" => ReplyValue::Double(body.deserialize().map_err(decode)?),
        "s" => ReplyValue::Str(body.deserialize().map_err(decode)?),
        "o" => {
            let path: OwnedObjectPath = body.deserialize().map_err(decode)?;
            ReplyValue::ObjectPath(path.to_string())
        }
        other => ReplyValue::Other {
            signature: other.to_owned(),
        },
    };
    debug!(call = %call, reply = %value, "decoded reply");
    Ok(value)
}
