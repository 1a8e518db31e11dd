//! A minimal object server for exposing methods of your own.
//!
//! [`ObjectServer`] stores handlers keyed by the `(path, interface, member)`
//! triple the bus routes an incoming method call by (spec.md §4.8 calls this
//! "(interface, member)" alone, but a real server usually hosts more than
//! one object, so the path is folded into the key here). The standard
//! `org.freedesktop.DBus.Peer` interface is served without registration, and
//! `org.freedesktop.DBus.Introspectable.Introspect` is synthesized from
//! whatever has been registered under a path.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use crate::codec::{Body, BodyBuf};
use crate::error::{Error, ErrorKind, Result};
use crate::message::Message;
use crate::object_path::{ObjectPath, ObjectPathBuf};
use crate::org_freedesktop_dbus::{introspectable, peer};

/// The identity of the caller and the method being invoked, handed to a
/// [`Handler`].
#[derive(Debug, Clone)]
pub struct CallContext {
    /// The unique name of the caller, if the bus supplied one.
    pub sender: Option<String>,
    /// The object path the call was addressed to.
    pub path: ObjectPathBuf,
    /// The interface the member belongs to, if the caller specified one.
    pub interface: Option<String>,
    /// The method being called.
    pub member: String,
}

/// What a [`Handler`] returns: the reply body to encode, or an error that
/// becomes a D-Bus `ERROR` reply.
pub type HandlerResult = Result<BodyBuf>;

/// A server-side method implementation.
///
/// Implemented for any `Fn(&CallContext, Body<'_>) -> HandlerResult` closure,
/// so most handlers are registered as plain closures; implement the trait
/// directly for a handler that needs to carry its own state behind an `Arc`.
pub trait Handler: Send + Sync + 'static {
    /// Handle one incoming call, decoding its arguments from `body`.
    fn call(&self, ctx: &CallContext, body: Body<'_>) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&CallContext, Body<'_>) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, ctx: &CallContext, body: Body<'_>) -> HandlerResult {
        self(ctx, body)
    }
}

/// The registry of server-side method handlers for a [`Connection`].
///
/// [`Connection`]: crate::Connection
#[derive(Default)]
pub struct ObjectServer {
    handlers: Mutex<HashMap<(ObjectPathBuf, String, String), Arc<dyn Handler>>>,
}

impl ObjectServer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `handler` to serve `interface.member` at `path`.
    ///
    /// Replaces any handler previously registered for the same triple.
    pub fn register_handler<H>(
        &self,
        path: &ObjectPath,
        interface: impl Into<String>,
        member: impl Into<String>,
        handler: H,
    ) where
        H: Handler,
    {
        self.handlers.lock().unwrap().insert(
            (path.to_owned(), interface.into(), member.into()),
            Arc::new(handler),
        );
    }

    /// Remove a previously registered handler, if any.
    pub fn unregister_handler(&self, path: &ObjectPath, interface: &str, member: &str) {
        self.handlers
            .lock()
            .unwrap()
            .remove(&(path.to_owned(), interface.to_string(), member.to_string()));
    }

    /// Look up the handler for an incoming call's `(path, interface, member)`.
    ///
    /// When the call didn't specify an interface, the unique registered
    /// handler for `(path, member)` is used if there is exactly one; an
    /// ambiguous or missing match falls through to `UnknownMethod`.
    pub(crate) fn lookup(
        &self,
        path: &ObjectPath,
        interface: Option<&str>,
        member: &str,
    ) -> Option<Arc<dyn Handler>> {
        let handlers = self.handlers.lock().unwrap();

        if let Some(interface) = interface {
            return handlers
                .get(&(path.to_owned(), interface.to_string(), member.to_string()))
                .cloned();
        }

        let mut found = None;

        for ((p, _, m), handler) in handlers.iter() {
            if p.as_ref() == path && m == member {
                if found.is_some() {
                    return None;
                }

                found = Some(handler.clone());
            }
        }

        found
    }

    /// Test if anything is registered at `path`, so introspection knows
    /// whether to describe it as a node with no interfaces of its own.
    pub(crate) fn has_path(&self, path: &ObjectPath) -> bool {
        self.handlers
            .lock()
            .unwrap()
            .keys()
            .any(|(p, _, _)| p.as_ref() == path)
    }

    /// Synthesize the introspection XML for `path` from registered handlers,
    /// plus the default `Peer` and `Introspectable` interfaces every object
    /// answers for.
    pub(crate) fn introspect_xml(&self, path: &ObjectPath) -> String {
        let handlers = self.handlers.lock().unwrap();

        let mut interfaces: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        let mut children = BTreeSet::new();

        for (p, interface, member) in handlers.keys() {
            if p.as_ref() == path {
                interfaces.entry(interface).or_default().insert(member);
            } else if path.is_prefix_of(p.as_ref()) {
                if let Some(child) = direct_child(path, p.as_ref()) {
                    children.insert(child);
                }
            }
        }

        let mut out = String::new();
        out.push_str(concat!(
            "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n",
            "\"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n",
        ));
        let _ = writeln!(out, "<node name=\"{path}\">");

        let _ = writeln!(out, "  <interface name=\"{}\">", peer::INTERFACE);
        let _ = writeln!(out, "    <method name=\"{}\"/>", peer::PING);
        let _ = writeln!(out, "    <method name=\"{}\">", peer::GET_MACHINE_ID);
        let _ = writeln!(out, "      <arg type=\"s\" direction=\"out\"/>");
        out.push_str("    </method>\n");
        out.push_str("  </interface>\n");

        let _ = writeln!(out, "  <interface name=\"{}\">", introspectable::INTERFACE);
        let _ = writeln!(out, "    <method name=\"{}\">", introspectable::INTROSPECT);
        out.push_str("      <arg type=\"s\" direction=\"out\"/>\n");
        out.push_str("    </method>\n");
        out.push_str("  </interface>\n");

        let mut names: Vec<_> = interfaces.keys().copied().collect();
        names.sort_unstable();

        for name in names {
            let _ = writeln!(out, "  <interface name=\"{name}\">");

            for member in &interfaces[name] {
                let _ = writeln!(out, "    <method name=\"{member}\"/>");
            }

            out.push_str("  </interface>\n");
        }

        for child in children {
            let _ = writeln!(out, "  <node name=\"{child}\"/>");
        }

        out.push_str("</node>\n");
        out
    }
}

fn direct_child<'a>(prefix: &ObjectPath, full: &'a ObjectPath) -> Option<&'a str> {
    let prefix_str = prefix.as_str();
    let rest = full.as_str().strip_prefix(prefix_str)?;
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    rest.split('/').next().filter(|s| !s.is_empty())
}

/// Serve the default `Peer` interface (`Ping`, `GetMachineId`) for any
/// incoming call, independent of path or object-server registration.
pub(crate) fn dispatch_peer(msg: &Message) -> Option<Result<BodyBuf>> {
    let interface = msg.interface()?;

    if interface != peer::INTERFACE {
        return None;
    }

    let member = msg.kind().member()?;

    Some(match member {
        peer::PING => Ok(BodyBuf::new()),
        peer::GET_MACHINE_ID => {
            let mut body = BodyBuf::new();
            body.store_str(&machine_id());
            Ok(body)
        }
        _ => Err(Error::new(ErrorKind::UnexpectedMessageKind)),
    })
}

/// Serve `Introspectable.Introspect` against `server`.
pub(crate) fn dispatch_introspectable(msg: &Message, server: &ObjectServer) -> Option<Result<BodyBuf>> {
    let interface = msg.interface()?;

    if interface != introspectable::INTERFACE {
        return None;
    }

    if msg.kind().member()? != introspectable::INTROSPECT {
        return None;
    }

    let path = msg.kind().path()?;
    let xml = server.introspect_xml(path.as_ref());
    let mut body = BodyBuf::new();
    body.store_str(&xml);
    Some(Ok(body))
}

fn machine_id() -> String {
    std::fs::read_to_string("/var/lib/dbus/machine-id")
        .or_else(|_| std::fs::read_to_string("/etc/machine-id"))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
