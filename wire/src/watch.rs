//! Subscribing to broadcast signals.
//!
//! A [`Watch`] composes a bus-side match rule from a [`MatchRule`] predicate,
//! registers it via `AddMatch`, and receives every signal the bus routes
//! back that also satisfies the predicate locally (the local check covers
//! argument-equality filters our `AddMatch` string doesn't bother encoding).
//! Identical rules are refcounted so many watches can share one bus-side
//! subscription; `RemoveMatch` fires when the last one closes.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dbus_core::proto::Endianness;
use dbus_core::signature::SignatureBuf;
use tokio::sync::mpsc;

use crate::codec::Body;
use crate::error::Result;
use crate::message::{Message, MessageKind};
use crate::object_path::{ObjectPath, ObjectPathBuf};
use crate::ty::DBusType;

/// The default capacity of a watch's delivery queue.
pub(crate) const DEFAULT_CAPACITY: usize = 64;

/// A conjunction of filters over an incoming signal's header and, optionally,
/// its first few string arguments.
#[derive(Debug, Clone, Default)]
pub struct MatchRule {
    sender: Option<String>,
    path: Option<ObjectPathBuf>,
    path_is_namespace: bool,
    interface: Option<String>,
    member: Option<String>,
    args: Vec<(u8, String)>,
}

impl MatchRule {
    /// Construct a match rule with no filters: matches every signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the sender's unique name.
    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Require an exact object path.
    #[must_use]
    pub fn path(mut self, path: &ObjectPath) -> Self {
        self.path = Some(path.to_owned());
        self.path_is_namespace = false;
        self
    }

    /// Require `path` to be a prefix of the signal's object path.
    #[must_use]
    pub fn path_namespace(mut self, path: &ObjectPath) -> Self {
        self.path = Some(path.to_owned());
        self.path_is_namespace = true;
        self
    }

    /// Require the interface.
    #[must_use]
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Require the member (signal name).
    #[must_use]
    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    /// Require the string argument at `index` to equal `value`.
    #[must_use]
    pub fn arg(mut self, index: u8, value: impl Into<String>) -> Self {
        self.args.push((index, value.into()));
        self
    }

    /// Compose the `AddMatch`/`RemoveMatch` rule string for this predicate.
    pub(crate) fn to_rule_string(&self) -> String {
        let mut out = String::from("type='signal'");

        if let Some(sender) = &self.sender {
            let _ = write!(out, ",sender='{sender}'");
        }

        if let Some(path) = &self.path {
            if self.path_is_namespace {
                let _ = write!(out, ",path_namespace='{path}'");
            } else {
                let _ = write!(out, ",path='{path}'");
            }
        }

        if let Some(interface) = &self.interface {
            let _ = write!(out, ",interface='{interface}'");
        }

        if let Some(member) = &self.member {
            let _ = write!(out, ",member='{member}'");
        }

        for (index, value) in &self.args {
            let _ = write!(out, ",arg{index}='{value}'");
        }

        out
    }

    fn matches(&self, msg: &Message) -> bool {
        if let Some(sender) = &self.sender {
            if msg.sender() != Some(sender.as_str()) {
                return false;
            }
        }

        if let Some(interface) = &self.interface {
            if msg.interface() != Some(interface.as_str()) {
                return false;
            }
        }

        let MessageKind::Signal { path, member } = msg.kind() else {
            return false;
        };

        if let Some(want_member) = &self.member {
            if member != want_member {
                return false;
            }
        }

        if let Some(want_path) = &self.path {
            let matches = if self.path_is_namespace {
                want_path.is_prefix_of(path)
            } else {
                want_path.as_ref() == path.as_ref()
            };

            if !matches {
                return false;
            }
        }

        if !self.args.is_empty() {
            let mut body = msg.body();

            for &(index, ref want) in &self.args {
                if !arg_matches_at(&mut body, index, want) {
                    return false;
                }
            }
        }

        true
    }
}

fn arg_matches_at(body: &mut Body<'_>, index: u8, want: &str) -> bool {
    let mut body = *body;

    for _ in 0..index {
        if String::decode(&mut body).is_err() {
            return false;
        }
    }

    matches!(String::decode(&mut body), Ok(value) if value == want)
}

/// A single delivered signal, with enough of the original message kept
/// around to decode its body against an application-declared type.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    /// The unique name of the peer that emitted the signal, if known.
    pub sender: Option<String>,
    /// The object path that emitted the signal.
    pub path: ObjectPathBuf,
    /// The interface the signal belongs to, if the emitter declared one.
    pub interface: Option<String>,
    /// The signal's member name.
    pub member: String,
    /// Set when one or more signals were dropped for this watch's queue
    /// before this one; cleared again once observed.
    pub overflow: bool,
    signature: SignatureBuf,
    body: Vec<u8>,
    endianness: Endianness,
}

impl SignalEvent {
    fn from_message(msg: &Message, overflow: bool) -> Option<Self> {
        let MessageKind::Signal { path, member } = msg.kind() else {
            return None;
        };

        Some(Self {
            sender: msg.sender().map(str::to_owned),
            path: path.clone(),
            interface: msg.interface().map(str::to_owned),
            member: member.clone(),
            overflow,
            signature: msg.signature().to_owned(),
            body: msg.body_bytes().to_vec(),
            endianness: msg.endianness(),
        })
    }

    /// A cursor over the signal's body.
    pub fn body(&self) -> Body<'_> {
        Body::new(&self.body, self.endianness)
    }

    /// The body's signature, as declared on the wire.
    pub fn signature(&self) -> &dbus_core::signature::Signature {
        &self.signature
    }

    /// Decode the body as `T`.
    pub fn decode<T: DBusType>(&self) -> Result<T> {
        let mut body = self.body();
        T::decode(&mut body)
    }
}

struct RuleEntry {
    refcount: usize,
}

struct WatchEntry {
    id: u64,
    rule: MatchRule,
    rule_string: String,
    tx: mpsc::Sender<SignalEvent>,
    overflow: Arc<AtomicBool>,
}

/// Shared registry of every active watch on a connection, consulted by the
/// reader task for each incoming signal.
#[derive(Default)]
pub(crate) struct SignalDispatch {
    next_id: u64,
    entries: Vec<WatchEntry>,
    rules: HashMap<String, RuleEntry>,
}

impl SignalDispatch {
    /// Register a new watch, returning its id, the rule string (with a flag
    /// for whether it is newly registered and needs `AddMatch`), and the
    /// receiving half of its delivery queue.
    pub(crate) fn register(
        &mut self,
        rule: MatchRule,
        capacity: usize,
    ) -> (u64, String, bool, mpsc::Receiver<SignalEvent>) {
        let id = self.next_id;
        self.next_id += 1;

        let rule_string = rule.to_rule_string();
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let is_new = match self.rules.get_mut(&rule_string) {
            Some(entry) => {
                entry.refcount += 1;
                false
            }
            None => {
                self.rules.insert(rule_string.clone(), RuleEntry { refcount: 1 });
                true
            }
        };

        self.entries.push(WatchEntry {
            id,
            rule,
            rule_string: rule_string.clone(),
            tx,
            overflow: Arc::new(AtomicBool::new(false)),
        });

        (id, rule_string, is_new, rx)
    }

    /// Drop a watch, returning the rule string to `RemoveMatch` if this was
    /// the last subscriber sharing it.
    pub(crate) fn unregister(&mut self, id: u64) -> Option<String> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(index);

        let Some(rule_entry) = self.rules.get_mut(&entry.rule_string) else {
            return None;
        };

        rule_entry.refcount -= 1;

        if rule_entry.refcount == 0 {
            self.rules.remove(&entry.rule_string);
            Some(entry.rule_string)
        } else {
            None
        }
    }

    /// Route an incoming signal to every matching watch.
    pub(crate) fn route(&self, msg: &Message) {
        for entry in &self.entries {
            if !entry.rule.matches(msg) {
                continue;
            }

            let overflow = entry.overflow.swap(false, Ordering::AcqRel);

            let Some(event) = SignalEvent::from_message(msg, overflow) else {
                continue;
            };

            if entry.tx.try_send(event).is_err() {
                entry.overflow.store(true, Ordering::Release);
            }
        }
    }

    /// Mark every queue as terminated; called once the connection closes.
    pub(crate) fn close_all(&mut self) {
        self.entries.clear();
        self.rules.clear();
    }
}

/// A live subscription to signals matching a [`MatchRule`].
///
/// Dropping a `Watch` unregisters it; if it was the last watch sharing its
/// bus-side match rule, `RemoveMatch` is issued in the background.
pub struct Watch {
    id: u64,
    rx: mpsc::Receiver<SignalEvent>,
    connection: crate::Connection,
}

impl Watch {
    pub(crate) fn new(id: u64, rx: mpsc::Receiver<SignalEvent>, connection: crate::Connection) -> Self {
        Self { id, rx, connection }
    }

    /// Wait for the next delivered signal. Returns `None` once the
    /// connection has closed and no further signals will arrive.
    pub async fn recv(&mut self) -> Option<SignalEvent> {
        self.rx.recv().await
    }

    /// Convert this watch into a plain receiving stream, detaching it from
    /// the unregister-on-drop bookkeeping (the rule stays registered until
    /// the connection closes).
    pub fn into_stream(self) -> SignalStream {
        SignalStream { rx: self.rx }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.connection.unregister_watch(self.id);
    }
}

/// The receiving half of a [`Watch`], detached from its unregister-on-drop
/// behavior.
pub struct SignalStream {
    rx: mpsc::Receiver<SignalEvent>,
}

impl SignalStream {
    /// Wait for the next delivered signal.
    pub async fn recv(&mut self) -> Option<SignalEvent> {
        self.rx.recv().await
    }
}
