use std::num::NonZeroU32;

use crate::object_path::ObjectPathBuf;

/// The kind of a D-Bus message, and the header fields unique to it.
///
/// Every message also carries serial, flags, interface, destination and
/// sender on [`Message`][super::Message] itself, since those apply
/// uniformly across all four kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageKind {
    /// A method call. May prompt a [`MessageKind::MethodReturn`] or
    /// [`MessageKind::Error`] reply carrying the same reply serial.
    MethodCall {
        /// The object path being called.
        path: ObjectPathBuf,
        /// The method being called.
        member: String,
    },
    /// A successful method reply.
    MethodReturn {
        /// The serial of the call this replies to.
        reply_serial: NonZeroU32,
    },
    /// An error reply. If the body's first argument is a string, it is a
    /// human-readable error message.
    Error {
        /// The D-Bus error name, e.g. `org.freedesktop.DBus.Error.Failed`.
        error_name: String,
        /// The serial of the call this replies to.
        reply_serial: NonZeroU32,
    },
    /// A signal emission.
    Signal {
        /// The object path that emitted the signal.
        path: ObjectPathBuf,
        /// The member being signalled.
        member: String,
    },
}

impl MessageKind {
    /// The reply serial, for kinds that carry one.
    pub fn reply_serial(&self) -> Option<NonZeroU32> {
        match self {
            MessageKind::MethodReturn { reply_serial } => Some(*reply_serial),
            MessageKind::Error { reply_serial, .. } => Some(*reply_serial),
            _ => None,
        }
    }

    /// The member, for kinds that carry one.
    pub fn member(&self) -> Option<&str> {
        match self {
            MessageKind::MethodCall { member, .. } => Some(member),
            MessageKind::Signal { member } => Some(member),
            _ => None,
        }
    }

    /// The object path, for kinds that carry one.
    pub fn path(&self) -> Option<&ObjectPathBuf> {
        match self {
            MessageKind::MethodCall { path, .. } => Some(path),
            MessageKind::Signal { path, .. } => Some(path),
            _ => None,
        }
    }
}
