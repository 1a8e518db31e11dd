//! An asynchronous D-Bus client and peer implementation for the Tokio
//! ecosystem.
//!
//! This crate implements the D-Bus wire protocol - message encoding and
//! decoding, the SASL handshake, and a connection multiplexer that lets many
//! concurrent callers share one socket - plus the client-facing machinery
//! built on top of it: name claims, signal watches, and a minimal object
//! server for exposing methods of your own.
//!
//! To see how it's used, see:
//! * [demos/client.rs](https://github.com/example/dbus-wire/blob/main/demos/client.rs)
//! * [demos/server.rs](https://github.com/example/dbus-wire/blob/main/demos/server.rs)

#![deny(missing_docs)]
#![allow(clippy::module_inception)]

#[doc(inline)]
pub use dbus_core::proto::{Endianness, Flags, MessageType, Type, Variant};

pub mod org_freedesktop_dbus;

#[doc(inline)]
pub use self::error::{Error, Result};
mod error;

#[doc(inline)]
pub use self::codec::{Body, BodyBuf};
pub mod codec;

#[doc(inline)]
pub use self::value::{Basic, Value};
mod value;

mod sasl;

#[doc(inline)]
pub use dbus_core::signature::{Signature, SignatureBuf, SignatureBuilder, SignatureError};

#[doc(inline)]
pub use self::message::{Message, MessageKind, Serial};
mod message;

#[cfg(feature = "tokio")]
#[doc(inline)]
pub use self::connection::{CallError, Connection, ConnectionBuilder};
#[cfg(feature = "tokio")]
mod connection;

#[cfg(feature = "tokio")]
#[doc(inline)]
pub use self::claim::{Claim, ClaimOptions, ClaimState};
#[cfg(feature = "tokio")]
mod claim;

#[cfg(feature = "tokio")]
#[doc(inline)]
pub use self::watch::{MatchRule, SignalEvent, SignalStream, Watch};
#[cfg(feature = "tokio")]
mod watch;

#[cfg(feature = "tokio")]
#[doc(inline)]
pub use self::object_server::{CallContext, Handler, HandlerResult, ObjectServer};
#[cfg(feature = "tokio")]
mod object_server;

mod utils;

#[doc(inline)]
pub use self::object_path::{ObjectPath, ObjectPathBuf, ObjectPathError};
pub mod object_path;

pub mod ty;

#[doc(inline)]
pub use self::registry::signature_of;
mod registry;

/// Derive [`ty::DBusType`] for a struct or fieldless enum.
///
/// Structs derive as a `STRUCT`, fields encoded in declaration order, the
/// same shape the tuple impls in [`ty`] already use. Enums must have only
/// fieldless variants and derive as a `UINT32` code.
#[cfg(feature = "derive")]
#[doc(inline)]
pub use dbus_macros::DBusType;
