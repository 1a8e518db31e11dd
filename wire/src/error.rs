use std::io;

use std::str::Utf8Error;

use dbus_core::signature::SignatureError;

use crate::object_path::ObjectPathError;
use crate::sasl::SaslStage;

/// Result alias using an [`Error`] as the error type by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error raised by this crate.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Self { kind }
    }

    /// Construct an error representing a bus-returned `ERROR` reply.
    pub fn call(name: impl Into<String>, message: impl Into<String>) -> Error {
        Self::new(ErrorKind::Call {
            name: name.into(),
            message: message.into(),
        })
    }

    /// Construct an error indicating a decoded value didn't match what its
    /// `DBusType` impl expects, such as an enum discriminant with no
    /// matching variant. Used by generated `#[derive(DBusType)]` impls.
    pub fn signature_mismatch() -> Error {
        Self::new(ErrorKind::SignatureMismatch)
    }

    /// The D-Bus error name, if this is a [`ErrorKind::Call`].
    pub fn call_name(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Call { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Test if the error indicates that the operation would block.
    #[inline]
    pub(crate) fn would_block(&self) -> bool {
        matches!(self.kind, ErrorKind::WouldBlock)
    }

    /// Test if the error indicates that the connection has been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::Closed)
    }
}

impl From<SignatureError> for Error {
    #[inline]
    fn from(error: SignatureError) -> Self {
        Self::new(ErrorKind::Signature(error))
    }
}

impl From<ObjectPathError> for Error {
    #[inline]
    fn from(error: ObjectPathError) -> Self {
        Self::new(ErrorKind::ObjectPath(error))
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock => Self::new(ErrorKind::WouldBlock),
            io::ErrorKind::UnexpectedEof => Self::new(ErrorKind::Eof),
            _ => Self::new(ErrorKind::Io(error)),
        }
    }
}

impl From<Utf8Error> for Error {
    #[inline]
    fn from(error: Utf8Error) -> Self {
        Self::new(ErrorKind::Utf8Error(error))
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl std::fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::Io(..) => write!(f, "I/O error"),
            ErrorKind::Eof => write!(f, "unexpected end of stream"),
            ErrorKind::Signature(..) => write!(f, "signature error"),
            ErrorKind::ObjectPath(..) => write!(f, "object path error"),
            ErrorKind::Utf8Error(..) => write!(f, "UTF-8 error"),
            ErrorKind::WouldBlock => write!(f, "would block"),
            ErrorKind::BufferUnderflow => write!(f, "buffer underflow"),
            ErrorKind::MissingBus => write!(f, "missing bus to connect to"),
            ErrorKind::InvalidAddress => write!(f, "invalid D-Bus address"),
            ErrorKind::InvalidSaslState(stage) => write!(f, "invalid SASL state {stage:?}"),
            ErrorKind::InvalidSasl => write!(f, "invalid SASL message"),
            ErrorKind::InvalidSaslResponse => write!(f, "invalid SASL response"),
            ErrorKind::HandshakeFailed => write!(f, "D-Bus handshake failed"),
            ErrorKind::InvalidProtocol => write!(f, "invalid protocol"),
            ErrorKind::MissingPath => write!(f, "missing required PATH header"),
            ErrorKind::MissingInterface => write!(f, "missing required INTERFACE header"),
            ErrorKind::MissingMember => write!(f, "missing required MEMBER header"),
            ErrorKind::MissingReplySerial => write!(f, "missing required REPLY_SERIAL header"),
            ErrorKind::ZeroSerial => write!(f, "zero in header serial"),
            ErrorKind::MissingErrorName => write!(f, "missing required ERROR_NAME header"),
            ErrorKind::UnexpectedMessageKind => write!(f, "unexpected message kind"),
            ErrorKind::NotNullTerminated => write!(f, "string is not null terminated"),
            ErrorKind::ArrayTooLong(length) => {
                write!(f, "array of length {length} is too long (max is 67108864)")
            }
            ErrorKind::BodyTooLong(length) => write!(
                f,
                "body of length {length} is too long (max is 134217728)"
            ),
            ErrorKind::SignatureMismatch => write!(f, "value does not match expected signature"),
            ErrorKind::UnrepresentableType(why) => write!(f, "unrepresentable type: {why}"),
            ErrorKind::DictKeyNotBasic => write!(f, "dict keys must be a basic type"),
            ErrorKind::RecursiveType => write!(f, "recursive type cannot be encoded"),
            ErrorKind::MissingFd(index) => write!(f, "no file descriptor attached at index {index}"),
            ErrorKind::TruncatedAncillaryData => {
                write!(f, "truncated ancillary data while passing file descriptors")
            }
            ErrorKind::InvalidVariantSignature => {
                write!(f, "variant signature must describe exactly one complete type")
            }
            ErrorKind::Call { name, message } => write!(f, "{name}: {message}"),
            ErrorKind::Cancelled => write!(f, "call was cancelled"),
            ErrorKind::Closed => write!(f, "connection is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error),
            ErrorKind::Signature(error) => Some(error),
            ErrorKind::ObjectPath(error) => Some(error),
            ErrorKind::Utf8Error(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum ErrorKind {
    Io(io::Error),
    Eof,
    Signature(SignatureError),
    ObjectPath(ObjectPathError),
    Utf8Error(Utf8Error),
    WouldBlock,
    BufferUnderflow,
    MissingBus,
    InvalidAddress,
    InvalidSaslState(SaslStage),
    InvalidSasl,
    InvalidSaslResponse,
    HandshakeFailed,
    InvalidProtocol,
    MissingPath,
    MissingInterface,
    MissingMember,
    MissingReplySerial,
    ZeroSerial,
    MissingErrorName,
    UnexpectedMessageKind,
    NotNullTerminated,
    ArrayTooLong(u32),
    BodyTooLong(u32),
    SignatureMismatch,
    UnrepresentableType(&'static str),
    DictKeyNotBasic,
    RecursiveType,
    MissingFd(u32),
    TruncatedAncillaryData,
    /// A variant's signature did not describe exactly one complete type.
    InvalidVariantSignature,
    /// A `METHOD_RETURN`-shaped `ERROR` reply from the bus or a peer.
    Call { name: String, message: String },
    Cancelled,
    Closed,
}
