//! Raw wire-level protocol constants for D-Bus messages.
//!
//! These mirror the constants defined by the D-Bus specification's message
//! format section; they carry no behavior beyond naming the raw byte values
//! used on the wire.

raw_enum! {
    /// The byte order a message was encoded with.
    #[repr(u8)]
    pub enum Endianness {
        /// Big endian, the ASCII character `'B'`.
        BIG = b'B',
        /// Little endian, the ASCII character `'l'`.
        LITTLE = b'l',
    }
}

impl Endianness {
    /// The endianness of the host this code is compiled for.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::BIG;

    /// The endianness of the host this code is compiled for.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::LITTLE;
}

raw_enum! {
    /// The type of a message.
    #[repr(u8)]
    pub enum MessageType {
        /// An invalid message type, should never be seen on the wire.
        INVALID = 0,
        /// A method call, expects a `METHOD_RETURN` or `ERROR` in response
        /// unless `NO_REPLY_EXPECTED` is set.
        METHOD_CALL = 1,
        /// A successful reply to a `METHOD_CALL`.
        METHOD_RETURN = 2,
        /// An error reply to a `METHOD_CALL`.
        ERROR = 3,
        /// A signal emission.
        SIGNAL = 4,
    }
}

raw_set! {
    /// Flags carried in a message header.
    #[repr(u8)]
    pub enum Flags {
        /// The sender does not want a reply to this method call.
        NO_REPLY_EXPECTED = 0x1,
        /// The bus must not launch an owner for the destination name if one
        /// isn't currently running.
        NO_AUTO_START = 0x2,
        /// This call permits the destination to show a user interface to
        /// obtain authorization, which may take a noticeable amount of time.
        ALLOW_INTERACTIVE_AUTHORIZATION = 0x4,
    }
}

raw_enum! {
    /// The type code of a single complete type, as it appears in a
    /// signature string.
    #[repr(u8)]
    pub enum Type {
        /// Not a valid type code, used as a sentinel.
        INVALID = 0,
        /// `y`: 8-bit unsigned integer.
        BYTE = b'y',
        /// `b`: boolean, encoded as a `u32` that must be 0 or 1.
        BOOLEAN = b'b',
        /// `n`: 16-bit signed integer.
        INT16 = b'n',
        /// `q`: 16-bit unsigned integer.
        UINT16 = b'q',
        /// `i`: 32-bit signed integer.
        INT32 = b'i',
        /// `u`: 32-bit unsigned integer.
        UINT32 = b'u',
        /// `x`: 64-bit signed integer.
        INT64 = b'x',
        /// `t`: 64-bit unsigned integer.
        UINT64 = b't',
        /// `d`: IEEE 754 double.
        DOUBLE = b'd',
        /// `s`: UTF-8 string, nul-terminated on the wire.
        STRING = b's',
        /// `o`: object path, nul-terminated on the wire.
        OBJECT_PATH = b'o',
        /// `g`: signature, length-prefixed by a single byte.
        SIGNATURE = b'g',
        /// `a`: array, must be followed by a single complete element type.
        ARRAY = b'a',
        /// `(`: opens a struct.
        OPEN_PAREN = b'(',
        /// `)`: closes a struct.
        CLOSE_PAREN = b')',
        /// `v`: variant, self-describing value.
        VARIANT = b'v',
        /// `{`: opens a dict entry, only legal directly inside an array.
        OPEN_BRACE = b'{',
        /// `}`: closes a dict entry.
        CLOSE_BRACE = b'}',
        /// `h`: index into a message's out-of-band file descriptor array.
        UNIX_FD = b'h',
    }
}

raw_enum! {
    /// The header field code identifying which well-known field a header
    /// entry carries.
    #[repr(u8)]
    pub enum Variant {
        /// Not a valid field code.
        INVALID = 0,
        /// The object path the message is sent to or from.
        PATH = 1,
        /// The interface the member belongs to.
        INTERFACE = 2,
        /// The member (method or signal) name.
        MEMBER = 3,
        /// The name of the error, for `ERROR` messages.
        ERROR_NAME = 4,
        /// The serial this message is a reply to.
        REPLY_SERIAL = 5,
        /// The well-known or unique name of the intended recipient.
        DESTINATION = 6,
        /// The unique name of the sender, filled in by the bus.
        SENDER = 7,
        /// The signature of the message body.
        SIGNATURE = 8,
        /// The number of Unix file descriptors accompanying the message.
        UNIX_FDS = 9,
    }
}
