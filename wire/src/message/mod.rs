pub use self::message_kind::MessageKind;
mod message_kind;

pub use self::message::Message;
pub(crate) use self::message::decode_u32;
mod message;

pub use self::serial::Serial;
mod serial;
