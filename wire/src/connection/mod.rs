use self::transport::Transport;
mod transport;

pub use self::builder::ConnectionBuilder;
mod builder;

pub use self::connection::{CallError, Connection};
mod connection;
