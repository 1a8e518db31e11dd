use tokio::net::UnixStream;

use crate::error::Result;

use super::{Connection, Transport};

enum BusKind {
    Session,
    System,
    Stream(UnixStream),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum AuthKind {
    /// No authentication, straight to `BEGIN`.
    None,
    /// `AUTH EXTERNAL` using the current UID.
    Uid,
}

/// Builder of a [`Connection`].
pub struct ConnectionBuilder {
    bus: BusKind,
    auth: AuthKind,
}

impl ConnectionBuilder {
    /// Construct a new [`ConnectionBuilder`] with the default configuration:
    /// the session bus, authenticated as the current UID.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbus_wire::ConnectionBuilder;
    ///
    /// let c = ConnectionBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            bus: BusKind::Session,
            auth: AuthKind::Uid,
        }
    }

    /// Explicitly disable authentication for this connection.
    ///
    /// Only useful against a peer that skips SASL negotiation entirely, such
    /// as a test fixture talking directly over a socket pair.
    pub fn no_auth(&mut self) -> &mut Self {
        self.auth = AuthKind::None;
        self
    }

    /// Connect to the session bus (default), per
    /// `DBUS_SESSION_BUS_ADDRESS`/`DBUS_STARTER_ADDRESS`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dbus_wire::ConnectionBuilder;
    ///
    /// # #[tokio::main] async fn main() -> dbus_wire::Result<()> {
    /// let c = ConnectionBuilder::new().session_bus().build().await?;
    /// # Ok(()) }
    /// ```
    pub fn session_bus(&mut self) -> &mut Self {
        self.bus = BusKind::Session;
        self
    }

    /// Connect to the system bus, per
    /// `DBUS_SYSTEM_BUS_ADDRESS`/`DBUS_STARTER_ADDRESS`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dbus_wire::ConnectionBuilder;
    ///
    /// # #[tokio::main] async fn main() -> dbus_wire::Result<()> {
    /// let c = ConnectionBuilder::new().system_bus().build().await?;
    /// # Ok(()) }
    /// ```
    pub fn system_bus(&mut self) -> &mut Self {
        self.bus = BusKind::System;
        self
    }

    /// Use an already-connected stream instead of resolving a bus address.
    ///
    /// Intended for tests built on [`UnixStream::pair`].
    pub fn stream(&mut self, stream: UnixStream) -> &mut Self {
        self.bus = BusKind::Stream(stream);
        self
    }

    /// Connect and perform the SASL handshake, spawning the reader and
    /// writer tasks and issuing the automatic `Hello`.
    pub async fn build(&mut self) -> Result<Connection> {
        let transport = match std::mem::replace(&mut self.bus, BusKind::Session) {
            BusKind::Session => Transport::session_bus().await?,
            BusKind::System => Transport::system_bus().await?,
            BusKind::Stream(stream) => Transport::from_tokio(stream),
        };

        Connection::connect(transport, self.auth).await
    }
}

impl Default for ConnectionBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
