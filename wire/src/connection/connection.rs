use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use dbus_core::signature::Signature;

use crate::codec::{padding_to, BodyBuf};
use crate::error::{Error, ErrorKind, Result};
use crate::message::{decode_u32, Message, MessageKind, Serial};
use crate::object_path::ObjectPath;
use crate::object_server::{self, Handler, ObjectServer};
use crate::org_freedesktop_dbus as bus;
use crate::sasl::{self, Auth};
use crate::ty::DBusType;
use crate::value::Value;
use crate::watch::{MatchRule, SignalDispatch, Watch};

use super::builder::AuthKind;
use super::transport::{TransportReader, TransportWriter};
use super::Transport;

/// The error returned by a failed method call.
///
/// Covers every way a call can fail to complete: a transport or protocol
/// failure, cancellation, issuing it on a closed connection, and the
/// remote's own `ERROR` reply - match on [`Error::call_name`] to tell the
/// last apart from the rest.
pub type CallError = Error;

type CallTable = HashMap<NonZeroU32, oneshot::Sender<Result<Message, CallError>>>;

struct Inner {
    next_serial: AtomicU32,
    writer_tx: mpsc::UnboundedSender<Message>,
    calls: Mutex<CallTable>,
    dispatch: Mutex<SignalDispatch>,
    object_server: ObjectServer,
    local_name: Mutex<Option<String>>,
    closed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// A shared handle to an established D-Bus connection.
///
/// Cloning a `Connection` is cheap - every clone refers to the same reader
/// and writer tasks, the same call table, and the same object server, so any
/// number of concurrent callers can issue calls, watch signals, and export
/// objects over the one socket underneath.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Perform the SASL handshake over `transport`, then spawn the reader and
    /// writer tasks and issue the automatic `Hello`.
    ///
    /// Any call made against the returned handle is only dispatched once
    /// `Hello`'s reply has populated [`Connection::local_name`]; the call
    /// itself is safe to issue immediately; it queues behind `Hello` on the
    /// writer.
    pub(crate) async fn connect(transport: Transport, auth: AuthKind) -> Result<Self> {
        let mut transport = transport;

        match auth {
            AuthKind::Uid => {
                let mut uid_buf = [0u8; 32];
                let auth = Auth::external_from_uid(&mut uid_buf);
                transport.write_all(&sasl::encode_handshake(auth), &[]).await?;

                let line = read_line(&mut transport).await?;
                sasl::parse_ok_line(&line)?;

                let line = read_line(&mut transport).await?;
                sasl::parse_agree_unix_fd_line(&line)?;
            }
            AuthKind::None => {
                transport.write_all(b"\0BEGIN\r\n", &[]).await?;
            }
        }

        let (reader, writer) = transport.into_split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(Inner {
            next_serial: AtomicU32::new(0),
            writer_tx,
            calls: Mutex::new(HashMap::new()),
            dispatch: Mutex::new(SignalDispatch::default()),
            object_server: ObjectServer::new(),
            local_name: Mutex::new(None),
            closed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        });

        let connection = Self { inner };

        let reader_task = tokio::spawn(reader_loop(connection.clone(), reader));
        let writer_task = tokio::spawn(writer_loop(connection.clone(), writer, writer_rx));

        {
            let mut tasks = connection.inner.tasks.lock().unwrap();
            tasks.push(reader_task);
            tasks.push(writer_task);
        }

        let reply = connection
            .call_raw(
                Message::method_call(ObjectPath::new_const(bus::PATH), bus::HELLO, connection.next_serial())
                    .with_interface(bus::INTERFACE)
                    .with_destination(bus::DESTINATION)
                    .with_body(BodyBuf::new()),
            )
            .await?;

        let mut cursor = reply.body();
        let local_name = String::decode(&mut cursor)?;
        *connection.inner.local_name.lock().unwrap() = Some(local_name);

        Ok(connection)
    }

    fn next_serial(&self) -> Serial {
        loop {
            let next = self.inner.next_serial.fetch_add(1, Ordering::Relaxed).wrapping_add(1);

            if let Some(serial) = NonZeroU32::new(next) {
                return Serial::new(serial);
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    async fn call_raw(&self, msg: Message) -> Result<Message, CallError> {
        if self.is_closed() {
            return Err(Error::new(ErrorKind::Closed));
        }

        let serial = msg.serial();
        let (tx, rx) = oneshot::channel();

        self.inner.calls.lock().unwrap().insert(serial, tx);

        if self.inner.writer_tx.send(msg).is_err() {
            self.inner.calls.lock().unwrap().remove(&serial);
            return Err(Error::new(ErrorKind::Closed));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::new(ErrorKind::Closed)),
        }
    }

    /// Invoke a method on a remote object, waiting for its reply.
    ///
    /// `body` is the already-encoded argument list; the caller decodes the
    /// reply's body against whatever type it expects.
    pub async fn call(
        &self,
        destination: impl Into<String>,
        path: &ObjectPath,
        interface: impl Into<String>,
        method: impl Into<String>,
        body: BodyBuf,
    ) -> Result<Message, CallError> {
        let msg = Message::method_call(path, method, self.next_serial())
            .with_interface(interface)
            .with_destination(destination)
            .with_body(body);

        self.call_raw(msg).await
    }

    /// Invoke a method without waiting for (or expecting) a reply.
    pub fn call_no_reply(
        &self,
        destination: impl Into<String>,
        path: &ObjectPath,
        interface: impl Into<String>,
        method: impl Into<String>,
        body: BodyBuf,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(Error::new(ErrorKind::Closed));
        }

        let msg = Message::method_call(path, method, self.next_serial())
            .with_interface(interface)
            .with_destination(destination)
            .with_body(body)
            .no_reply_expected();

        self.inner
            .writer_tx
            .send(msg)
            .map_err(|_| Error::new(ErrorKind::Closed))
    }

    /// Broadcast a signal.
    pub fn emit(&self, path: &ObjectPath, interface: impl Into<String>, member: impl Into<String>, body: BodyBuf) -> Result<()> {
        if self.is_closed() {
            return Err(Error::new(ErrorKind::Closed));
        }

        let msg = Message::signal(path, member, self.next_serial())
            .with_interface(interface)
            .with_body(body);

        self.inner
            .writer_tx
            .send(msg)
            .map_err(|_| Error::new(ErrorKind::Closed))
    }

    /// Register a server-side method handler.
    ///
    /// See [`ObjectServer::register_handler`].
    pub fn register_handler<H>(&self, path: &ObjectPath, interface: impl Into<String>, member: impl Into<String>, handler: H)
    where
        H: Handler,
    {
        self.inner.object_server.register_handler(path, interface, member, handler);
    }

    /// Remove a previously registered server-side method handler.
    pub fn unregister_handler(&self, path: &ObjectPath, interface: &str, member: &str) {
        self.inner.object_server.unregister_handler(path, interface, member);
    }

    /// Subscribe to signals matching `rule`.
    ///
    /// If an identical rule is already registered by another watch, the
    /// bus-side subscription is shared; otherwise `AddMatch` is issued.
    pub async fn watch(&self, rule: MatchRule) -> Result<Watch> {
        if self.is_closed() {
            return Err(Error::new(ErrorKind::Closed));
        }

        let (id, rule_string, is_new, rx) = self.inner.dispatch.lock().unwrap().register(rule, crate::watch::DEFAULT_CAPACITY);

        if is_new {
            let mut body = BodyBuf::new();
            body.store_str(&rule_string);

            if let Err(e) = self
                .call(bus::DESTINATION, ObjectPath::new_const(bus::PATH), bus::INTERFACE, bus::ADD_MATCH, body)
                .await
            {
                self.inner.dispatch.lock().unwrap().unregister(id);
                return Err(e);
            }
        }

        Ok(Watch::new(id, rx, self.clone()))
    }

    pub(crate) fn unregister_watch(&self, id: u64) {
        let Some(rule_string) = self.inner.dispatch.lock().unwrap().unregister(id) else {
            return;
        };

        if self.is_closed() {
            return;
        }

        let connection = self.clone();

        tokio::spawn(async move {
            let mut body = BodyBuf::new();
            body.store_str(&rule_string);

            if let Err(error) = connection
                .call(bus::DESTINATION, ObjectPath::new_const(bus::PATH), bus::INTERFACE, bus::REMOVE_MATCH, body)
                .await
            {
                debug!(?error, "failed to remove match rule on watch close");
            }
        });
    }

    /// This connection's unique bus name, assigned by `Hello` on connect.
    ///
    /// Always present and begins with `:` once [`Connection::connect`] has
    /// returned successfully.
    pub fn local_name(&self) -> String {
        self.inner
            .local_name
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_default()
    }

    /// List every peer currently connected to the bus.
    pub async fn peers(&self) -> Result<Vec<String>> {
        let reply = self
            .call(bus::DESTINATION, ObjectPath::new_const(bus::PATH), bus::INTERFACE, "ListNames", BodyBuf::new())
            .await?;

        let mut cursor = reply.body();
        Vec::<String>::decode(&mut cursor)
    }

    /// Fetch the identity (uid, process id) the bus has on file for `peer`.
    pub async fn peer_identity(&self, peer: &str) -> Result<(u32, u32)> {
        let mut uid_body = BodyBuf::new();
        uid_body.store_str(peer);

        let uid_reply = self
            .call(
                bus::DESTINATION,
                ObjectPath::new_const(bus::PATH),
                bus::INTERFACE,
                "GetConnectionUnixUser",
                uid_body,
            )
            .await?;

        let mut pid_body = BodyBuf::new();
        pid_body.store_str(peer);

        let pid_reply = self
            .call(
                bus::DESTINATION,
                ObjectPath::new_const(bus::PATH),
                bus::INTERFACE,
                "GetConnectionUnixProcessID",
                pid_body,
            )
            .await?;

        let uid = u32::decode(&mut uid_reply.body())?;
        let pid = u32::decode(&mut pid_reply.body())?;
        Ok((uid, pid))
    }

    /// Enumerate the bus's advertised feature flags.
    ///
    /// Fetched as the `Features` property on `org.freedesktop.DBus` via the
    /// standard `org.freedesktop.DBus.Properties` interface.
    pub async fn features(&self) -> Result<Vec<String>> {
        let mut body = BodyBuf::new();
        body.store_str(bus::INTERFACE);
        body.store_str("Features");

        let reply = self
            .call(
                bus::DESTINATION,
                ObjectPath::new_const(bus::PATH),
                "org.freedesktop.DBus.Properties",
                "Get",
                body,
            )
            .await?;

        let mut cursor = reply.body();
        let value = Value::decode(Signature::VARIANT, &mut cursor)?;

        let Value::Variant(value) = value else {
            return Err(Error::new(ErrorKind::SignatureMismatch));
        };

        let Value::Array(_, items) = *value else {
            return Err(Error::new(ErrorKind::SignatureMismatch));
        };

        items
            .into_iter()
            .map(|item| match item {
                Value::Basic(crate::value::Basic::String(s)) => Ok(s),
                _ => Err(Error::new(ErrorKind::SignatureMismatch)),
            })
            .collect()
    }

    /// The bus's own unique identifier (a random, persistent GUID).
    pub async fn bus_id(&self) -> Result<String> {
        let reply = self
            .call(bus::DESTINATION, ObjectPath::new_const(bus::PATH), bus::INTERFACE, "GetId", BodyBuf::new())
            .await?;

        let mut cursor = reply.body();
        String::decode(&mut cursor)
    }

    /// Claim ownership of a well-known bus name.
    ///
    /// See [`crate::Claim`].
    pub async fn claim(&self, name: impl Into<String>, opts: crate::claim::ClaimOptions) -> Result<crate::Claim> {
        crate::claim::Claim::acquire(self.clone(), name.into(), opts).await
    }

    /// Stop the reader and writer tasks, fail every outstanding call with a
    /// closed-connection error, and terminate every watch's delivery queue.
    ///
    /// Idempotent: closing an already-closed connection does nothing.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for (_, tx) in self.inner.calls.lock().unwrap().drain() {
            let _ = tx.send(Err(Error::new(ErrorKind::Closed)));
        }

        self.inner.dispatch.lock().unwrap().close_all();

        for task in self.inner.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }

    pub(crate) fn object_server(&self) -> &ObjectServer {
        &self.inner.object_server
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

/// Read a single `\r\n`-terminated line during the SASL handshake, before
/// the connection has switched to the binary message format.
async fn read_line(transport: &mut Transport) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = transport.read(&mut byte).await?;

        if n == 0 {
            return Err(Error::new(ErrorKind::Eof));
        }

        if byte[0] == b'\n' {
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            return Ok(line);
        }

        line.push(byte[0]);
    }
}

/// Determine the length of the next complete frame buffered in `data`, or
/// `None` if more bytes are needed before that can be known.
fn frame_len(data: &[u8]) -> Result<Option<usize>> {
    if data.len() < 16 {
        return Ok(None);
    }

    let endianness = dbus_core::proto::Endianness::new(data[0]);
    let body_length = decode_u32(endianness, &data[4..8]) as usize;
    let fields_length = decode_u32(endianness, &data[12..16]) as usize;

    if fields_length > (1 << 26) || body_length > (1 << 27) {
        return Err(Error::new(ErrorKind::BodyTooLong(body_length as u32)));
    }

    let header_end = 16 + fields_length;
    let body_start = header_end + padding_to(8, header_end);

    Ok(Some(body_start + body_length))
}

async fn reader_loop(connection: Connection, mut reader: TransportReader) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let frame = loop {
            match frame_len(&buf) {
                Ok(Some(len)) if buf.len() >= len => {
                    let frame = buf[..len].to_vec();
                    buf.drain(..len);
                    break frame;
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(?error, "malformed message header, closing connection");
                    connection.close();
                    return;
                }
            }

            match reader.read(&mut chunk).await {
                Ok(0) => {
                    debug!("connection closed by peer");
                    connection.close();
                    return;
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(error) => {
                    warn!(?error, "transport read failed, closing connection");
                    connection.close();
                    return;
                }
            }
        };

        let fd_count = match Message::peek_unix_fds(&frame) {
            Ok(count) => count as usize,
            Err(error) => {
                warn!(?error, "failed to read UNIX_FDS header field");
                continue;
            }
        };

        let fds = match reader.take_fds(fd_count) {
            Ok(fds) => fds,
            Err(error) => {
                warn!(?error, "truncated ancillary data, closing connection");
                connection.close();
                return;
            }
        };

        let msg = match Message::decode_with_fds(&frame, fds) {
            Ok(msg) => msg,
            Err(error) => {
                trace!(?error, "failed to decode message, skipping");
                continue;
            }
        };

        dispatch_incoming(&connection, msg);
    }
}

fn dispatch_incoming(connection: &Connection, msg: Message) {
    match msg.kind() {
        MessageKind::MethodReturn { reply_serial } | MessageKind::Error { reply_serial, .. } => {
            let reply_serial = *reply_serial;
            let tx = connection.inner.calls.lock().unwrap().remove(&reply_serial);

            let Some(tx) = tx else {
                return;
            };

            let result = if let MessageKind::Error { error_name, .. } = msg.kind() {
                let error_name = error_name.clone();
                let mut cursor = msg.body();
                let text = String::decode(&mut cursor).unwrap_or_default();
                Err(Error::call(error_name, text))
            } else {
                Ok(msg)
            };

            let _ = tx.send(result);
        }
        MessageKind::Signal { .. } => {
            connection.inner.dispatch.lock().unwrap().route(&msg);
        }
        MessageKind::MethodCall { .. } => {
            let connection = connection.clone();
            tokio::spawn(async move { handle_call(connection, msg).await });
        }
    }
}

async fn handle_call(connection: Connection, msg: Message) {
    let no_reply = msg.flags() & dbus_core::proto::Flags::NO_REPLY_EXPECTED;

    let result = if let Some(result) = object_server::dispatch_peer(&msg) {
        result
    } else if let Some(result) = object_server::dispatch_introspectable(&msg, connection.object_server()) {
        result
    } else {
        let MessageKind::MethodCall { path, member } = msg.kind() else {
            return;
        };

        match connection.object_server().lookup(path.as_ref(), msg.interface(), member) {
            Some(handler) => {
                let ctx = object_server::CallContext {
                    sender: msg.sender().map(str::to_owned),
                    path: path.clone(),
                    interface: msg.interface().map(str::to_owned),
                    member: member.clone(),
                };

                handler.call(&ctx, msg.body())
            }
            None => Err(Error::call("org.freedesktop.DBus.Error.UnknownMethod", "no such method")),
        }
    };

    if no_reply {
        return;
    }

    let reply = match result {
        Ok(body) => msg.method_return(connection.next_serial()).with_body(body),
        Err(error) => {
            let name = error.call_name().unwrap_or("org.freedesktop.DBus.Error.Failed").to_string();
            let mut body = BodyBuf::new();
            body.store_str(&error.to_string());
            msg.error_return(name, connection.next_serial()).with_body(body)
        }
    };

    if connection.inner.writer_tx.send(reply).is_err() {
        debug!("writer task gone, dropping reply");
    }
}

async fn writer_loop(connection: Connection, mut writer: TransportWriter, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let fds = msg.fds().to_vec();
        let bytes = msg.encode();

        if let Err(error) = writer.write_all(&bytes, &fds).await {
            warn!(?error, "transport write failed, closing connection");
            connection.close();
            return;
        }
    }
}
