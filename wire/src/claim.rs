//! Acquiring and holding ownership of a well-known bus name.
//!
//! [`Claim::acquire`] issues `RequestName` and subscribes to `NameAcquired`,
//! `NameLost`, and `NameOwnerChanged` so the claim can track every later
//! transition of ownership without the caller polling. Ownership edges are
//! coalesced: regaining the name twice in a row without losing it in between
//! only ever surfaces one `true`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::codec::BodyBuf;
use crate::error::{Error, ErrorKind, Result};
use crate::object_path::ObjectPath;
use crate::org_freedesktop_dbus::{self as bus, NameFlag, NameReply};
use crate::ty::DBusType;
use crate::watch::{MatchRule, Watch};
use crate::Connection;

const CHANNEL_CAPACITY: usize = 8;

/// Flags controlling what happens when the requested name is already owned.
///
/// Maps onto the flags of the `RequestName` bus call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimOptions {
    allow_replacement: bool,
    no_queue: bool,
    try_replace: bool,
}

impl ClaimOptions {
    /// No flags: wait in the queue behind the current owner, and do not
    /// allow a later claimant to replace us once we own the name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit a later claimant with [`Self::try_replace`] to take the name
    /// away from us once we own it.
    #[must_use]
    pub fn allow_replacement(mut self, value: bool) -> Self {
        self.allow_replacement = value;
        self
    }

    /// Do not join the wait queue if the name is already owned.
    #[must_use]
    pub fn no_queue(mut self, value: bool) -> Self {
        self.no_queue = value;
        self
    }

    /// Attempt to displace the current owner, if it permits replacement.
    #[must_use]
    pub fn try_replace(mut self, value: bool) -> Self {
        self.try_replace = value;
        self
    }

    fn to_name_flag(self) -> NameFlag {
        let mut flag = NameFlag::default();

        if self.allow_replacement {
            flag = flag | NameFlag::ALLOW_REPLACEMENT;
        }

        if self.try_replace {
            flag = flag | NameFlag::REPLACE_EXISTING;
        }

        if self.no_queue {
            flag = flag | NameFlag::DO_NOT_QUEUE;
        }

        flag
    }
}

/// The state of a [`Claim`].
///
/// `{Idle}` -(Request)-> `{Acquiring}` -(response)-> `{Owner|Queued|Detached}`;
/// `{Owner}` -(NameLost)-> `{Queued|Detached}`; `{Queued}` -(NameAcquired)->
/// `{Owner}`; any state -(Close)-> `{Closed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// We hold the name.
    Owner,
    /// Someone else holds the name; we are waiting in line for it.
    Queued,
    /// Someone else holds the name and we did not join the queue, or were
    /// dropped from it by a `NoQueue` request.
    Detached,
    /// The claim has been closed and the name released.
    Closed,
}

struct Shared {
    state: Mutex<ClaimState>,
    no_queue: AtomicBool,
}

/// A held or pending ownership of a well-known bus name.
///
/// Dropping a `Claim` releases the name in the background, equivalent to
/// calling [`Claim::close`] without waiting for it to complete.
pub struct Claim {
    connection: Connection,
    name: String,
    shared: Arc<Shared>,
    tx: mpsc::Sender<bool>,
    events: mpsc::Receiver<bool>,
    task: JoinHandle<()>,
    closed: AtomicBool,
}

impl Claim {
    pub(crate) async fn acquire(connection: Connection, name: String, opts: ClaimOptions) -> Result<Claim> {
        let initial_state = request_name(&connection, &name, opts).await?;

        let acquired = connection
            .watch(
                MatchRule::new()
                    .interface(bus::INTERFACE)
                    .member(bus::NAME_ACQUIRED)
                    .arg(0, name.clone()),
            )
            .await?;

        let lost = connection
            .watch(
                MatchRule::new()
                    .interface(bus::INTERFACE)
                    .member(bus::NAME_LOST)
                    .arg(0, name.clone()),
            )
            .await?;

        let owner_changed = connection
            .watch(
                MatchRule::new()
                    .interface(bus::INTERFACE)
                    .member(bus::NAME_OWNER_CHANGED)
                    .arg(0, name.clone()),
            )
            .await?;

        let shared = Arc::new(Shared {
            state: Mutex::new(initial_state),
            no_queue: AtomicBool::new(opts.no_queue),
        });

        let (tx, events) = mpsc::channel(CHANNEL_CAPACITY);
        let _ = tx.try_send(initial_state == ClaimState::Owner);

        let task = tokio::spawn(run_claim(shared.clone(), name.clone(), acquired, lost, owner_changed, tx.clone()));

        Ok(Claim {
            connection,
            name,
            shared,
            tx,
            events,
            task,
            closed: AtomicBool::new(false),
        })
    }

    /// This claim's current state.
    pub fn state(&self) -> ClaimState {
        *self.shared.state.lock().unwrap()
    }

    /// Re-issue `RequestName` with new flags, without releasing the name we
    /// may already hold.
    pub async fn request(&self, opts: ClaimOptions) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::new(ErrorKind::Closed));
        }

        let new_state = request_name(&self.connection, &self.name, opts).await?;
        self.shared.no_queue.store(opts.no_queue, Ordering::Release);

        let was_owner = {
            let mut state = self.shared.state.lock().unwrap();
            let was_owner = *state == ClaimState::Owner;
            *state = new_state;
            was_owner
        };

        let now_owner = new_state == ClaimState::Owner;

        if was_owner != now_owner {
            let _ = self.tx.send(now_owner).await;
        }

        Ok(())
    }

    /// Wait for the next ownership transition: `true` when we acquire or
    /// regain the name, `false` when we lose it or fail to acquire it.
    ///
    /// Returns `None` once the claim has been closed and no further
    /// transitions will arrive.
    pub async fn recv(&mut self) -> Option<bool> {
        self.events.recv().await
    }

    /// Release the name. Idempotent: closing an already-closed claim does
    /// nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.task.abort();

        let was_owner = {
            let mut state = self.shared.state.lock().unwrap();
            let was_owner = *state == ClaimState::Owner;
            *state = ClaimState::Closed;
            was_owner
        };

        if was_owner {
            let _ = self.tx.send(false).await;
        }

        if let Err(error) = release_name(&self.connection, &self.name).await {
            debug!(?error, name = %self.name, "failed to release name");
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.task.abort();

        let connection = self.connection.clone();
        let name = self.name.clone();

        tokio::spawn(async move {
            if let Err(error) = release_name(&connection, &name).await {
                debug!(?error, name = %name, "failed to release name on drop");
            }
        });
    }
}

async fn request_name(connection: &Connection, name: &str, opts: ClaimOptions) -> Result<ClaimState> {
    let flag = opts.to_name_flag();

    let mut body = BodyBuf::new();
    body.store_str(name);
    flag.encode(&mut body)?;

    let reply = connection
        .call(bus::DESTINATION, ObjectPath::new_const(bus::PATH), bus::INTERFACE, bus::REQUEST_NAME, body)
        .await?;

    let mut cursor = reply.body();
    let code = NameReply::decode(&mut cursor)?;

    match code {
        NameReply::PRIMARY_OWNER | NameReply::ALREADY_OWNER => Ok(ClaimState::Owner),
        NameReply::IN_QUEUE => Ok(ClaimState::Queued),
        NameReply::EXISTS => Ok(ClaimState::Detached),
        _ => Err(Error::new(ErrorKind::SignatureMismatch)),
    }
}

async fn release_name(connection: &Connection, name: &str) -> Result<()> {
    let mut body = BodyBuf::new();
    body.store_str(name);

    connection
        .call(bus::DESTINATION, ObjectPath::new_const(bus::PATH), bus::INTERFACE, bus::RELEASE_NAME, body)
        .await?;

    Ok(())
}

async fn run_claim(
    shared: Arc<Shared>,
    name: String,
    mut acquired: Watch,
    mut lost: Watch,
    mut owner_changed: Watch,
    tx: mpsc::Sender<bool>,
) {
    loop {
        tokio::select! {
            event = acquired.recv() => {
                let Some(_event) = event else { return };

                let was_owner = {
                    let mut state = shared.state.lock().unwrap();
                    let was_owner = *state == ClaimState::Owner;
                    *state = ClaimState::Owner;
                    was_owner
                };

                if !was_owner && tx.send(true).await.is_err() {
                    return;
                }
            }
            event = lost.recv() => {
                let Some(_event) = event else { return };

                let was_owner = {
                    let mut state = shared.state.lock().unwrap();
                    let was_owner = *state == ClaimState::Owner;

                    *state = if shared.no_queue.load(Ordering::Acquire) {
                        ClaimState::Detached
                    } else {
                        ClaimState::Queued
                    };

                    was_owner
                };

                if was_owner && tx.send(false).await.is_err() {
                    return;
                }
            }
            event = owner_changed.recv() => {
                let Some(_event) = event else { return };
                trace!(name = %name, "name owner changed");
            }
        }
    }
}
