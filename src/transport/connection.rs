//! Endpoint state record and session state machine.
//!
//! ```text
//! CLOSED --connect--> REQUEST_SENT --POSITIVE_RESP--> SESSION
//!                          |                            |
//!                   RETARGET_RESP               disconnect / fatal
//!                          v                            v
//!                      RETARGET --reconnect--> REQUEST_SENT    CLOSED
//! ```

use std::net::{SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::error::{TransportError, TransportResult};
use super::name::{NbAddr, NbName};
use super::socket::{NbssStream, SocketOptions};
use super::timing::TimeoutCalibrator;

/// Session state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection.
    #[default]
    Closed,
    /// Connected, session request sent, waiting for the reply.
    RequestSent,
    /// Session established, MESSAGE traffic allowed.
    Session,
    /// Peer redirected us; reconnect pending.
    Retarget,
}

/// Everything the endpoint lock protects.
#[derive(Debug, Default)]
pub struct ConnectionState {
    /// Current session state.
    pub phase: SessionState,
    /// Session established and not yet torn down.
    pub connected: bool,
    /// A connect is running.
    pub connecting: bool,
    /// A receive is in flight.
    pub receiving: bool,
    /// The notify target fired and nobody has looked yet.
    pub upcall_pending: bool,
    /// Bound local name.
    pub local_name: Option<NbName>,
    /// Peer of the current or last connection.
    pub peer: Option<NbAddr>,
    /// Live socket.
    pub stream: Option<Arc<NbssStream>>,
    /// Bumped every time a socket is attached.
    pub generation: u64,
    /// Bumped every time a connect claims the endpoint.
    pub attempt: u64,
    /// Reconnects done by the last connect after a retarget.
    pub reconnects: u32,
    /// Handshake timeout.
    pub timing: TimeoutCalibrator,
    /// Socket setup for the next connect.
    pub options: SocketOptions,
    /// Registered notify target.
    pub notify: Option<Arc<Notify>>,
}

/// Endpoint state behind its lock.
pub(crate) type SharedState = Mutex<ConnectionState>;

/// Lock the endpoint state.
///
/// The record stays consistent across a panicking holder, so poisoning is
/// ignored.
pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, ConnectionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionState {
    /// Create a closed endpoint state.
    pub fn new(options: SocketOptions, timing: TimeoutCalibrator) -> Self {
        Self {
            options,
            timing,
            ..Self::default()
        }
    }

    /// Record the local name. Only allowed once, before any connect.
    pub fn bind(&mut self, name: NbName) -> TransportResult<()> {
        if self.local_name.is_some() {
            return Err(TransportError::AlreadyBound);
        }
        if self.phase != SessionState::Closed || self.connecting {
            return Err(TransportError::AlreadyConnected);
        }
        self.local_name = Some(name);
        Ok(())
    }

    /// Claim the endpoint for a connect. Returns the attempt id the connect
    /// checks ownership with.
    pub fn begin_connect(&mut self) -> TransportResult<u64> {
        if self.phase != SessionState::Closed || self.connecting || self.stream.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        if self.local_name.is_none() {
            return Err(TransportError::NotBound);
        }
        self.connecting = true;
        self.reconnects = 0;
        self.attempt += 1;
        Ok(self.attempt)
    }

    /// Check if connect `attempt` still holds the endpoint.
    ///
    /// False once a disconnect ran, even if a newer connect claimed it since.
    pub fn owns_connect(&self, attempt: u64) -> bool {
        self.connecting && self.attempt == attempt
    }

    /// Attach a freshly connected socket for `peer`.
    pub fn attach(&mut self, stream: NbssStream, peer: NbAddr) {
        self.stream = Some(Arc::new(stream));
        self.peer = Some(peer);
        self.generation += 1;
    }

    /// Session request written.
    pub fn on_request_sent(&mut self) {
        self.phase = SessionState::RequestSent;
    }

    /// Positive response received.
    pub fn on_session(&mut self) {
        self.phase = SessionState::Session;
        self.connected = true;
        self.connecting = false;
    }

    /// Retarget response received.
    ///
    /// Replaces the peer address, keeping the called name, and detaches the
    /// current socket so the caller can close it. Returns the detached socket
    /// and the new peer.
    pub fn on_retarget(&mut self, target: SocketAddrV4) -> (Option<Arc<NbssStream>>, Option<NbAddr>) {
        self.phase = SessionState::Retarget;
        self.reconnects += 1;
        if let Some(peer) = &self.peer {
            self.peer = Some(NbAddr::new(SocketAddr::V4(target), peer.name.clone()));
        }
        (self.stream.take(), self.peer.clone())
    }

    /// Go to CLOSED and hand back the socket, if any, for shutdown.
    pub fn close(&mut self) -> Option<Arc<NbssStream>> {
        self.phase = SessionState::Closed;
        self.connected = false;
        self.connecting = false;
        self.stream.take()
    }

    /// Claim the single receive slot.
    pub fn begin_receive(&mut self) -> TransportResult<()> {
        if self.receiving {
            return Err(TransportError::Busy);
        }
        self.receiving = true;
        self.upcall_pending = false;
        Ok(())
    }

    /// Fire the notify target, if registered.
    pub fn raise_upcall(&mut self) {
        if let Some(notify) = &self.notify {
            notify.notify_waiters();
            self.upcall_pending = true;
        }
    }
}

/// Releases the receive slot when dropped.
pub(crate) struct ReceiveGuard<'a> {
    state: &'a SharedState,
}

impl<'a> ReceiveGuard<'a> {
    /// Guard a slot already claimed with [`ConnectionState::begin_receive`].
    pub(crate) fn new(state: &'a SharedState) -> Self {
        Self { state }
    }
}

impl Drop for ReceiveGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).receiving = false;
    }
}
