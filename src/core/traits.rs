//! Core traits for NBSS transports.

use bytes::Bytes;

use crate::transport::{NbAddr, TransportError, TransportResult};

/// A session-oriented transport as seen by the protocol layered on top.
///
/// A caller that can run over several transports selects one and drives it
/// through this interface.
///
/// # Requirements
///
/// - `receive` MUST return payloads in the order the peer sent them
/// - `disconnect` MUST be idempotent
/// - after an error for which `is_fatal` is true, the transport MUST be
///   reconnected before further traffic
#[allow(async_fn_in_trait)]
pub trait SessionTransport {
    /// Establish a session with `peer`.
    async fn connect(&self, peer: NbAddr) -> TransportResult<()>;

    /// Tear down the session, if any.
    async fn disconnect(&self);

    /// Send one application payload.
    async fn send(&self, payload: &[u8]) -> TransportResult<()>;

    /// Receive the next application payload.
    async fn receive(&self) -> TransportResult<Bytes>;

    /// Check if `err` left the transport unusable.
    fn is_fatal(&self, err: &TransportError) -> bool {
        err.is_fatal()
    }
}
