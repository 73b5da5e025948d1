//! Transport layer error types.
//!
//! Errors are returned typed to the immediate caller. [`TransportError::is_fatal`]
//! tells the caller whether the endpoint must be reconnected before reuse.

use std::io;
use std::net::SocketAddrV4;

use thiserror::Error;

use super::frame::{FrameError, FrameType, NegativeReason};
use super::name::NameError;

/// `ENETRESET` has no `io::ErrorKind` of its own.
#[cfg(any(target_os = "linux", target_os = "android"))]
const ENETRESET: i32 = 102;
#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
const ENETRESET: i32 = 52;
#[cfg(windows)]
const ENETRESET: i32 = 10052;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket setup or I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Socket creation, option or connect failure.
    #[error("connect failed: {0}")]
    Setup(#[source] io::Error),

    /// Malformed frame header.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Name could not be encoded or decoded.
    #[error("name error: {0}")]
    Name(#[from] NameError),

    /// Handshake reply of a type that makes no sense here.
    #[error("unexpected {0:?} frame")]
    UnexpectedFrame(FrameType),

    /// Peer refused the session.
    #[error("session rejected: {0}")]
    Rejected(NegativeReason),

    /// No reply to the session request within the endpoint timeout.
    #[error("no response to session request")]
    NoResponse,

    /// Socket timeout elapsed before a frame started.
    #[error("operation timed out")]
    Timeout,

    /// Connect did not complete within the configured bound.
    #[error("connect timed out")]
    ConnectTimeout,

    /// Another receive is already in flight on this endpoint.
    #[error("receive already in progress")]
    Busy,

    /// Endpoint has no session.
    #[error("not connected")]
    NotConnected,

    /// Connect called on an endpoint that is not closed.
    #[error("already connected")]
    AlreadyConnected,

    /// Local name already bound.
    #[error("local name already bound")]
    AlreadyBound,

    /// Connect called before a local name was bound.
    #[error("local name not bound")]
    NotBound,

    /// The single reconnect after a retarget failed.
    #[error("retarget to {addr} failed: {source}")]
    Retarget {
        /// Address the peer redirected us to.
        addr: SocketAddrV4,
        /// Failure of the reconnect or of its negotiation.
        #[source]
        source: Box<TransportError>,
    },

    /// Peer answered the retargeted request with another retarget.
    #[error("repeated retarget")]
    RepeatedRetarget,

    /// Connection lost in the middle of a frame.
    #[error("connection lost mid-frame")]
    TruncatedFrame,

    /// Stream accepted fewer bytes than the frame holds.
    #[error("short write")]
    ShortWrite,

    /// Parameter value out of range.
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    /// Payload does not fit in one frame.
    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
        /// Allowed maximum.
        max: u32,
    },
}

impl TransportError {
    /// Check if this error leaves the endpoint unusable until it reconnects.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Io(e) => is_fatal_io(e),
            TransportError::Setup(_) | TransportError::ConnectTimeout => true,
            TransportError::NotConnected
            | TransportError::TruncatedFrame
            | TransportError::ShortWrite => true,
            TransportError::Retarget { .. } => true,
            _ => self.is_protocol_error(),
        }
    }

    /// Check if this error is a peer protocol violation.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            TransportError::Frame(_)
                | TransportError::UnexpectedFrame(_)
                | TransportError::RepeatedRetarget
        )
    }

    /// Check if this error is a timeout of any kind.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::NoResponse
            | TransportError::Timeout
            | TransportError::ConnectTimeout => true,
            TransportError::Io(e) | TransportError::Setup(e) => {
                e.kind() == io::ErrorKind::TimedOut
            }
            TransportError::Retarget { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Classify an I/O error: not-connected, reset, broken pipe, network reset.
pub fn is_fatal_io(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    ) || e.raw_os_error() == Some(ENETRESET)
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
