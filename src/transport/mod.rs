//! NBSS transport layer.
//!
//! This module carries an application byte stream over TCP in NBSS frames.
//! It provides:
//!
//! - **Frame encoding/decoding**: [`FrameHeader`], [`FrameType`] and the
//!   handshake payloads
//! - **Names**: [`NbName`] label chains and the [`SessionRequest`] body
//! - **Frame I/O**: [`FrameReader`] and [`FrameWriter`] over any tokio stream
//! - **Connector**: [`connect`] with socket setup and connect timing
//! - **Session state**: [`SessionState`] and the per-endpoint state record
//! - **Timeout calibration**: [`TimeoutCalibrator`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Higher-level protocol            │
//! ├─────────────────────────────────────────┤
//! │     Endpoint (connect/send/receive)     │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │  negotiate, frame reader/writer, codec  │
//! ├─────────────────────────────────────────┤
//! │              TCP                        │
//! └─────────────────────────────────────────┘
//! ```

mod connection;
mod error;
mod frame;
mod name;
mod negotiate;
mod reader;
mod socket;
mod timing;
mod writer;

pub use connection::SessionState;
pub use error::*;
pub use frame::*;
pub use name::*;
pub use reader::{FrameReader, RawFrame, Wakeups};
pub use socket::{connect, NbssStream, SocketOptions};
pub use timing::{constants as timing_constants, TimeoutCalibrator};
pub use writer::FrameWriter;

pub(crate) use connection::{lock, ConnectionState, SharedState};
pub(crate) use negotiate::negotiate;
pub(crate) use reader::receive_frame;
pub(crate) use writer::send_frame;
