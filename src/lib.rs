//! # NBSS Transport
//!
//! **N**et**B**IOS **S**ession **S**ervice over TCP
//!
//! Carries an application byte stream (typically SMB) over TCP in NBSS
//! frames. It provides:
//!
//! - **Framing**: 4-byte headers with a 17-bit payload length
//! - **Session negotiation**: called/calling names, positive and negative
//!   responses, one RETARGET redirect per connect
//! - **Keepalive filtering**: keepalives never reach the caller
//! - **Adaptive timeouts**: the session reply wait scales with the first
//!   connect round trip
//! - **Busy guard**: one receive in flight per endpoint
//!
//! ## Modules
//!
//! - [`core`]: Constants and the [`SessionTransport`] trait
//! - [`transport`]: Frame codec, frame I/O, connector and handshake
//! - [`endpoint`]: The [`Endpoint`] facade
//!
//! ## Example Usage
//!
//! ```no_run
//! use nbss_transport::prelude::*;
//!
//! # async fn run() -> TransportResult<()> {
//! let endpoint = Endpoint::new(EndpointConfigBuilder::new().build());
//! endpoint.bind(NbName::workstation("client")?)?;
//!
//! let peer = NbAddr::new("192.0.2.10:139".parse().unwrap(), NbName::wildcard_server());
//! endpoint.connect(peer).await?;
//!
//! endpoint.send(b"hello").await?;
//! let reply = endpoint.receive().await?;
//! println!("{} bytes", reply.len());
//!
//! endpoint.teardown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod endpoint;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::SessionTransport;
    pub use crate::endpoint::{Endpoint, EndpointConfig, EndpointConfigBuilder, Param, ParamKind};
    pub use crate::transport::{
        FrameType, NbAddr, NbName, NegativeReason, SessionState, TransportError,
        TransportResult,
    };
}

pub use crate::core::SessionTransport;
pub use endpoint::{Endpoint, EndpointConfig, EndpointConfigBuilder};
pub use transport::{NbAddr, NbName, SessionState, TransportError, TransportResult};
