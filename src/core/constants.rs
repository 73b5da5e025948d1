//! Protocol constants for the NetBIOS Session Service.
//!
//! These values are fixed by the wire format and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// FRAME HEADER
// =============================================================================

/// Size of the frame header on the wire.
pub const HEADER_SIZE: usize = 4;

/// Session message (application payload).
pub const FRAME_TYPE_MESSAGE: u8 = 0x00;

/// Session request.
pub const FRAME_TYPE_REQUEST: u8 = 0x01;

/// Positive session response.
pub const FRAME_TYPE_POSITIVE_RESP: u8 = 0x02;

/// Negative session response.
pub const FRAME_TYPE_NEGATIVE_RESP: u8 = 0x03;

/// Retarget session response.
pub const FRAME_TYPE_RETARGET_RESP: u8 = 0x04;

/// Session keepalive.
pub const FRAME_TYPE_KEEPALIVE: u8 = 0x85;

/// Header bits that must be zero (bits 23..17).
pub const RESERVED_MASK: u32 = 0x00FE_0000;

/// Header bits carrying the payload length (bits 16..0, incl. the E bit).
pub const LENGTH_MASK: u32 = 0x0001_FFFF;

/// Largest payload the 17-bit length field can describe.
pub const MAX_FRAME_LEN: u32 = LENGTH_MASK;

// =============================================================================
// HANDSHAKE PAYLOADS
// =============================================================================

/// Reserved field leading a REQUEST body.
pub const REQUEST_RESERVED_LEN: usize = 4;

/// RETARGET_RESP body: IPv4 address (4) + port (2).
pub const RETARGET_PAYLOAD_LEN: usize = 6;

/// Number of reconnects a single connect may perform after a retarget.
pub const MAX_RETARGETS: u32 = 1;

// =============================================================================
// NETBIOS NAMES (RFC 1001 14.1)
// =============================================================================

/// Maximum name length, excluding the suffix byte.
pub const NB_NAME_LEN: usize = 15;

/// First-level encoded length of the 16-byte name.
pub const NB_ENCODED_NAME_LEN: usize = 32;

/// Maximum length of one label in the chain.
pub const NB_MAX_LABEL_LEN: usize = 63;

/// Maximum length of a full label chain including the terminator.
pub const NB_MAX_CHAIN_LEN: usize = 255;

/// Suffix used for file server names.
pub const NB_SUFFIX_SERVER: u8 = 0x20;

/// Suffix used for workstation names.
pub const NB_SUFFIX_WORKSTATION: u8 = 0x00;

/// Wildcard server name accepted by most SMB servers.
pub const NB_SERVER_WILDCARD: &str = "*SMBSERVER";

// =============================================================================
// TIMING
// =============================================================================

/// Default wait for the first handshake reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Calibrated timeout is this many times the first connect RTT.
pub const RTT_TIMEOUT_MULTIPLIER: u32 = 4;

/// Default supervisory timeout for reads and writes on a live socket.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// One slice of the wait for connect completion.
pub const CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Overall bound on a connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// SOCKET
// =============================================================================

/// Default SO_SNDBUF.
pub const DEFAULT_SEND_BUFFER_SIZE: u32 = 64 * 1024;

/// Default SO_RCVBUF.
pub const DEFAULT_RECV_BUFFER_SIZE: u32 = 64 * 1024;

/// Upper bound of a single body read.
pub const RECV_CHUNK_SIZE: usize = 8 * 1024;
