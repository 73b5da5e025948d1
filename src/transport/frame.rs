//! Frame header encoding and decoding.
//!
//! Every NBSS frame starts with a 4-byte big-endian header:
//!
//! ```text
//! +--------+---------------+-------------------------+
//! | Type   | Reserved (7)  | Length (17)             |
//! | 8 bits | must be zero  | payload bytes following |
//! +--------+---------------+-------------------------+
//! ```

use std::net::{Ipv4Addr, SocketAddrV4};

use thiserror::Error;

use crate::core::constants::{
    FRAME_TYPE_KEEPALIVE, FRAME_TYPE_MESSAGE, FRAME_TYPE_NEGATIVE_RESP, FRAME_TYPE_POSITIVE_RESP,
    FRAME_TYPE_REQUEST, FRAME_TYPE_RETARGET_RESP, HEADER_SIZE, LENGTH_MASK, MAX_FRAME_LEN,
    RESERVED_MASK, RETARGET_PAYLOAD_LEN,
};

/// Frame type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Application payload, valid only once a session exists.
    Message = FRAME_TYPE_MESSAGE,
    /// Session request sent by the caller.
    Request = FRAME_TYPE_REQUEST,
    /// Session accepted.
    PositiveResp = FRAME_TYPE_POSITIVE_RESP,
    /// Session refused.
    NegativeResp = FRAME_TYPE_NEGATIVE_RESP,
    /// Session redirected to another address.
    RetargetResp = FRAME_TYPE_RETARGET_RESP,
    /// Connection keepalive, never surfaced to callers.
    Keepalive = FRAME_TYPE_KEEPALIVE,
}

impl FrameType {
    /// Parse frame type from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            FRAME_TYPE_MESSAGE => Some(Self::Message),
            FRAME_TYPE_REQUEST => Some(Self::Request),
            FRAME_TYPE_POSITIVE_RESP => Some(Self::PositiveResp),
            FRAME_TYPE_NEGATIVE_RESP => Some(Self::NegativeResp),
            FRAME_TYPE_RETARGET_RESP => Some(Self::RetargetResp),
            FRAME_TYPE_KEEPALIVE => Some(Self::Keepalive),
            _ => None,
        }
    }

    /// Convert frame type to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame type.
    pub frame_type: FrameType,
    /// Length of the payload that follows.
    pub length: u32,
}

impl FrameHeader {
    /// Create a new header.
    pub fn new(frame_type: FrameType, length: u32) -> Self {
        Self { frame_type, length }
    }

    /// Serialize header to bytes.
    ///
    /// Fails if `length` does not fit the 17-bit length field.
    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE], FrameError> {
        if self.length > MAX_FRAME_LEN {
            return Err(FrameError::TooLong {
                length: self.length,
                max: MAX_FRAME_LEN,
            });
        }
        let word = (u32::from(self.frame_type.as_byte()) << 24) | self.length;
        Ok(word.to_be_bytes())
    }

    /// Parse and validate a header against `max_len`.
    ///
    /// Reserved bits are checked first, so a header with any of them set is
    /// rejected whatever length it declares.
    pub fn from_bytes(bytes: [u8; HEADER_SIZE], max_len: u32) -> Result<Self, FrameError> {
        let word = u32::from_be_bytes(bytes);

        if word & RESERVED_MASK != 0 {
            return Err(FrameError::ReservedBits(word));
        }

        let length = word & LENGTH_MASK;
        if length > max_len {
            return Err(FrameError::TooLong {
                length,
                max: max_len,
            });
        }

        let frame_type = FrameType::from_byte(bytes[0]).ok_or(FrameError::InvalidType(bytes[0]))?;

        Ok(Self { frame_type, length })
    }
}

/// Reason carried in a NEGATIVE_RESP body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeReason {
    /// Not listening on the called name.
    NotListeningCalled,
    /// Not listening for the calling name.
    NotListeningCalling,
    /// Called name not present.
    CalledNotPresent,
    /// Called name present, but insufficient resources.
    InsufficientResources,
    /// Unspecified error (also used for an empty body).
    Unspecified,
    /// Code this crate does not know.
    Other(u8),
}

impl NegativeReason {
    /// Decode the reason from a NEGATIVE_RESP body.
    pub fn from_payload(payload: &[u8]) -> Self {
        match payload.first() {
            None | Some(0x8F) => Self::Unspecified,
            Some(0x80) => Self::NotListeningCalled,
            Some(0x81) => Self::NotListeningCalling,
            Some(0x82) => Self::CalledNotPresent,
            Some(0x83) => Self::InsufficientResources,
            Some(&code) => Self::Other(code),
        }
    }

    /// Wire code of this reason.
    pub fn code(self) -> u8 {
        match self {
            Self::NotListeningCalled => 0x80,
            Self::NotListeningCalling => 0x81,
            Self::CalledNotPresent => 0x82,
            Self::InsufficientResources => 0x83,
            Self::Unspecified => 0x8F,
            Self::Other(code) => code,
        }
    }
}

impl std::fmt::Display for NegativeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotListeningCalled => f.write_str("not listening on called name"),
            Self::NotListeningCalling => f.write_str("not listening for calling name"),
            Self::CalledNotPresent => f.write_str("called name not present"),
            Self::InsufficientResources => f.write_str("insufficient resources"),
            Self::Unspecified => f.write_str("unspecified error"),
            Self::Other(code) => write!(f, "error code 0x{code:02x}"),
        }
    }
}

/// Parse a RETARGET_RESP body into the new target address.
pub fn parse_retarget(payload: &[u8]) -> Result<SocketAddrV4, FrameError> {
    if payload.len() != RETARGET_PAYLOAD_LEN {
        return Err(FrameError::BadRetargetLength(payload.len()));
    }
    let ip = Ipv4Addr::new(payload[0], payload[1], payload[2], payload[3]);
    let port = u16::from_be_bytes([payload[4], payload[5]]);
    Ok(SocketAddrV4::new(ip, port))
}

/// Build a RETARGET_RESP body.
pub fn retarget_payload(addr: SocketAddrV4) -> [u8; RETARGET_PAYLOAD_LEN] {
    let mut buf = [0u8; RETARGET_PAYLOAD_LEN];
    buf[..4].copy_from_slice(&addr.ip().octets());
    buf[4..].copy_from_slice(&addr.port().to_be_bytes());
    buf
}

/// Errors that can occur during frame parsing.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Reserved header bits set.
    #[error("invalid header 0x{0:08x} (reserved bits must be 0)")]
    ReservedBits(u32),

    /// Declared length exceeds the allowed maximum.
    #[error("frame length {length} exceeds maximum {max}")]
    TooLong {
        /// Declared length.
        length: u32,
        /// Allowed maximum.
        max: u32,
    },

    /// Invalid frame type.
    #[error("invalid frame type: 0x{0:02x}")]
    InvalidType(u8),

    /// RETARGET_RESP body of the wrong size.
    #[error("retarget payload must be 6 bytes, got {0}")]
    BadRetargetLength(usize),
}
