//! NetBIOS names and the session request body.
//!
//! A name travels as a chain of length-prefixed labels closed by a zero
//! label. The first label is the 16-byte name (15 characters padded with
//! spaces, plus a suffix byte) in first-level encoding: each byte becomes two
//! characters `'A' + nibble`. Any further labels are the dotted scope.

use std::fmt;
use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::core::constants::{
    NB_ENCODED_NAME_LEN, NB_MAX_CHAIN_LEN, NB_MAX_LABEL_LEN, NB_NAME_LEN, NB_SERVER_WILDCARD,
    NB_SUFFIX_SERVER, NB_SUFFIX_WORKSTATION, REQUEST_RESERVED_LEN,
};

/// Errors from building or decoding names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Name is empty.
    #[error("empty name")]
    Empty,

    /// Name exceeds 15 bytes.
    #[error("name is {0} bytes, at most 15 allowed")]
    TooLong(usize),

    /// Name contains a byte that cannot be carried.
    #[error("invalid character 0x{0:02x} in name")]
    InvalidChar(u8),

    /// Scope label is empty or longer than 63 bytes.
    #[error("invalid scope label length {0}")]
    BadLabel(usize),

    /// Encoded chain exceeds 255 bytes.
    #[error("encoded name is {0} bytes, at most 255 allowed")]
    ChainTooLong(usize),

    /// First label is not a 32-character encoded name.
    #[error("first label must be 32 bytes, got {0}")]
    BadNameLabel(usize),

    /// Character outside `'A'..='P'` in the encoded name.
    #[error("invalid half-byte encoding 0x{0:02x}")]
    BadEncoding(u8),

    /// Input ended inside the label chain.
    #[error("truncated name")]
    Truncated,

    /// Reserved field of a request body is nonzero.
    #[error("reserved field must be zero")]
    Reserved,

    /// Bytes left over after the calling name.
    #[error("{0} trailing bytes after names")]
    Trailing(usize),
}

/// A NetBIOS name with its suffix byte and optional scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NbName {
    name: String,
    suffix: u8,
    scope: Option<String>,
}

impl NbName {
    /// Create a name. The name is upper-cased and trailing spaces dropped.
    pub fn new(name: &str, suffix: u8) -> Result<Self, NameError> {
        let name = name.trim_end_matches(' ').to_ascii_uppercase();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.len() > NB_NAME_LEN {
            return Err(NameError::TooLong(name.len()));
        }
        if let Some(&b) = name.as_bytes().iter().find(|b| !b.is_ascii() || b.is_ascii_control()) {
            return Err(NameError::InvalidChar(b));
        }
        Ok(Self {
            name,
            suffix,
            scope: None,
        })
    }

    /// File server name (suffix 0x20).
    pub fn server(name: &str) -> Result<Self, NameError> {
        Self::new(name, NB_SUFFIX_SERVER)
    }

    /// Workstation name (suffix 0x00).
    pub fn workstation(name: &str) -> Result<Self, NameError> {
        Self::new(name, NB_SUFFIX_WORKSTATION)
    }

    /// The `*SMBSERVER` wildcard.
    pub fn wildcard_server() -> Self {
        Self {
            name: NB_SERVER_WILDCARD.to_string(),
            suffix: NB_SUFFIX_SERVER,
            scope: None,
        }
    }

    /// Attach a dotted scope such as `corp.example`.
    pub fn with_scope(mut self, scope: &str) -> Result<Self, NameError> {
        if scope.is_empty() {
            self.scope = None;
            return Ok(self);
        }
        for label in scope.split('.') {
            if label.is_empty() || label.len() > NB_MAX_LABEL_LEN {
                return Err(NameError::BadLabel(label.len()));
            }
        }
        let chain = 1 + NB_ENCODED_NAME_LEN + scope.len() + 1 + 1;
        if chain > NB_MAX_CHAIN_LEN {
            return Err(NameError::ChainTooLong(chain));
        }
        self.scope = Some(scope.to_string());
        Ok(self)
    }

    /// Name without padding.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Suffix byte.
    pub fn suffix(&self) -> u8 {
        self.suffix
    }

    /// Scope, if any.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Length of the encoded label chain.
    pub fn encoded_len(&self) -> usize {
        let scope = self.scope.as_ref().map_or(0, |s| s.len() + 1);
        1 + NB_ENCODED_NAME_LEN + scope + 1
    }

    /// Append the encoded label chain to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u8(NB_ENCODED_NAME_LEN as u8);

        let mut raw = [b' '; NB_NAME_LEN + 1];
        raw[..self.name.len()].copy_from_slice(self.name.as_bytes());
        raw[NB_NAME_LEN] = self.suffix;
        for b in raw {
            buf.put_u8(b'A' + (b >> 4));
            buf.put_u8(b'A' + (b & 0x0F));
        }

        if let Some(scope) = &self.scope {
            for label in scope.split('.') {
                buf.put_u8(label.len() as u8);
                buf.put_slice(label.as_bytes());
            }
        }
        buf.put_u8(0);
    }

    /// Decode one label chain from the front of `data`.
    ///
    /// Returns the name and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), NameError> {
        let first = *data.first().ok_or(NameError::Truncated)? as usize;
        if first != NB_ENCODED_NAME_LEN {
            return Err(NameError::BadNameLabel(first));
        }
        let encoded = data.get(1..1 + first).ok_or(NameError::Truncated)?;

        let mut raw = [0u8; NB_NAME_LEN + 1];
        for (i, pair) in encoded.chunks_exact(2).enumerate() {
            let hi = half_byte(pair[0])?;
            let lo = half_byte(pair[1])?;
            raw[i] = (hi << 4) | lo;
        }

        let mut pos = 1 + first;
        let mut labels = Vec::new();
        loop {
            let len = *data.get(pos).ok_or(NameError::Truncated)? as usize;
            pos += 1;
            if len == 0 {
                break;
            }
            if len > NB_MAX_LABEL_LEN {
                return Err(NameError::BadLabel(len));
            }
            let label = data.get(pos..pos + len).ok_or(NameError::Truncated)?;
            labels.push(String::from_utf8_lossy(label).into_owned());
            pos += len;
        }
        if pos > NB_MAX_CHAIN_LEN {
            return Err(NameError::ChainTooLong(pos));
        }

        let name = std::str::from_utf8(&raw[..NB_NAME_LEN])
            .map_err(|_| NameError::InvalidChar(raw[0]))?;
        let name = Self::new(name, raw[NB_NAME_LEN])?;
        let name = name.with_scope(&labels.join("."))?;
        Ok((name, pos))
    }
}

fn half_byte(c: u8) -> Result<u8, NameError> {
    match c {
        b'A'..=b'P' => Ok(c - b'A'),
        _ => Err(NameError::BadEncoding(c)),
    }
}

impl fmt::Display for NbName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{:02x}>", self.name, self.suffix)?;
        if let Some(scope) = &self.scope {
            write!(f, ".{scope}")?;
        }
        Ok(())
    }
}

/// Peer identity: where to connect and which name to call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NbAddr {
    /// Transport address.
    pub addr: SocketAddr,
    /// Called name.
    pub name: NbName,
}

impl NbAddr {
    /// Create a new peer address.
    pub fn new(addr: SocketAddr, name: NbName) -> Self {
        Self { addr, name }
    }
}

impl fmt::Display for NbAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.addr)
    }
}

/// Body of a REQUEST frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Name of the peer being called.
    pub called: NbName,
    /// Name of the local endpoint.
    pub calling: NbName,
}

impl SessionRequest {
    /// Create a request body.
    pub fn new(called: NbName, calling: NbName) -> Self {
        Self { called, calling }
    }

    /// Encode as `reserved(4) <called> <calling>`.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            REQUEST_RESERVED_LEN + self.called.encoded_len() + self.calling.encoded_len(),
        );
        buf.put_u32(0);
        self.called.encode(&mut buf);
        self.calling.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a request body.
    pub fn decode(data: &[u8]) -> Result<Self, NameError> {
        let reserved = data.get(..REQUEST_RESERVED_LEN).ok_or(NameError::Truncated)?;
        if reserved.iter().any(|&b| b != 0) {
            return Err(NameError::Reserved);
        }
        let rest = &data[REQUEST_RESERVED_LEN..];
        let (called, used) = NbName::decode(rest)?;
        let rest = &rest[used..];
        let (calling, used) = NbName::decode(rest)?;
        if used != rest.len() {
            return Err(NameError::Trailing(rest.len() - used));
        }
        Ok(Self { called, calling })
    }
}
