//! Frame reader: header, then payload in bounded chunks.
//!
//! [`FrameReader`] only knows the wire. [`receive_frame`] adds the endpoint
//! rules on top: one receive in flight, keepalives dropped, and once a
//! session exists only MESSAGE frames reach the caller.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use super::connection::{lock, ReceiveGuard, SessionState, SharedState};
use super::error::{TransportError, TransportResult};
use super::frame::{FrameHeader, FrameType};
use crate::core::constants::{HEADER_SIZE, MAX_FRAME_LEN, RECV_CHUNK_SIZE};

/// One frame as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Decoded header.
    pub header: FrameHeader,
    /// Payload, `None` when the header declares zero length.
    pub payload: Option<Bytes>,
}

/// Events that end a read wait early.
#[derive(Debug)]
pub struct Wakeups {
    /// Flips to `true` when the connection is closed locally.
    pub shutdown: Option<watch::Receiver<bool>>,
    /// Notify target; a wake makes the reader re-check the shutdown flag.
    pub notify: Option<Arc<Notify>>,
}

impl Wakeups {
    /// Wakeups that never fire.
    pub fn none() -> Self {
        Self {
            shutdown: None,
            notify: None,
        }
    }
}

/// Reads frames from the receive side of a stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_len: u32,
    chunk_size: usize,
    io_timeout: Option<Duration>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with default limits and no socket timeout.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_frame_len: MAX_FRAME_LEN,
            chunk_size: RECV_CHUNK_SIZE,
            io_timeout: None,
        }
    }

    /// Reject frames longer than `max` (capped at the wire maximum).
    pub fn with_max_frame_len(mut self, max: u32) -> Self {
        self.max_frame_len = max.min(MAX_FRAME_LEN);
        self
    }

    /// Read bodies at most `size` bytes at a time.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Socket timeout for every wait not covered by a first-wait deadline.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Read one frame.
    ///
    /// `first_wait` bounds the header wait only while no header byte has
    /// arrived; after that, and on every read when it is `None`, the socket
    /// timeout applies. A timeout before any byte is [`TransportError::Timeout`];
    /// a timeout or EOF inside a frame is [`TransportError::TruncatedFrame`].
    pub async fn read_frame(
        &mut self,
        first_wait: Option<Instant>,
        wake: &mut Wakeups,
    ) -> TransportResult<RawFrame> {
        let header = self.read_header(first_wait, wake).await?;
        let payload = self.read_payload(&header, wake).await?;
        Ok(RawFrame { header, payload })
    }

    /// Read the body `header` announces, `None` for an empty one.
    pub(crate) async fn read_payload(
        &mut self,
        header: &FrameHeader,
        wake: &mut Wakeups,
    ) -> TransportResult<Option<Bytes>> {
        match header.length {
            0 => Ok(None),
            len => Ok(Some(self.read_body(len as usize, wake).await?)),
        }
    }

    pub(crate) async fn read_header(
        &mut self,
        first_wait: Option<Instant>,
        wake: &mut Wakeups,
    ) -> TransportResult<FrameHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        let mut got = 0;

        while got < HEADER_SIZE {
            let deadline = match first_wait {
                Some(deadline) if got == 0 => Some(deadline),
                _ => self.io_timeout.map(|t| Instant::now() + t),
            };
            let n = match self.read_some(&mut buf[got..], deadline, wake).await {
                Err(TransportError::Timeout) if got > 0 => {
                    return Err(TransportError::TruncatedFrame);
                }
                result => result?,
            };
            if n == 0 {
                if got > 0 {
                    return Err(TransportError::TruncatedFrame);
                }
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )));
            }
            got += n;
        }

        Ok(FrameHeader::from_bytes(buf, self.max_frame_len)?)
    }

    async fn read_body(&mut self, len: usize, wake: &mut Wakeups) -> TransportResult<Bytes> {
        let mut body = BytesMut::with_capacity(len);

        while body.len() < len {
            let start = body.len();
            let want = (len - start).min(self.chunk_size);
            body.resize(start + want, 0);

            let deadline = self.io_timeout.map(|t| Instant::now() + t);
            let n = match self.read_some(&mut body[start..], deadline, wake).await {
                Ok(0) | Err(TransportError::Timeout) => return Err(TransportError::TruncatedFrame),
                result => result?,
            };
            body.truncate(start + n);
        }

        Ok(body.freeze())
    }

    async fn read_some(
        &mut self,
        buf: &mut [u8],
        deadline: Option<Instant>,
        wake: &mut Wakeups,
    ) -> TransportResult<usize> {
        let Wakeups { shutdown, notify } = wake;

        loop {
            if shutdown.as_mut().is_some_and(|rx| *rx.borrow_and_update()) {
                return Err(TransportError::NotConnected);
            }

            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            let closed = async {
                match shutdown.as_mut() {
                    Some(rx) => rx.changed().await.is_err(),
                    None => std::future::pending().await,
                }
            };
            let upcall = async {
                match notify.as_deref() {
                    Some(notify) => notify.notified().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                result = self.inner.read(buf) => return Ok(result?),
                gone = closed => {
                    if gone {
                        return Err(TransportError::NotConnected);
                    }
                }
                _ = upcall => tracing::trace!("reader woken by notify target"),
                _ = expired => return Err(TransportError::Timeout),
            }
        }
    }
}

/// Receive the next frame the endpoint's current state lets through.
///
/// While the session is being negotiated the first non-keepalive frame is
/// returned whatever its type. Once the session exists only MESSAGE frames
/// are returned; anything else is logged and dropped. `deadline` is the
/// first-reply deadline of a fresh connection and bounds only the first
/// header wait.
pub(crate) async fn receive_frame(
    state: &SharedState,
    deadline: Option<Instant>,
) -> TransportResult<(Option<Bytes>, FrameType)> {
    let (stream, mut wake) = {
        let mut st = lock(state);
        let stream = st.stream.clone().ok_or(TransportError::NotConnected)?;
        st.begin_receive()?;
        let wake = Wakeups {
            shutdown: Some(stream.subscribe()),
            notify: st.notify.clone(),
        };
        (stream, wake)
    };
    let _guard = ReceiveGuard::new(state);

    let mut reader = stream.reader().lock().await;
    let started = Instant::now();
    let mut first_wait = deadline;

    loop {
        let sampling = first_wait.is_some();
        let header = reader.read_header(first_wait.take(), &mut wake).await?;
        if sampling {
            lock(state).timing.on_first_response(started.elapsed());
        }
        let frame = RawFrame {
            payload: reader.read_payload(&header, &mut wake).await?,
            header,
        };

        let frame_type = frame.header.frame_type;
        if frame_type == FrameType::Keepalive {
            match &frame.payload {
                Some(body) => tracing::warn!(len = body.len(), "discarding keepalive body"),
                None => tracing::trace!("keepalive"),
            }
            continue;
        }

        if lock(state).phase != SessionState::Session || frame_type == FrameType::Message {
            return Ok((frame.payload, frame_type));
        }

        tracing::warn!(
            ?frame_type,
            len = frame.header.length,
            "discarding unexpected frame on established session"
        );
    }
}
