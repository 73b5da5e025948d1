//! Frame writer: one header-prefixed write per frame.

use std::io;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::connection::{lock, SessionState, SharedState};
use super::error::{TransportError, TransportResult};
use super::frame::{FrameHeader, FrameType};
use crate::core::constants::{HEADER_SIZE, MAX_FRAME_LEN};

/// Writes frames to the send side of a stream.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    max_frame_len: u32,
    io_timeout: Option<Duration>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a writer with the default frame limit and no timeout.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            max_frame_len: MAX_FRAME_LEN,
            io_timeout: None,
        }
    }

    /// Limit payloads to `max` bytes (capped at the wire maximum).
    pub fn with_max_frame_len(mut self, max: u32) -> Self {
        self.max_frame_len = max.min(MAX_FRAME_LEN);
        self
    }

    /// Bound each frame write by `timeout`.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Write one frame of `frame_type` carrying `payload`.
    ///
    /// Header and payload go out in a single write. A write that cannot
    /// complete is a [`TransportError::ShortWrite`]; the stream framing is
    /// lost at that point.
    pub async fn write_frame(&mut self, frame_type: FrameType, payload: &[u8]) -> TransportResult<()> {
        if payload.len() > self.max_frame_len as usize {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_frame_len,
            });
        }
        let header = FrameHeader::new(frame_type, payload.len() as u32).to_bytes()?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_slice(&header);
        buf.put_slice(payload);

        let io_timeout = self.io_timeout;
        let inner = &mut self.inner;
        let write = async {
            inner.write_all(&buf).await?;
            inner.flush().await
        };
        let result = match io_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result,
                Err(_) => return Err(TransportError::ShortWrite),
            },
            None => write.await,
        };

        result.map_err(|e| match e.kind() {
            io::ErrorKind::WriteZero => TransportError::ShortWrite,
            _ => TransportError::Io(e),
        })
    }

    /// Shut down the send direction.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

/// Send `payload` as a MESSAGE frame on the endpoint's session.
pub(crate) async fn send_frame(state: &SharedState, payload: &[u8]) -> TransportResult<()> {
    let stream = {
        let st = lock(state);
        if st.phase != SessionState::Session {
            return Err(TransportError::NotConnected);
        }
        st.stream.clone().ok_or(TransportError::NotConnected)?
    };

    let mut writer = stream.writer().lock().await;
    writer.write_frame(FrameType::Message, payload).await?;
    tracing::trace!(len = payload.len(), "sent message frame");
    Ok(())
}
