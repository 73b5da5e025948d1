//! TCP connector and the per-connection socket wrapper.
//!
//! [`connect`] opens and configures a stream socket, waits for the connect
//! to finish and reports how long it took. The resulting [`NbssStream`] is
//! split so one reader and one writer can use it at the same time.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpSocket;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use super::error::{TransportError, TransportResult};
use super::reader::FrameReader;
use super::writer::FrameWriter;
use crate::core::constants::{
    CONNECT_POLL_INTERVAL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT, DEFAULT_RECV_BUFFER_SIZE,
    DEFAULT_SEND_BUFFER_SIZE, MAX_FRAME_LEN, RECV_CHUNK_SIZE,
};

/// Socket setup applied by [`connect`].
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// SO_SNDBUF.
    pub send_buffer_size: u32,
    /// SO_RCVBUF.
    pub recv_buffer_size: u32,
    /// SO_KEEPALIVE.
    pub keepalive: bool,
    /// TCP_NODELAY.
    pub nodelay: bool,
    /// Supervisory timeout for each read wait and each frame write.
    pub io_timeout: Option<Duration>,
    /// Length of one connect wait slice.
    pub connect_poll_interval: Duration,
    /// Give up on a connect after this long.
    pub connect_timeout: Option<Duration>,
    /// Largest frame accepted or sent.
    pub max_frame_len: u32,
    /// Upper bound of a single body read.
    pub recv_chunk_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketOptions {
    /// Default socket setup.
    pub fn new() -> Self {
        Self {
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            keepalive: true,
            nodelay: true,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            connect_poll_interval: CONNECT_POLL_INTERVAL,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            max_frame_len: MAX_FRAME_LEN,
            recv_chunk_size: RECV_CHUNK_SIZE,
        }
    }
}

/// A connected socket, split for concurrent send and receive.
#[derive(Debug)]
pub struct NbssStream {
    reader: Mutex<FrameReader<OwnedReadHalf>>,
    writer: Mutex<FrameWriter<OwnedWriteHalf>>,
    shutdown: watch::Sender<bool>,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl NbssStream {
    /// Receive side.
    pub(crate) fn reader(&self) -> &Mutex<FrameReader<OwnedReadHalf>> {
        &self.reader
    }

    /// Send side.
    pub(crate) fn writer(&self) -> &Mutex<FrameWriter<OwnedWriteHalf>> {
        &self.writer
    }

    /// Watch the local shutdown flag.
    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Close the connection.
    ///
    /// Wakes a blocked reader with `NotConnected` and shuts down the send
    /// direction unless a send is in flight; the socket itself is released
    /// when the last handle drops.
    pub(crate) async fn close(&self) {
        self.shutdown.send_replace(true);
        if let Ok(mut writer) = self.writer.try_lock()
            && let Err(e) = writer.shutdown().await
        {
            tracing::debug!(peer = %self.peer_addr, error = %e, "shutdown failed");
        }
    }
}

/// Open a stream socket to `addr`, configured by `opts`.
///
/// Waits for the connect in slices of `connect_poll_interval` until it
/// completes, fails, or `connect_timeout` runs out. The partially set up
/// socket is dropped on any failure. Returns the stream and the time the
/// connect took.
pub async fn connect(addr: SocketAddr, opts: &SocketOptions) -> TransportResult<(NbssStream, Duration)> {
    let started = Instant::now();

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(TransportError::Setup)?;
    let configured = (|| {
        socket.set_send_buffer_size(opts.send_buffer_size)?;
        socket.set_recv_buffer_size(opts.recv_buffer_size)?;
        socket.set_keepalive(opts.keepalive)
    })();
    if let Err(e) = configured {
        tracing::debug!(%addr, error = %e, "socket setup failed");
        return Err(TransportError::Setup(e));
    }

    let mut connecting = std::pin::pin!(socket.connect(addr));
    let stream = loop {
        let slice = match opts.connect_timeout {
            Some(limit) => {
                let left = limit.saturating_sub(started.elapsed());
                if left.is_zero() {
                    tracing::debug!(%addr, ?limit, "connect timed out");
                    return Err(TransportError::ConnectTimeout);
                }
                left.min(opts.connect_poll_interval)
            }
            None => opts.connect_poll_interval,
        };

        match tokio::time::timeout(slice, &mut connecting).await {
            Ok(Ok(stream)) => break stream,
            Ok(Err(e)) => {
                tracing::debug!(%addr, error = %e, "connect failed");
                return Err(TransportError::Setup(e));
            }
            Err(_) => tracing::trace!(%addr, waited = ?started.elapsed(), "connect in progress"),
        }
    };

    let rtt = started.elapsed();
    if let Err(e) = stream.set_nodelay(opts.nodelay) {
        tracing::debug!(%addr, error = %e, "socket setup failed");
        return Err(TransportError::Setup(e));
    }
    let peer_addr = stream.peer_addr().map_err(TransportError::Setup)?;
    let local_addr = stream.local_addr().map_err(TransportError::Setup)?;
    tracing::debug!(%peer_addr, %local_addr, ?rtt, "connected");

    let (read_half, write_half) = stream.into_split();
    let reader = FrameReader::new(read_half)
        .with_max_frame_len(opts.max_frame_len)
        .with_chunk_size(opts.recv_chunk_size)
        .with_io_timeout(opts.io_timeout);
    let writer = FrameWriter::new(write_half)
        .with_max_frame_len(opts.max_frame_len)
        .with_io_timeout(opts.io_timeout);
    let (shutdown, _) = watch::channel(false);

    Ok((
        NbssStream {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            shutdown,
            peer_addr,
            local_addr,
        },
        rtt,
    ))
}
