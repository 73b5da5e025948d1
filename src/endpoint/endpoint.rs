//! The endpoint facade.
//!
//! An [`Endpoint`] owns one NBSS connection at a time. All operations take
//! `&self`; share it behind an `Arc` to send and receive from different tasks.

use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;

use super::config::{EndpointConfig, Param, ParamKind};
use crate::core::SessionTransport;
use crate::transport::{
    self, lock, negotiate, receive_frame, send_frame, ConnectionState, NbAddr, NbName,
    SessionState, SharedState, TimeoutCalibrator, TransportError, TransportResult,
};

/// One NBSS session endpoint.
#[derive(Debug)]
pub struct Endpoint {
    state: SharedState,
}

impl Endpoint {
    /// Create a closed, unbound endpoint.
    pub fn new(config: EndpointConfig) -> Self {
        let mut st = ConnectionState::new(config.socket, TimeoutCalibrator::new(config.timeout));
        st.notify = config.notify;
        Self {
            state: Mutex::new(st),
        }
    }

    /// Disconnect and release the endpoint.
    pub async fn teardown(self) {
        self.disconnect().await;
        tracing::trace!("endpoint torn down");
    }

    /// Bind the local name used as the calling name of every session request.
    ///
    /// Must precede [`connect`](Self::connect) and may only be done once.
    pub fn bind(&self, name: NbName) -> TransportResult<()> {
        lock(&self.state).bind(name.clone())?;
        tracing::debug!(%name, "local name bound");
        Ok(())
    }

    /// Connect to `peer` and negotiate a session.
    ///
    /// Follows at most one RETARGET. On failure the endpoint is CLOSED again.
    pub async fn connect(&self, peer: NbAddr) -> TransportResult<()> {
        let (attempt, opts) = {
            let mut st = lock(&self.state);
            let attempt = st.begin_connect()?;
            (attempt, st.options.clone())
        };
        tracing::debug!(%peer, "connecting");

        match self.establish(peer, &opts, attempt).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let stream = {
                    let mut st = lock(&self.state);
                    if st.owns_connect(attempt) {
                        let stream = st.close();
                        st.raise_upcall();
                        stream
                    } else {
                        None
                    }
                };
                if let Some(stream) = stream {
                    stream.close().await;
                }
                tracing::debug!(error = %e, "connect failed");
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        peer: NbAddr,
        opts: &transport::SocketOptions,
        attempt: u64,
    ) -> TransportResult<()> {
        let (stream, rtt) = transport::connect(peer.addr, opts).await?;
        {
            let mut st = lock(&self.state);
            if !st.owns_connect(attempt) {
                // disconnected while the socket was coming up
                return Err(TransportError::NotConnected);
            }
            let timeout = st.timing.on_connect(rtt);
            tracing::debug!(?rtt, ?timeout, "connected");
            st.attach(stream, peer);
        }
        negotiate(&self.state, attempt).await
    }

    /// Tear down the session. Safe to call in any state.
    ///
    /// A receive blocked on this endpoint wakes with
    /// [`TransportError::NotConnected`].
    pub async fn disconnect(&self) {
        let stream = {
            let mut st = lock(&self.state);
            let was_open = st.phase != SessionState::Closed || st.connecting;
            let stream = st.close();
            if was_open {
                st.raise_upcall();
            }
            stream
        };
        if let Some(stream) = stream {
            stream.close().await;
            tracing::debug!("disconnected");
        }
    }

    /// Send one payload as a MESSAGE frame.
    pub async fn send(&self, payload: &[u8]) -> TransportResult<()> {
        let generation = lock(&self.state).generation;
        let result = send_frame(&self.state, payload).await;
        if let Err(e) = &result
            && e.is_fatal()
        {
            self.fail(generation, e).await;
        }
        result
    }

    /// Receive the next MESSAGE payload.
    ///
    /// Keepalives and stray session frames are skipped. Only one receive may
    /// be in flight; a second one fails with [`TransportError::Busy`].
    pub async fn receive(&self) -> TransportResult<Bytes> {
        let generation = {
            let st = lock(&self.state);
            if st.phase != SessionState::Session {
                return Err(TransportError::NotConnected);
            }
            st.generation
        };

        match receive_frame(&self.state, None).await {
            Ok((payload, _)) => Ok(payload.unwrap_or_default()),
            Err(e) => {
                if e.is_fatal() {
                    self.fail(generation, &e).await;
                }
                Err(e)
            }
        }
    }

    /// Close the connection a fatal error was seen on, unless it was already
    /// replaced.
    async fn fail(&self, generation: u64, err: &TransportError) {
        let stream = {
            let mut st = lock(&self.state);
            if st.generation != generation || st.phase == SessionState::Closed {
                return;
            }
            let stream = st.close();
            st.raise_upcall();
            stream
        };
        tracing::debug!(error = %err, "closing endpoint after fatal error");
        if let Some(stream) = stream {
            stream.close().await;
        }
    }

    /// Read a parameter.
    pub fn param(&self, kind: ParamKind) -> Param {
        let st = lock(&self.state);
        match kind {
            ParamKind::SendBufferSize => Param::SendBufferSize(st.options.send_buffer_size),
            ParamKind::RecvBufferSize => Param::RecvBufferSize(st.options.recv_buffer_size),
            ParamKind::Timeout => Param::Timeout(st.timing.timeout()),
            ParamKind::NotifyTarget => Param::NotifyTarget(st.notify.clone()),
        }
    }

    /// Change a parameter.
    ///
    /// Buffer sizes apply from the next connect. A new timeout replaces any
    /// calibrated value.
    pub fn set_param(&self, param: Param) -> TransportResult<()> {
        let mut st = lock(&self.state);
        match param {
            Param::SendBufferSize(0) | Param::RecvBufferSize(0) => {
                return Err(TransportError::InvalidParam("buffer size must be non-zero"));
            }
            Param::Timeout(t) if t.is_zero() => {
                return Err(TransportError::InvalidParam("timeout must be non-zero"));
            }
            Param::SendBufferSize(size) => st.options.send_buffer_size = size,
            Param::RecvBufferSize(size) => st.options.recv_buffer_size = size,
            Param::Timeout(t) => st.timing.reset(t),
            Param::NotifyTarget(notify) => st.notify = notify,
        }
        Ok(())
    }

    /// Check if `err` left the endpoint closed.
    pub fn is_fatal(err: &TransportError) -> bool {
        err.is_fatal()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        lock(&self.state).phase
    }

    /// Check if a session is established.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// Peer of the current or last connection, after any retarget.
    pub fn peer(&self) -> Option<NbAddr> {
        lock(&self.state).peer.clone()
    }

    /// Bound local name.
    pub fn local_name(&self) -> Option<NbName> {
        lock(&self.state).local_name.clone()
    }

    /// Session reply wait currently in force.
    pub fn timeout(&self) -> Duration {
        lock(&self.state).timing.timeout()
    }

    /// Round trip of the first connect, once measured.
    pub fn connect_rtt(&self) -> Option<Duration> {
        lock(&self.state).timing.connect_rtt()
    }

    /// Latency of the last session reply.
    pub fn first_response_latency(&self) -> Option<Duration> {
        lock(&self.state).timing.first_response()
    }

    /// Reconnects the last connect made after a retarget.
    pub fn reconnects(&self) -> u32 {
        lock(&self.state).reconnects
    }

    /// Check if the notify target fired since the last receive.
    pub fn has_pending_upcall(&self) -> bool {
        lock(&self.state).upcall_pending
    }

    /// Clear and return the pending upcall flag.
    pub fn take_pending_upcall(&self) -> bool {
        std::mem::take(&mut lock(&self.state).upcall_pending)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}

impl SessionTransport for Endpoint {
    async fn connect(&self, peer: NbAddr) -> TransportResult<()> {
        Endpoint::connect(self, peer).await
    }

    async fn disconnect(&self) {
        Endpoint::disconnect(self).await
    }

    async fn send(&self, payload: &[u8]) -> TransportResult<()> {
        Endpoint::send(self, payload).await
    }

    async fn receive(&self) -> TransportResult<Bytes> {
        Endpoint::receive(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointConfigBuilder;
    use crate::transport::{
        retarget_payload, FrameReader, FrameType, FrameWriter, NegativeReason, SessionRequest,
        Wakeups,
    };
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::TcpListener;
    use tokio::sync::Notify;

    type PeerReader = FrameReader<OwnedReadHalf>;
    type PeerWriter = FrameWriter<OwnedWriteHalf>;

    async fn listen() -> (TcpListener, SocketAddrV4) {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
    }

    /// Accept one connection and read its session request.
    async fn accept_request(listener: &TcpListener) -> (PeerReader, PeerWriter, SessionRequest) {
        let (stream, _) = listener.accept().await.unwrap();
        let (rd, wr) = stream.into_split();
        let mut reader = FrameReader::new(rd);
        let frame = reader.read_frame(None, &mut Wakeups::none()).await.unwrap();
        assert_eq!(frame.header.frame_type, FrameType::Request);
        let request = SessionRequest::decode(&frame.payload.unwrap()).unwrap();
        (reader, FrameWriter::new(wr), request)
    }

    fn bound_endpoint(config: EndpointConfig) -> Endpoint {
        let ep = Endpoint::new(config);
        ep.bind(NbName::workstation("client").unwrap()).unwrap();
        ep
    }

    fn files_at(addr: SocketAddrV4) -> NbAddr {
        NbAddr::new(SocketAddr::V4(addr), NbName::server("files").unwrap())
    }

    #[tokio::test]
    async fn test_session_send_receive() {
        let (listener, addr) = listen().await;
        let peer = tokio::spawn(async move {
            let (mut reader, mut writer, request) = accept_request(&listener).await;
            assert_eq!(request.called, NbName::server("files").unwrap());
            assert_eq!(request.calling, NbName::workstation("client").unwrap());
            writer.write_frame(FrameType::PositiveResp, &[]).await.unwrap();

            let frame = reader.read_frame(None, &mut Wakeups::none()).await.unwrap();
            assert_eq!(frame.header.frame_type, FrameType::Message);
            writer.write_frame(FrameType::Message, b"one").await.unwrap();
            writer.write_frame(FrameType::Keepalive, &[]).await.unwrap();
            writer.write_frame(FrameType::Message, &frame.payload.unwrap()).await.unwrap();
            writer.write_frame(FrameType::Message, &[]).await.unwrap();
            reader
        });

        let notify = Arc::new(Notify::new());
        let ep = bound_endpoint(EndpointConfigBuilder::new().notify(notify).build());
        ep.connect(files_at(addr)).await.unwrap();
        assert_eq!(ep.state(), SessionState::Session);
        assert!(ep.is_connected());
        assert!(ep.connect_rtt().is_some());
        assert!(ep.first_response_latency().is_some());
        assert!(ep.take_pending_upcall());
        assert!(!ep.has_pending_upcall());

        ep.send(b"echo me").await.unwrap();
        assert_eq!(&ep.receive().await.unwrap()[..], b"one");
        assert_eq!(&ep.receive().await.unwrap()[..], b"echo me");
        assert!(ep.receive().await.unwrap().is_empty());

        let _reader = peer.await.unwrap();
        ep.teardown().await;
    }

    #[tokio::test]
    async fn test_retarget_then_positive() {
        let (first, first_addr) = listen().await;
        let (second, second_addr) = listen().await;
        tokio::spawn(async move {
            let (_reader, mut writer, _) = accept_request(&first).await;
            writer
                .write_frame(FrameType::RetargetResp, &retarget_payload(second_addr))
                .await
                .unwrap();
        });
        let peer = tokio::spawn(async move {
            let (reader, mut writer, request) = accept_request(&second).await;
            assert_eq!(request.called, NbName::server("files").unwrap());
            writer.write_frame(FrameType::PositiveResp, &[]).await.unwrap();
            (reader, writer)
        });

        let ep = bound_endpoint(EndpointConfig::default());
        ep.connect(files_at(first_addr)).await.unwrap();
        assert_eq!(ep.state(), SessionState::Session);
        assert_eq!(ep.reconnects(), 1);

        let current = ep.peer().unwrap();
        assert_eq!(current.addr, SocketAddr::V4(second_addr));
        assert_eq!(current.name, NbName::server("files").unwrap());
        let _peer = peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_retarget() {
        let (first, first_addr) = listen().await;
        let (second, second_addr) = listen().await;
        tokio::spawn(async move {
            let (_reader, mut writer, _) = accept_request(&first).await;
            let body = retarget_payload(second_addr);
            writer.write_frame(FrameType::RetargetResp, &body).await.unwrap();
        });
        tokio::spawn(async move {
            let (_reader, mut writer, _) = accept_request(&second).await;
            let body = retarget_payload(first_addr);
            writer.write_frame(FrameType::RetargetResp, &body).await.unwrap();
        });

        let ep = bound_endpoint(EndpointConfig::default());
        match ep.connect(files_at(first_addr)).await {
            Err(TransportError::Retarget { addr, source }) => {
                assert_eq!(addr, second_addr);
                assert!(matches!(*source, TransportError::RepeatedRetarget));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ep.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_negative_response() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (_reader, mut writer, _) = accept_request(&listener).await;
            writer.write_frame(FrameType::NegativeResp, &[0x82]).await.unwrap();
        });

        let ep = bound_endpoint(EndpointConfig::default());
        let err = ep.connect(files_at(addr)).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Rejected(NegativeReason::CalledNotPresent)
        ));
        assert!(!Endpoint::is_fatal(&err));
        assert_eq!(ep.state(), SessionState::Closed);
        assert!(!ep.is_connected());
    }

    #[tokio::test]
    async fn test_silent_peer() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (reader, writer, _) = accept_request(&listener).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop((reader, writer));
        });

        let config = EndpointConfigBuilder::new()
            .timeout(Duration::from_millis(200))
            .build();
        let ep = bound_endpoint(config);
        let err = ep.connect(files_at(addr)).await.unwrap_err();
        assert!(matches!(err, TransportError::NoResponse));
        assert!(err.is_timeout());
        assert_eq!(ep.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_second_receive_is_busy() {
        let (listener, addr) = listen().await;
        let peer = tokio::spawn(async move {
            let (reader, mut writer, _) = accept_request(&listener).await;
            writer.write_frame(FrameType::PositiveResp, &[]).await.unwrap();
            (reader, writer)
        });

        let ep = Arc::new(bound_endpoint(EndpointConfig::default()));
        ep.connect(files_at(addr)).await.unwrap();
        let _peer = peer.await.unwrap();

        let blocked = tokio::spawn({
            let ep = ep.clone();
            async move { ep.receive().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(ep.receive().await, Err(TransportError::Busy)));
        assert_eq!(ep.state(), SessionState::Session);

        ep.disconnect().await;
        assert!(matches!(
            blocked.await.unwrap(),
            Err(TransportError::NotConnected)
        ));
        assert_eq!(ep.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_reserved_bits_close_session() {
        let (listener, addr) = listen().await;
        let peer = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (rd, mut wr) = stream.into_split();
            let mut reader = FrameReader::new(rd);
            reader.read_frame(None, &mut Wakeups::none()).await.unwrap();
            wr.write_all(&[FrameType::PositiveResp.as_byte(), 0, 0, 0]).await.unwrap();
            wr.write_all(&[FrameType::Message.as_byte(), 0x02, 0, 0]).await.unwrap();
            (reader, wr)
        });

        let ep = bound_endpoint(EndpointConfig::default());
        ep.connect(files_at(addr)).await.unwrap();
        let _peer = peer.await.unwrap();

        let err = ep.receive().await.unwrap_err();
        assert!(err.is_protocol_error());
        assert!(Endpoint::is_fatal(&err));
        assert_eq!(ep.state(), SessionState::Closed);
        assert!(matches!(ep.send(b"x").await, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_peer_close_is_fatal() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (_reader, mut writer, _) = accept_request(&listener).await;
            writer.write_frame(FrameType::PositiveResp, &[]).await.unwrap();
        });

        let ep = bound_endpoint(EndpointConfig::default());
        ep.connect(files_at(addr)).await.unwrap();

        let err = ep.receive().await.unwrap_err();
        assert!(Endpoint::is_fatal(&err));
        assert_eq!(ep.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            for _ in 0..2 {
                let (reader, mut writer, _) = accept_request(&listener).await;
                writer.write_frame(FrameType::PositiveResp, &[]).await.unwrap();
                drop((reader, writer));
            }
        });

        let ep = bound_endpoint(EndpointConfig::default());
        ep.connect(files_at(addr)).await.unwrap();
        assert!(matches!(
            ep.connect(files_at(addr)).await,
            Err(TransportError::AlreadyConnected)
        ));
        let rtt = ep.connect_rtt();

        ep.disconnect().await;
        ep.connect(files_at(addr)).await.unwrap();
        assert_eq!(ep.state(), SessionState::Session);
        assert_eq!(ep.connect_rtt(), rtt);
    }

    #[tokio::test]
    async fn test_disconnect_during_retarget_sticks() {
        let (first, first_addr) = listen().await;
        let (second, second_addr) = listen().await;
        let (go, released) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            let (_reader, mut writer, _) = accept_request(&first).await;
            let body = retarget_payload(second_addr);
            writer.write_frame(FrameType::RetargetResp, &body).await.unwrap();
        });
        tokio::spawn(async move {
            let (stream, _) = second.accept().await.unwrap();
            let _ = released.await;
            let (rd, wr) = stream.into_split();
            let mut writer = FrameWriter::new(wr);
            let _ = writer.write_frame(FrameType::PositiveResp, &[]).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(rd);
        });

        let notify = Arc::new(Notify::new());
        let ep = Arc::new(bound_endpoint(
            EndpointConfigBuilder::new().notify(notify.clone()).build(),
        ));
        let watcher = tokio::spawn({
            let ep = ep.clone();
            async move {
                notify.notified().await;
                let seen = ep.state();
                ep.disconnect().await;
                let _ = go.send(());
                seen
            }
        });
        tokio::task::yield_now().await;

        let err = ep.connect(files_at(first_addr)).await.unwrap_err();
        assert!(matches!(err, TransportError::Retarget { .. }));
        assert_ne!(watcher.await.unwrap(), SessionState::Session);

        assert_eq!(ep.state(), SessionState::Closed);
        assert!(!ep.is_connected());
        assert!(matches!(ep.receive().await, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_keepalive_before_reply() {
        let (listener, addr) = listen().await;
        let peer = tokio::spawn(async move {
            let (reader, mut writer, _) = accept_request(&listener).await;
            writer.write_frame(FrameType::Keepalive, &[]).await.unwrap();
            writer.write_frame(FrameType::Keepalive, b"junk").await.unwrap();
            writer.write_frame(FrameType::PositiveResp, &[]).await.unwrap();
            (reader, writer)
        });

        let ep = bound_endpoint(EndpointConfig::default());
        ep.connect(files_at(addr)).await.unwrap();
        assert_eq!(ep.state(), SessionState::Session);
        let _peer = peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_skips_stray_frames() {
        let (listener, addr) = listen().await;
        let peer = tokio::spawn(async move {
            let (reader, mut writer, _) = accept_request(&listener).await;
            writer.write_frame(FrameType::PositiveResp, &[]).await.unwrap();
            writer.write_frame(FrameType::Keepalive, b"junk").await.unwrap();
            writer.write_frame(FrameType::PositiveResp, b"zz").await.unwrap();
            writer.write_frame(FrameType::RetargetResp, &[127, 0, 0]).await.unwrap();
            writer.write_frame(FrameType::NegativeResp, &[0x80]).await.unwrap();
            writer.write_frame(FrameType::Message, b"m1").await.unwrap();
            (reader, writer)
        });

        let ep = bound_endpoint(EndpointConfig::default());
        ep.connect(files_at(addr)).await.unwrap();
        let _peer = peer.await.unwrap();

        assert_eq!(&ep.receive().await.unwrap()[..], b"m1");
        assert_eq!(ep.state(), SessionState::Session);
        assert_eq!(ep.peer().unwrap().addr, SocketAddr::V4(addr));
        assert_eq!(ep.reconnects(), 0);
    }

    #[tokio::test]
    async fn test_malformed_retarget() {
        let (listener, addr) = listen().await;
        tokio::spawn(async move {
            let (_reader, mut writer, _) = accept_request(&listener).await;
            writer.write_frame(FrameType::RetargetResp, &[127, 0, 0]).await.unwrap();
        });

        let ep = bound_endpoint(EndpointConfig::default());
        let err = ep.connect(files_at(addr)).await.unwrap_err();
        assert!(err.is_protocol_error());
        assert!(Endpoint::is_fatal(&err));
        assert_eq!(ep.state(), SessionState::Closed);
        assert_eq!(ep.reconnects(), 0);
    }

    #[tokio::test]
    async fn test_first_response_latency_at_header() {
        let (listener, addr) = listen().await;
        let peer = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (rd, mut wr) = stream.into_split();
            let mut reader = FrameReader::new(rd);
            reader.read_frame(None, &mut Wakeups::none()).await.unwrap();
            wr.write_all(&[FrameType::PositiveResp.as_byte(), 0, 0, 2]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(600)).await;
            wr.write_all(b"ok").await.unwrap();
            (reader, wr)
        });

        let ep = bound_endpoint(EndpointConfig::default());
        ep.connect(files_at(addr)).await.unwrap();
        let _peer = peer.await.unwrap();

        let latency = ep.first_response_latency().unwrap();
        assert!(latency < Duration::from_millis(400), "{latency:?}");
    }

    #[tokio::test]
    async fn test_notify_fires_on_disconnect() {
        let (listener, addr) = listen().await;
        let peer = tokio::spawn(async move {
            let (reader, mut writer, _) = accept_request(&listener).await;
            writer.write_frame(FrameType::PositiveResp, &[]).await.unwrap();
            (reader, writer)
        });

        let notify = Arc::new(Notify::new());
        let ep = bound_endpoint(EndpointConfigBuilder::new().notify(notify.clone()).build());
        ep.connect(files_at(addr)).await.unwrap();
        let _peer = peer.await.unwrap();
        assert!(ep.take_pending_upcall());

        let notified = notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        ep.disconnect().await;
        tokio::time::timeout(Duration::from_secs(1), notified).await.unwrap();
        assert!(ep.has_pending_upcall());

        ep.disconnect().await;
        assert!(ep.take_pending_upcall());
        assert!(!ep.has_pending_upcall());
    }

    #[tokio::test]
    async fn test_connect_requires_bind() {
        let ep = Endpoint::default();
        let peer = NbAddr::new(
            SocketAddr::from(([127, 0, 0, 1], 139)),
            NbName::server("files").unwrap(),
        );
        assert!(matches!(ep.connect(peer).await, Err(TransportError::NotBound)));
        assert_eq!(ep.state(), SessionState::Closed);
    }

    #[test]
    fn test_bind_twice() {
        let ep = Endpoint::default();
        ep.bind(NbName::workstation("client").unwrap()).unwrap();
        assert!(matches!(
            ep.bind(NbName::workstation("client").unwrap()),
            Err(TransportError::AlreadyBound)
        ));
        assert_eq!(ep.local_name(), Some(NbName::workstation("client").unwrap()));
    }

    #[tokio::test]
    async fn test_closed_endpoint() {
        let ep = Endpoint::default();
        assert!(matches!(ep.send(b"x").await, Err(TransportError::NotConnected)));
        assert!(matches!(ep.receive().await, Err(TransportError::NotConnected)));

        ep.disconnect().await;
        ep.disconnect().await;
        assert!(!ep.is_connected());
        assert!(!ep.has_pending_upcall());
    }

    #[test]
    fn test_params() {
        let ep = Endpoint::new(EndpointConfigBuilder::new().send_buffer_size(1024).build());
        assert!(matches!(ep.param(ParamKind::SendBufferSize), Param::SendBufferSize(1024)));

        ep.set_param(Param::RecvBufferSize(2048)).unwrap();
        assert!(matches!(ep.param(ParamKind::RecvBufferSize), Param::RecvBufferSize(2048)));

        ep.set_param(Param::Timeout(Duration::from_secs(9))).unwrap();
        assert_eq!(ep.timeout(), Duration::from_secs(9));

        assert!(matches!(
            ep.set_param(Param::SendBufferSize(0)),
            Err(TransportError::InvalidParam(_))
        ));
        assert!(matches!(
            ep.set_param(Param::Timeout(Duration::ZERO)),
            Err(TransportError::InvalidParam(_))
        ));

        let notify = Arc::new(Notify::new());
        ep.set_param(Param::NotifyTarget(Some(notify.clone()))).unwrap();
        match ep.param(ParamKind::NotifyTarget) {
            Param::NotifyTarget(Some(n)) => assert!(Arc::ptr_eq(&n, &notify)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Endpoint::is_fatal(&TransportError::TruncatedFrame));
        assert!(!Endpoint::is_fatal(&TransportError::Busy));
    }
}
