//! Session handshake.
//!
//! Sends one REQUEST and interprets exactly one reply. A RETARGET reply
//! moves the endpoint to the given address; that reconnect and its
//! handshake happen at most once per connect.

use std::net::{SocketAddr, SocketAddrV4};

use tokio::time::Instant;

use super::connection::{lock, SharedState};
use super::error::{TransportError, TransportResult};
use super::frame::{parse_retarget, FrameType, NegativeReason};
use super::name::SessionRequest;
use super::reader::receive_frame;
use super::socket;
use crate::core::constants::MAX_RETARGETS;

/// Outcome of one request/reply exchange that does not end the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Positive,
    Retarget(SocketAddrV4),
}

/// Run the handshake on the endpoint's freshly connected socket.
///
/// `attempt` is the id `ConnectionState::begin_connect` returned;
/// once a disconnect revokes it the handshake stops with
/// `NotConnected` and leaves the endpoint alone. On success the endpoint is
/// in SESSION. On failure the endpoint is left for the caller to close;
/// after a retarget every failure is wrapped in a single
/// [`TransportError::Retarget`].
pub(crate) async fn negotiate(state: &SharedState, attempt: u64) -> TransportResult<()> {
    let mut retargeted: Option<SocketAddrV4> = None;
    let mut retargets = 0;

    loop {
        let result = match request_session(state, attempt).await {
            Ok(Reply::Positive) => {
                let mut st = lock(state);
                if !st.owns_connect(attempt) {
                    return Err(wrap(retargeted, TransportError::NotConnected));
                }
                st.on_session();
                st.raise_upcall();
                tracing::debug!(peer = ?st.peer, "session established");
                return Ok(());
            }
            Ok(Reply::Retarget(target)) if retargets < MAX_RETARGETS => {
                retargets += 1;
                retargeted = Some(target);
                tracing::debug!(%target, "session retargeted");
                reconnect(state, attempt, target).await
            }
            Ok(Reply::Retarget(target)) => {
                tracing::warn!(%target, "peer retargeted again");
                Err(TransportError::RepeatedRetarget)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            return Err(wrap(retargeted, e));
        }
    }
}

fn wrap(retargeted: Option<SocketAddrV4>, e: TransportError) -> TransportError {
    match retargeted {
        Some(addr) => TransportError::Retarget {
            addr,
            source: Box::new(e),
        },
        None => e,
    }
}

async fn request_session(state: &SharedState, attempt: u64) -> TransportResult<Reply> {
    let (stream, request, timeout) = {
        let mut st = lock(state);
        if !st.owns_connect(attempt) {
            return Err(TransportError::NotConnected);
        }
        let stream = st.stream.clone().ok_or(TransportError::NotConnected)?;
        let called = st.peer.as_ref().ok_or(TransportError::NotConnected)?.name.clone();
        let calling = st.local_name.clone().ok_or(TransportError::NotBound)?;
        st.on_request_sent();
        (stream, SessionRequest::new(called, calling), st.timing.timeout())
    };

    let body = request.encode();
    stream.writer().lock().await.write_frame(FrameType::Request, &body).await?;
    tracing::trace!(called = %request.called, calling = %request.calling, "session request sent");

    let deadline = Instant::now() + timeout;
    let (payload, frame_type) = match receive_frame(state, Some(deadline)).await {
        Err(TransportError::Timeout) => {
            tracing::debug!(?timeout, "no reply to session request");
            return Err(TransportError::NoResponse);
        }
        result => result?,
    };
    let payload = payload.as_deref().unwrap_or_default();

    match frame_type {
        FrameType::PositiveResp => Ok(Reply::Positive),
        FrameType::NegativeResp => {
            let reason = NegativeReason::from_payload(payload);
            tracing::debug!(%reason, "session rejected");
            Err(TransportError::Rejected(reason))
        }
        FrameType::RetargetResp => Ok(Reply::Retarget(parse_retarget(payload)?)),
        other => Err(TransportError::UnexpectedFrame(other)),
    }
}

async fn reconnect(state: &SharedState, attempt: u64, target: SocketAddrV4) -> TransportResult<()> {
    let (old, peer, opts) = {
        let mut st = lock(state);
        if !st.owns_connect(attempt) {
            return Err(TransportError::NotConnected);
        }
        let (old, peer) = st.on_retarget(target);
        st.raise_upcall();
        (old, peer, st.options.clone())
    };
    if let Some(old) = old {
        old.close().await;
    }
    let peer = peer.ok_or(TransportError::NotConnected)?;

    let (stream, rtt) = socket::connect(SocketAddr::V4(target), &opts).await?;
    let mut st = lock(state);
    if !st.owns_connect(attempt) {
        tracing::debug!(%peer, "disconnected during retarget, dropping new socket");
        return Err(TransportError::NotConnected);
    }
    tracing::debug!(%peer, ?rtt, "reconnected after retarget");
    st.attach(stream, peer);
    Ok(())
}
