//! Endpoint configuration and runtime parameters.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::core::constants::DEFAULT_TIMEOUT;
use crate::transport::SocketOptions;

/// Endpoint configuration.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Socket setup applied on every connect.
    pub socket: SocketOptions,

    /// Initial wait for the session reply, before calibration.
    pub timeout: Duration,

    /// Notify target fired on session state changes.
    pub notify: Option<Arc<Notify>>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            socket: SocketOptions::new(),
            timeout: DEFAULT_TIMEOUT,
            notify: None,
        }
    }
}

/// Builder for an [`EndpointConfig`].
#[derive(Debug, Default)]
pub struct EndpointConfigBuilder {
    config: EndpointConfig,
}

impl EndpointConfigBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set SO_SNDBUF.
    pub fn send_buffer_size(mut self, size: u32) -> Self {
        self.config.socket.send_buffer_size = size;
        self
    }

    /// Set SO_RCVBUF.
    pub fn recv_buffer_size(mut self, size: u32) -> Self {
        self.config.socket.recv_buffer_size = size;
        self
    }

    /// Set the initial session reply wait.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the supervisory read/write timeout. `None` blocks indefinitely.
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.socket.io_timeout = timeout;
        self
    }

    /// Set the overall connect bound.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.socket.connect_timeout = timeout;
        self
    }

    /// Enable or disable SO_KEEPALIVE.
    pub fn keepalive(mut self, enabled: bool) -> Self {
        self.config.socket.keepalive = enabled;
        self
    }

    /// Enable or disable TCP_NODELAY.
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config.socket.nodelay = enabled;
        self
    }

    /// Limit frame payloads.
    pub fn max_frame_len(mut self, max: u32) -> Self {
        self.config.socket.max_frame_len = max;
        self
    }

    /// Register a notify target, fired on session state changes.
    pub fn notify(mut self, notify: Arc<Notify>) -> Self {
        self.config.notify = Some(notify);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EndpointConfig {
        self.config
    }
}

/// Parameter selector for [`Endpoint::param`](super::Endpoint::param).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// SO_SNDBUF used on the next connect.
    SendBufferSize,
    /// SO_RCVBUF used on the next connect.
    RecvBufferSize,
    /// Session reply wait currently in force.
    Timeout,
    /// Registered notify target.
    NotifyTarget,
}

/// Parameter value.
#[derive(Debug, Clone)]
pub enum Param {
    /// SO_SNDBUF used on the next connect.
    SendBufferSize(u32),
    /// SO_RCVBUF used on the next connect.
    RecvBufferSize(u32),
    /// Session reply wait. Setting it drops any calibration.
    Timeout(Duration),
    /// Notify target, `None` to unregister.
    ///
    /// Fires on session state changes only: established, retargeted,
    /// closed, connect failed. Arriving data does not fire it; wait on
    /// [`Endpoint::receive`](super::Endpoint::receive) for that.
    NotifyTarget(Option<Arc<Notify>>),
}

impl Param {
    /// Selector of this value.
    pub fn kind(&self) -> ParamKind {
        match self {
            Param::SendBufferSize(_) => ParamKind::SendBufferSize,
            Param::RecvBufferSize(_) => ParamKind::RecvBufferSize,
            Param::Timeout(_) => ParamKind::Timeout,
            Param::NotifyTarget(_) => ParamKind::NotifyTarget,
        }
    }
}
