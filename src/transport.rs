//! Traits for abstracting over the connection primitive.
//!
//! 对连接原语进行抽象的 trait。

use crate::{
    connection::{BinaryType, ConnectionHandle, ReadyState, WeakConnection},
    endpoint,
    error::Result,
    event::SocketEvent,
    hub::routing::{EventRouter, RoutingResult},
    payload::Payload,
};

pub mod websocket;

pub use websocket::WebSocketTransport;

/// One physical bidirectional connection, as created by a [`Transport`].
///
/// Establishing the connection is asynchronous; completion is reported as an
/// `open` event through the sink, never awaited inline.
///
/// 由 [`Transport`] 创建的一个物理双向连接。连接的建立是异步的，
/// 完成时通过事件接收器报告 `open` 事件。
pub trait Socket: Send + Sync + 'static {
    /// The normalized address this socket is connected to.
    fn url(&self) -> &str;

    fn ready_state(&self) -> ReadyState;

    /// Sends a payload. Only valid while the socket is `Open`.
    fn send(&self, payload: Payload) -> Result<()>;

    /// Requests the socket to close. Has no effect once it is closing or closed.
    fn close(&self);

    /// The event handler slot. Called at most once per socket; events must be
    /// delivered through the sink in the order they arrive.
    fn set_event_sink(&self, sink: EventSink);
}

/// A factory for sockets.
///
/// 套接字工厂。
pub trait Transport: Send + Sync + 'static {
    /// Normalizes a caller-supplied address into the form the sockets report.
    fn normalize(&self, address: &str) -> Result<String> {
        endpoint::normalize(address)
    }

    /// Creates a socket for an already normalized address. Must not block and
    /// must not deliver events before the sink is set. The socket must report
    /// `url` verbatim from [`Socket::url`].
    fn connect(&self, url: &str, binary_type: BinaryType) -> Result<Box<dyn Socket>>;
}

/// Receives the events of one socket and hands them to the event router.
///
/// 接收一个套接字的事件，并将其交给事件路由器。
#[derive(Clone)]
pub struct EventSink {
    router: EventRouter,
    origin: WeakConnection,
}

impl EventSink {
    pub(crate) fn new(router: EventRouter, origin: WeakConnection) -> Self {
        Self { router, origin }
    }

    /// Routes one event to the consumers bound to the originating connection.
    pub fn deliver(&self, event: SocketEvent) -> RoutingResult {
        self.router.route(&self.origin, &event)
    }

    /// The connection this sink delivers for, if it is still alive.
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.origin.upgrade()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("origin", &self.origin)
            .finish()
    }
}
