//! 定义了共享的物理连接句柄。
//! Defines the shared handle to one physical connection.

use crate::{
    error::Result,
    hub::routing::EventRouter,
    payload::Payload,
    transport::{EventSink, Socket},
};
use std::sync::{
    Arc, OnceLock, Weak,
    atomic::{AtomicU8, AtomicU64, Ordering},
};

/// The state of a connection. `Closed` is terminal.
///
/// 连接的状态。`Closed` 是终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }

    /// Whether a connection in this state may be shared with a new consumer.
    pub fn is_live(self) -> bool {
        matches!(self, ReadyState::Connecting | ReadyState::Open)
    }
}

/// A `ReadyState` that can be shared between a socket and its driver task.
///
/// 可以在套接字与其驱动任务之间共享的 `ReadyState`。
#[derive(Debug)]
pub struct AtomicReadyState(AtomicU8);

impl AtomicReadyState {
    pub fn new(state: ReadyState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ReadyState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves `Connecting` to `Open`. Returns `false` if the connection left
    /// `Connecting` in the meantime.
    pub fn open(&self) -> bool {
        self.0
            .compare_exchange(
                ReadyState::Connecting as u8,
                ReadyState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves a live connection to `Closing`. Returns `false` if it was already
    /// closing or closed.
    pub fn begin_close(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                ReadyState::from_u8(current)
                    .is_live()
                    .then_some(ReadyState::Closing as u8)
            })
            .is_ok()
    }
}

/// How binary frames are surfaced to consumers. Passed to the transport when a
/// connection is created and recorded on the [`ConnectionHandle`].
///
/// The mode is advisory: a transport may map it to its own representation or ignore
/// it. [`WebSocketTransport`](crate::transport::WebSocketTransport) delivers every binary
/// frame as [`Payload::Binary`](crate::payload::Payload::Binary) in both modes.
///
/// 二进制帧呈现给消费者的方式。在创建连接时传递给传输层。该模式仅供参考，
/// WebSocket 传输在两种模式下都以 `Bytes` 交付二进制帧。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryType {
    #[default]
    Blob,
    ArrayBuffer,
}

/// A process-unique identifier for a connection, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ConnectionInner {
    id: ConnectionId,
    binary_type: BinaryType,
    socket: Box<dyn Socket>,
    routing: OnceLock<()>,
}

/// A cheap-to-clone handle to one physical connection.
///
/// Two handles are the same connection only if [`ConnectionHandle::ptr_eq`] says so.
/// A closed connection is never reopened; a new handle is created instead.
///
/// 指向一个物理连接的句柄，克隆开销很小。只有当 [`ConnectionHandle::ptr_eq`]
/// 返回 `true` 时，两个句柄才是同一个连接。已关闭的连接不会被重新打开。
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionInner>,
}

impl ConnectionHandle {
    pub(crate) fn new(socket: Box<dyn Socket>, binary_type: BinaryType) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::next(),
                binary_type,
                socket,
                routing: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// The normalized address of the connection.
    /// 连接的规范化地址。
    pub fn url(&self) -> &str {
        self.inner.socket.url()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.socket.ready_state()
    }

    pub fn binary_type(&self) -> BinaryType {
        self.inner.binary_type
    }

    /// Whether the connection is `Connecting` or `Open`.
    pub fn is_live(&self) -> bool {
        self.ready_state().is_live()
    }

    pub fn send(&self, payload: Payload) -> Result<()> {
        self.inner.socket.send(payload)
    }

    /// Requests the connection to close.
    /// 请求关闭连接。
    pub fn close(&self) {
        self.inner.socket.close();
    }

    /// Whether both handles refer to the identical connection.
    pub fn ptr_eq(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Hands the socket an event sink bound to this connection. Only the first
    /// call has an effect; returns whether it installed the sink.
    pub(crate) fn install_routing(&self, router: EventRouter) -> bool {
        let mut installed = false;
        self.inner.routing.get_or_init(|| {
            self.inner
                .socket
                .set_event_sink(EventSink::new(router, self.downgrade()));
            installed = true;
        });
        installed
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("url", &self.url())
            .field("state", &self.ready_state())
            .finish()
    }
}

/// A non-owning reference to a connection that still compares by identity.
///
/// The allocation stays reserved while this reference exists, so identity
/// comparison remains sound after the connection itself is dropped.
#[derive(Clone)]
pub struct WeakConnection {
    inner: Weak<ConnectionInner>,
}

impl WeakConnection {
    pub fn upgrade(&self) -> Option<ConnectionHandle> {
        self.inner.upgrade().map(|inner| ConnectionHandle { inner })
    }

    pub fn ptr_eq(&self, other: &WeakConnection) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether this refers to the same connection as `handle`.
    pub fn is(&self, handle: &ConnectionHandle) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&handle.inner))
    }
}

impl std::fmt::Debug for WeakConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(handle) => write!(f, "WeakConnection({})", handle.id()),
            None => f.write_str("WeakConnection(<dropped>)"),
        }
    }
}
