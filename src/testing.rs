//! 测试辅助工具模块
//! Test utilities module
//!
//! An in-memory [`Transport`] whose sockets are driven by the test, and an owner that
//! records every event routed to it.

use crate::{
    connection::{AtomicReadyState, BinaryType, ReadyState},
    error::{Error, Result},
    event::{Dispatch, EventKind, SocketEvent},
    hub::RoutingResult,
    payload::Payload,
    transport::{EventSink, Socket, Transport},
};
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, MutexGuard, OnceLock, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct MockShared {
    url: String,
    binary_type: BinaryType,
    state: AtomicReadyState,
    sent: Mutex<Vec<Payload>>,
    close_calls: AtomicUsize,
    sink_installs: AtomicUsize,
    sink: OnceLock<EventSink>,
}

/// A socket created by [`MockTransport`]. Clones observe and drive the same socket.
///
/// 由 [`MockTransport`] 创建的套接字。克隆体观察并驱动同一个套接字。
#[derive(Clone)]
pub struct MockSocket {
    shared: Arc<MockShared>,
}

impl MockSocket {
    fn new(url: &str, binary_type: BinaryType) -> Self {
        Self {
            shared: Arc::new(MockShared {
                url: url.to_owned(),
                binary_type,
                state: AtomicReadyState::new(ReadyState::Connecting),
                sent: Mutex::new(Vec::new()),
                close_calls: AtomicUsize::new(0),
                sink_installs: AtomicUsize::new(0),
                sink: OnceLock::new(),
            }),
        }
    }

    pub fn binary_type(&self) -> BinaryType {
        self.shared.binary_type
    }

    /// Every payload passed to `send`, in order.
    pub fn sent(&self) -> Vec<Payload> {
        lock(&self.shared.sent).clone()
    }

    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::SeqCst)
    }

    /// How many times the event sink slot was set.
    pub fn sink_installs(&self) -> usize {
        self.shared.sink_installs.load(Ordering::SeqCst)
    }

    /// Completes the handshake and fires `open`.
    pub fn accept(&self) -> RoutingResult {
        self.shared.state.open();
        self.fire(SocketEvent::open(&self.shared.url))
    }

    /// Fires a `message` carrying `payload`.
    pub fn receive(&self, payload: impl Into<Payload>) -> RoutingResult {
        self.fire(SocketEvent::message(&self.shared.url, payload))
    }

    /// Fires an `error`.
    pub fn fail(&self, description: &str) -> RoutingResult {
        self.fire(SocketEvent::error(&self.shared.url, description))
    }

    /// Marks the socket closed and fires `close`.
    pub fn finish_close(&self, code: u16, reason: &str) -> RoutingResult {
        self.shared.state.store(ReadyState::Closed);
        self.fire(SocketEvent::close(&self.shared.url, code, reason, true))
    }

    /// Delivers an arbitrary event through the installed sink.
    pub fn fire(&self, event: SocketEvent) -> RoutingResult {
        match self.shared.sink.get() {
            Some(sink) => sink.deliver(event),
            None => RoutingResult::NoBindings,
        }
    }
}

impl Socket for MockSocket {
    fn url(&self) -> &str {
        &self.shared.url
    }

    fn ready_state(&self) -> ReadyState {
        self.shared.state.load()
    }

    fn send(&self, payload: Payload) -> Result<()> {
        if self.shared.state.load() != ReadyState::Open {
            return Err(Error::NoActiveConnection);
        }
        lock(&self.shared.sent).push(payload);
        Ok(())
    }

    fn close(&self) {
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.state.begin_close();
    }

    fn set_event_sink(&self, sink: EventSink) {
        self.shared.sink_installs.fetch_add(1, Ordering::SeqCst);
        let _ = self.shared.sink.set(sink);
    }
}

/// An in-memory transport. Every socket it creates is kept for inspection.
///
/// 内存中的传输层。它创建的每个套接字都会被保留以供检查。
#[derive(Clone, Default)]
pub struct MockTransport {
    sockets: Arc<Mutex<Vec<MockSocket>>>,
    refused: Arc<Mutex<HashSet<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `connect` fail for this normalized address.
    pub fn refuse(&self, url: &str) {
        lock(&self.refused).insert(url.to_owned());
    }

    /// The number of sockets created so far.
    pub fn connects(&self) -> usize {
        lock(&self.sockets).len()
    }

    /// Every socket created so far, oldest first.
    pub fn sockets(&self) -> Vec<MockSocket> {
        lock(&self.sockets).clone()
    }

    /// The most recent socket created for a normalized address.
    pub fn socket(&self, url: &str) -> Option<MockSocket> {
        lock(&self.sockets)
            .iter()
            .rev()
            .find(|s| s.shared.url == url)
            .cloned()
    }
}

impl Transport for MockTransport {
    fn connect(&self, url: &str, binary_type: BinaryType) -> Result<Box<dyn Socket>> {
        if lock(&self.refused).contains(url) {
            return Err(Error::InvalidEndpoint(format!("connection refused: {url}")));
        }
        let socket = MockSocket::new(url, binary_type);
        lock(&self.sockets).push(socket.clone());
        Ok(Box::new(socket))
    }
}

/// An owner that records every event routed to it.
///
/// 记录路由到它的每个事件的所有者。
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<(EventKind, SocketEvent)>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(EventKind, SocketEvent)> {
        lock(&self.events).clone()
    }

    /// The number of recorded events of one kind.
    pub fn count(&self, kind: EventKind) -> usize {
        lock(&self.events).iter().filter(|(k, _)| *k == kind).count()
    }

    /// The text of every recorded message, in order.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|(_, event)| match &event.payload {
                crate::event::EventPayload::Message(payload) => {
                    payload.as_text().map(str::to_owned)
                }
                _ => None,
            })
            .collect()
    }
}

impl Dispatch for Recorder {
    fn dispatch(&self, kind: EventKind, event: &SocketEvent) {
        lock(&self.events).push((kind, event.clone()));
    }
}
