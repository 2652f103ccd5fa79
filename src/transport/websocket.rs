//! A [`Transport`] backed by `tokio-tungstenite`.
//!
//! Each socket is driven by its own tokio task. The task waits for the event
//! sink before it starts the handshake, so no event can fire before routing is
//! installed.
//!
//! 基于 `tokio-tungstenite` 的 [`Transport`]。每个套接字由一个独立的tokio任务驱动。

use super::{EventSink, Socket, Transport};
use crate::{
    connection::{AtomicReadyState, BinaryType, ReadyState},
    error::{Error, Result},
    event::SocketEvent,
    payload::Payload,
};
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

/// Close code used when the connection dropped without a close frame.
const CLOSE_ABNORMAL: u16 = 1006;
/// Close code used when the peer sent a close frame without a status.
const CLOSE_NO_STATUS: u16 = 1005;

#[derive(Debug)]
enum SocketCommand {
    Send(Payload),
    Close,
}

/// Creates WebSocket connections on the current tokio runtime.
///
/// 在当前tokio运行时上创建WebSocket连接。
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport {
    runtime: Option<tokio::runtime::Handle>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives connections on the given runtime instead of the caller's.
    pub fn with_runtime(runtime: tokio::runtime::Handle) -> Self {
        Self {
            runtime: Some(runtime),
        }
    }
}

impl Transport for WebSocketTransport {
    /// Spawns the connection task. `binary_type` does not change delivery here: binary
    /// frames always arrive as `Bytes`.
    fn connect(&self, url: &str, binary_type: BinaryType) -> Result<Box<dyn Socket>> {
        let runtime = match &self.runtime {
            Some(runtime) => runtime.clone(),
            None => tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?,
        };

        let state = Arc::new(AtomicReadyState::new(ReadyState::Connecting));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (sink_tx, sink_rx) = oneshot::channel();

        runtime.spawn(drive_socket(url.to_owned(), state.clone(), sink_rx, command_rx));
        debug!(url = %url, ?binary_type, "WebSocket连接任务已启动 | WebSocket connection task spawned");

        Ok(Box::new(WebSocketSocket {
            url: url.to_owned(),
            state,
            command_tx,
            sink_tx: Mutex::new(Some(sink_tx)),
        }))
    }
}

struct WebSocketSocket {
    url: String,
    state: Arc<AtomicReadyState>,
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    sink_tx: Mutex<Option<oneshot::Sender<EventSink>>>,
}

impl Socket for WebSocketSocket {
    fn url(&self) -> &str {
        &self.url
    }

    fn ready_state(&self) -> ReadyState {
        self.state.load()
    }

    fn send(&self, payload: Payload) -> Result<()> {
        if self.state.load() != ReadyState::Open {
            return Err(Error::NoActiveConnection);
        }
        self.command_tx
            .send(SocketCommand::Send(payload))
            .map_err(|_| Error::ChannelClosed)
    }

    fn close(&self) {
        if self.state.begin_close() {
            // The driver may already be gone if the handshake failed.
            let _ = self.command_tx.send(SocketCommand::Close);
        }
    }

    fn set_event_sink(&self, sink: EventSink) {
        let sender = self
            .sink_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(sink);
        }
    }
}

fn into_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::text(text),
        Payload::Binary(data) => Message::binary(data),
        Payload::Structured(value) => Message::text(value.to_string()),
    }
}

async fn drive_socket(
    url: String,
    state: Arc<AtomicReadyState>,
    sink_rx: oneshot::Receiver<EventSink>,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
) {
    let Ok(sink) = sink_rx.await else {
        trace!(url = %url, "套接字在安装路由前被丢弃 | Socket dropped before routing was installed");
        state.store(ReadyState::Closed);
        return;
    };

    if state.load() != ReadyState::Connecting {
        state.store(ReadyState::Closed);
        sink.deliver(SocketEvent::close(
            &url,
            CLOSE_ABNORMAL,
            "closed before the connection was established",
            false,
        ));
        return;
    }

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            warn!(url = %url, error = %err, "WebSocket握手失败 | WebSocket handshake failed");
            state.store(ReadyState::Closed);
            sink.deliver(SocketEvent::error(&url, err.to_string()));
            sink.deliver(SocketEvent::close(&url, CLOSE_ABNORMAL, "", false));
            return;
        }
    };

    let (mut writer, mut reader) = stream.split();
    let mut close_sent = false;
    if state.open() {
        debug!(url = %url, "WebSocket已连接 | WebSocket connected");
        sink.deliver(SocketEvent::open(&url));
    } else {
        // close() was requested while the handshake was in flight.
        close_sent = writer.send(Message::Close(None)).await.is_ok();
    }

    let mut commands_open = !close_sent;
    let mut outcome = (CLOSE_ABNORMAL, String::new(), false);

    loop {
        tokio::select! {
            command = commands.recv(), if commands_open => match command {
                Some(SocketCommand::Send(payload)) => {
                    if let Err(err) = writer.send(into_message(payload)).await {
                        sink.deliver(SocketEvent::error(&url, err.to_string()));
                        break;
                    }
                }
                Some(SocketCommand::Close) | None => {
                    commands_open = false;
                    if !close_sent {
                        state.begin_close();
                        close_sent = writer.send(Message::Close(None)).await.is_ok();
                    }
                }
            },
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    sink.deliver(SocketEvent::message(&url, text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    sink.deliver(SocketEvent::message(&url, Payload::Binary(data)));
                }
                Some(Ok(Message::Close(frame))) => {
                    state.begin_close();
                    outcome = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_owned(), true),
                        None => (CLOSE_NO_STATUS, String::new(), true),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(url = %url, error = %err, "WebSocket读取失败 | WebSocket read failed");
                    sink.deliver(SocketEvent::error(&url, err.to_string()));
                    break;
                }
                None => break,
            },
        }
    }

    state.store(ReadyState::Closed);
    let (code, reason, was_clean) = outcome;
    debug!(url = %url, code, was_clean, "WebSocket已关闭 | WebSocket closed");
    sink.deliver(SocketEvent::close(&url, code, reason, was_clean));
}
