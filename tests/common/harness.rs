//! tests/common/harness.rs
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use socket_hub::{Dispatch, EventKind, SocketEvent};
use std::net::SocketAddr;
use std::sync::{
    Arc, Once,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "socket_hub=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// An owner that forwards every routed event into a channel.
pub struct ChannelOwner {
    tx: mpsc::UnboundedSender<(EventKind, SocketEvent)>,
}

impl ChannelOwner {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(EventKind, SocketEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl Dispatch for ChannelOwner {
    fn dispatch(&self, kind: EventKind, event: &SocketEvent) {
        let _ = self.tx.send((kind, event.clone()));
    }
}

/// Waits for the next event of `kind`, skipping others.
pub async fn next_event(
    rx: &mut mpsc::UnboundedReceiver<(EventKind, SocketEvent)>,
    kind: EventKind,
) -> SocketEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (k, event) = rx.recv().await.expect("owner channel closed");
            if k == kind {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

/// A local WebSocket server that echoes every text and binary frame back.
pub struct EchoServer {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl EchoServer {
    pub async fn start() -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(message)) = ws.next().await {
                        match message {
                            Message::Text(_) | Message::Binary(_) => {
                                if ws.send(message).await.is_err() {
                                    break;
                                }
                            }
                            // Close replies are flushed by the next read.
                            _ => {}
                        }
                    }
                });
            }
        });

        Self { addr, connections }
    }

    /// The address as a consumer would write it, without the trailing separator.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}
