#![deny(clippy::expect_used, clippy::unwrap_used)]

//! Shares a small number of WebSocket connections between many logical consumers.
//! 在众多逻辑消费者之间共享少量WebSocket连接。
//!
//! Consumers attach through a [`route::SocketRoute`]; the [`hub::SocketHub`] decides
//! whether a connection is created or reused, and routes every inbound event only to
//! the consumers bound to the connection it fired on.

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod hub;
pub mod payload;
pub mod route;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use config::{ClosePolicy, HubConfig, SocketConfig};
pub use connection::{BinaryType, ConnectionHandle, ReadyState};
pub use endpoint::{EndpointSpec, validate};
pub use error::{Error, Result};
pub use event::{Dispatch, EventKind, EventPayload, SocketEvent};
pub use hub::{AttachRequest, ContextId, SocketHub};
pub use payload::{JsonSerializer, Payload, Serializer};
pub use route::{EmitOutcome, SocketRoute};
pub use transport::{Transport, WebSocketTransport};
