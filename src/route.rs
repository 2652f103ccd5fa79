//! The consumer-facing API: one attachment point that shares a hub connection.
//!
//! 面向消费者的API：一个共享中心连接的附着点。

use crate::{
    config::{ClosePolicy, SocketConfig},
    connection::{ConnectionHandle, ReadyState},
    endpoint::EndpointSpec,
    error::Error,
    event::Dispatch,
    hub::{AttachRequest, ContextId, SocketHub},
    payload::Payload,
    transport::Transport,
};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// The result of [`SocketRoute::emit`]. Emitting is best effort; none of these is an error.
///
/// [`SocketRoute::emit`] 的结果。发送是尽力而为的。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The payload was handed to the connection.
    Sent,
    /// There is no connection, or it is not open. Nothing was sent.
    NoActiveConnection,
    /// The payload could not be serialized or the transport refused it.
    Failed,
}

/// One logical consumer of a shared connection, such as a route instance.
///
/// The host calls [`setup`](SocketRoute::setup) when the consumer activates and
/// [`teardown`](SocketRoute::teardown) when it deactivates. In between, the owner passed
/// to `setup` receives the events of the connection through [`Dispatch`].
///
/// 共享连接的一个逻辑消费者，例如一个路由实例。
pub struct SocketRoute<T: Transport> {
    hub: Arc<SocketHub<T>>,
    context: ContextId,
    config: SocketConfig,
    connection: Option<ConnectionHandle>,
}

impl<T: Transport> SocketRoute<T> {
    pub fn new(hub: Arc<SocketHub<T>>, config: SocketConfig) -> Self {
        Self {
            hub,
            context: ContextId::next(),
            config,
            connection: None,
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// The connection this consumer currently holds, in whatever state it is.
    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.connection.as_ref()
    }

    /// Attaches `owner` to the shared connection for the configured endpoint.
    ///
    /// Returns `false` and changes nothing if there is no endpoint or it is invalid, so
    /// the host can carry on with its own activation. On success the configured
    /// endpoint is replaced by the connection's normalized address.
    ///
    /// 将 `owner` 附着到所配置端点的共享连接上。端点缺失或无效时返回 `false` 且不做任何改变。
    pub fn setup<D: Dispatch>(&mut self, owner: &Arc<D>) -> bool {
        let owner: Weak<D> = Arc::downgrade(owner);
        self.setup_with_owner(owner)
    }

    /// Like [`setup`](SocketRoute::setup), for hosts that hold the owner as a trait object,
    /// for example `Arc::downgrade(&owner)` on an `Arc<dyn Dispatch>`.
    pub fn setup_with_owner(&mut self, owner: Weak<dyn Dispatch>) -> bool {
        let Some(endpoint) = self.config.endpoint.as_ref() else {
            trace!(context = ?self.context, "没有配置端点 | No endpoint configured");
            return false;
        };

        let request = AttachRequest::with_owner(self.context, owner)
            .with_binary_type(self.config.binary_type);
        match self.hub.attach(endpoint, self.connection.as_ref(), request) {
            Ok(handle) => {
                self.config.endpoint = Some(EndpointSpec::Single(handle.url().to_owned()));
                self.connection = Some(handle);
                true
            }
            Err(err) => {
                debug!(context = ?self.context, error = %err, "附着失败，继续默认流程 | Attach failed, falling through");
                false
            }
        }
    }

    /// Detaches from the connection.
    ///
    /// With keep-alive on, the connection and this consumer's binding stay in place so
    /// the consumer keeps receiving events and a later `setup` reuses the connection.
    /// With keep-alive off, the binding is released and the connection is closed,
    /// subject to the hub's [`ClosePolicy`].
    ///
    /// 从连接上分离。
    pub fn teardown(&mut self) {
        let keep_alive = self.config.keep_connection_alive_on_deactivate;
        let Some(connection) = self.connection.as_ref() else {
            self.hub.detach(None, keep_alive);
            return;
        };

        if keep_alive {
            self.hub.detach(Some(connection), true);
            return;
        }

        self.hub.release(connection.url(), self.context);
        let still_shared = self.hub.config().close_policy == ClosePolicy::WhenUnbound
            && self.hub.bound_to(connection) > 0;
        if still_shared {
            debug!(url = %connection.url(), "连接仍被其他消费者使用 | Connection still used by other consumers");
        }
        self.hub.detach(Some(connection), still_shared);
    }

    /// Sends a payload if the connection is open, serializing it first when asked to.
    ///
    /// Without a serializer the payload is sent as given. Without an open connection
    /// nothing happens.
    ///
    /// 如果连接已打开则发送载荷。没有打开的连接时什么也不做。
    pub fn emit(&self, payload: impl Into<Payload>, serialize: bool) -> EmitOutcome {
        let Some(connection) = self
            .connection
            .as_ref()
            .filter(|c| c.ready_state() == ReadyState::Open)
        else {
            trace!(context = ?self.context, "没有打开的连接，丢弃发送 | No open connection, dropping emit");
            return EmitOutcome::NoActiveConnection;
        };

        let mut payload = payload.into();
        if serialize {
            match self.hub.serializer() {
                Some(serializer) => match serializer.serialize(payload) {
                    Ok(serialized) => payload = serialized,
                    Err(err) => {
                        warn!(error = %err, "载荷序列化失败 | Payload serialization failed");
                        return EmitOutcome::Failed;
                    }
                },
                None => trace!(reason = %Error::SerializationUnavailable, "按原样发送 | Sending as is"),
            }
        }

        match connection.send(payload) {
            Ok(()) => EmitOutcome::Sent,
            Err(err) => {
                warn!(url = %connection.url(), error = %err, "发送失败 | Send failed");
                EmitOutcome::Failed
            }
        }
    }

    /// Closes the connection regardless of the keep-alive setting.
    ///
    /// 无论是否设置了保持连接，都关闭连接。
    pub fn close_socket(&self) {
        if let Some(connection) = self.connection.as_ref() {
            debug!(url = %connection.url(), conn = %connection.id(), "显式关闭连接 | Closing connection on request");
            connection.close();
        }
    }
}

impl<T: Transport> Drop for SocketRoute<T> {
    /// Releases this consumer's binding. The connection itself is left as it is.
    ///
    /// 释放该消费者的绑定，连接本身保持不变。
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.hub.release(connection.url(), self.context);
        }
    }
}

impl<T: Transport> std::fmt::Debug for SocketRoute<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketRoute")
            .field("context", &self.context)
            .field("config", &self.config)
            .field("connection", &self.connection)
            .finish()
    }
}
