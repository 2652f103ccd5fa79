//! The connection lifecycle manager, its registry and the event router.
//!
//! 连接生命周期管理器，以及它的注册表和事件路由器。

mod registry;
pub(crate) mod routing;

pub use routing::RoutingResult;

use crate::{
    config::HubConfig,
    connection::{BinaryType, ConnectionHandle},
    endpoint::{self, EndpointSpec},
    error::{Error, Result},
    event::Dispatch,
    payload::{JsonSerializer, Serializer},
    transport::Transport,
};
use registry::{ConsumerBinding, Registry};
use routing::EventRouter;
use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};
use tracing::{debug, info, trace, warn};

/// The identity of an attaching context (for example one route instance).
///
/// 附着上下文（例如一个路由实例）的标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a new, process-unique context identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Who is attaching: the context identity and the owner that receives its events.
///
/// The owner is held weakly; the hub never keeps it alive.
#[derive(Clone)]
pub struct AttachRequest {
    pub context: ContextId,
    pub owner: Weak<dyn Dispatch>,
    pub binary_type: Option<BinaryType>,
}

impl AttachRequest {
    pub fn new<D: Dispatch>(context: ContextId, owner: &Arc<D>) -> Self {
        let owner: Weak<D> = Arc::downgrade(owner);
        Self::with_owner(context, owner)
    }

    /// Builds a request from an owner that is already type-erased.
    ///
    /// 由已擦除类型的所有者构建请求。
    pub fn with_owner(context: ContextId, owner: Weak<dyn Dispatch>) -> Self {
        Self {
            context,
            owner,
            binary_type: None,
        }
    }

    pub fn with_binary_type(mut self, binary_type: Option<BinaryType>) -> Self {
        self.binary_type = binary_type;
        self
    }
}

/// Shares connections between consumers, keyed by normalized endpoint address.
///
/// `SocketHub` decides whether an attach creates a new connection or reuses the one
/// recorded for the address, records which consumer is bound to which connection, and
/// installs the event router on every connection it hands out.
///
/// 按规范化端点地址在消费者之间共享连接。
pub struct SocketHub<T: Transport> {
    transport: T,
    registry: Arc<Registry>,
    config: HubConfig,
    serializer: Option<Arc<dyn Serializer>>,
}

impl<T: Transport> SocketHub<T> {
    /// Creates a hub with the default configuration and a JSON serializer.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, HubConfig::default())
    }

    pub fn with_config(transport: T, config: HubConfig) -> Self {
        info!(?config, "创建套接字中心 | Creating socket hub");
        Self {
            transport,
            registry: Arc::new(Registry::default()),
            config,
            serializer: Some(Arc::new(JsonSerializer)),
        }
    }

    /// Replaces the serializer used by `emit`. `None` sends payloads as given.
    pub fn with_serializer(mut self, serializer: Option<Arc<dyn Serializer>>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn serializer(&self) -> Option<&Arc<dyn Serializer>> {
        self.serializer.as_ref()
    }

    /// Attaches a consumer to the connection for `endpoint`.
    ///
    /// A live `existing` handle is reused as is. Otherwise the candidates are tried in
    /// order: a live connection already recorded for the normalized address is reused,
    /// and only if there is none a new one is created. Any earlier binding of the same
    /// context at that address is replaced, and routing is installed on the handle once.
    ///
    /// Returns [`Error::InvalidEndpoint`] without touching any state if the endpoint
    /// fails validation.
    ///
    /// 将消费者附着到 `endpoint` 的连接上。
    pub fn attach(
        &self,
        endpoint: &EndpointSpec,
        existing: Option<&ConnectionHandle>,
        request: AttachRequest,
    ) -> Result<ConnectionHandle> {
        if !endpoint::validate(endpoint) {
            debug!(endpoint = %endpoint, "端点无效，跳过附着 | Invalid endpoint, not attaching");
            return Err(Error::InvalidEndpoint(endpoint.to_string()));
        }

        let handle = match existing.filter(|h| h.is_live()) {
            Some(handle) => {
                trace!(conn = %handle.id(), "复用消费者自己的连接 | Reusing the consumer's own connection");
                handle.clone()
            }
            None => self.acquire(endpoint, request.binary_type)?,
        };

        let replaced = self.registry.bind(
            &handle,
            ConsumerBinding {
                context: request.context,
                owner: request.owner,
                handle: handle.downgrade(),
            },
        );

        let router = EventRouter::new(Arc::downgrade(&self.registry), self.config.prune_empty_entries);
        if handle.install_routing(router) {
            trace!(conn = %handle.id(), "已安装事件路由 | Installed event routing");
        }

        debug!(
            url = %handle.url(),
            conn = %handle.id(),
            context = ?request.context,
            replaced,
            "消费者已附着 | Consumer attached"
        );
        Ok(handle)
    }

    fn acquire(
        &self,
        endpoint: &EndpointSpec,
        binary_type: Option<BinaryType>,
    ) -> Result<ConnectionHandle> {
        let binary_type = binary_type.unwrap_or(self.config.default_binary_type);
        let mut last_error = None;

        for candidate in endpoint.candidates() {
            let url = match self.transport.normalize(candidate) {
                Ok(url) => url,
                Err(err) => {
                    debug!(candidate = %candidate, error = %err, "无法规范化候选地址 | Could not normalize candidate");
                    last_error = Some(err);
                    continue;
                }
            };

            let connected = self.registry.live_or_connect(&url, || {
                self.transport
                    .connect(&url, binary_type)
                    .map(|socket| ConnectionHandle::new(socket, binary_type))
            });
            match connected {
                Ok(handle) => return Ok(handle),
                Err(err) => {
                    warn!(url = %url, error = %err, "连接失败，尝试下一个候选地址 | Connect failed, trying next candidate");
                    self.registry.prune(&url);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::InvalidEndpoint(endpoint.to_string())))
    }

    /// Detaches from a connection: closes it unless `keep_alive` is set.
    ///
    /// Registry membership is untouched; use [`SocketHub::release`] for that.
    ///
    /// 从连接上分离：除非设置了 `keep_alive`，否则关闭连接。
    pub fn detach(&self, handle: Option<&ConnectionHandle>, keep_alive: bool) {
        match handle {
            Some(handle) if !keep_alive => {
                debug!(url = %handle.url(), conn = %handle.id(), "分离并关闭连接 | Detaching and closing connection");
                handle.close();
            }
            Some(handle) => {
                debug!(url = %handle.url(), conn = %handle.id(), "分离并保持连接 | Detaching, keeping connection alive");
            }
            None => trace!("分离时没有连接 | Detach without a connection"),
        }
    }

    /// Removes `context`'s binding at the normalized address `url`.
    ///
    /// 移除 `context` 在规范化地址 `url` 上的绑定。
    pub fn release(&self, url: &str, context: ContextId) -> bool {
        let removed = self.registry.release(url, context);
        if self.config.prune_empty_entries {
            self.registry.prune(url);
        }
        removed
    }

    /// Closes every connection the hub has recorded.
    pub fn close_all(&self) {
        let connections = self.registry.connections();
        info!(count = connections.len(), "关闭所有连接 | Closing all connections");
        for connection in connections {
            connection.close();
        }
    }

    /// The connection recorded for a normalized address, in whatever state it is.
    pub fn connection(&self, url: &str) -> Option<ConnectionHandle> {
        self.registry.connection(url)
    }

    /// The number of bindings at a normalized address, stale ones included.
    pub fn binding_count(&self, url: &str) -> usize {
        self.registry.binding_count(url)
    }

    /// The number of consumers with a live owner bound to this very connection.
    pub fn bound_to(&self, handle: &ConnectionHandle) -> usize {
        self.registry.bound_to(handle)
    }

    /// Every normalized address that has a registry entry.
    pub fn addresses(&self) -> Vec<String> {
        self.registry.addresses()
    }
}

impl<T: Transport> std::fmt::Debug for SocketHub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHub")
            .field("config", &self.config)
            .field("addresses", &self.registry.addresses())
            .finish()
    }
}

#[cfg(test)]
mod tests;
