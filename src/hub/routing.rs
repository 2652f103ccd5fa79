//! 事件路由层 - 负责将连接事件分发给绑定到该连接的消费者
//! Event Routing Layer - fans connection events out to the consumers bound to that connection

use super::registry::Registry;
use crate::{connection::WeakConnection, event::{EventKind, SocketEvent}};
use std::sync::Weak;
use tracing::trace;

/// 路由操作结果
/// Routing operation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingResult {
    /// 成功分发给给定数量的所有者
    /// Dispatched to the given number of owners
    Dispatched(usize),
    /// 没有消费者绑定到触发事件的连接
    /// No consumer is bound to the connection the event fired on
    NoBindings,
    /// 注册表所属的中心已被丢弃
    /// The hub owning the registry has been dropped
    HubDropped,
}

/// 事件路由器
/// Event router
///
/// 每个连接安装一次。只有当绑定记录的连接与触发事件的连接是同一个对象时，事件才会被分发；
/// 同一地址上被取代的旧连接的绑定会被跳过。
///
/// Installed once per connection. An event is dispatched to a binding only if the
/// connection recorded in the binding is the very object the event fired on; bindings
/// left over from a superseded connection at the same address are skipped.
#[derive(Clone)]
pub(crate) struct EventRouter {
    registry: Weak<Registry>,
    prune_empty_entries: bool,
}

impl EventRouter {
    pub(crate) fn new(registry: Weak<Registry>, prune_empty_entries: bool) -> Self {
        Self {
            registry,
            prune_empty_entries,
        }
    }

    /// 将一个事件分发给绑定到 `origin` 的所有者
    /// Dispatch one event to the owners bound to `origin`
    pub(crate) fn route(&self, origin: &WeakConnection, event: &SocketEvent) -> RoutingResult {
        let Some(registry) = self.registry.upgrade() else {
            trace!(url = %event.url, "中心已丢弃，忽略事件 | Hub dropped, ignoring event");
            return RoutingResult::HubDropped;
        };

        let kind = event.kind();
        let owners = registry.owners_for(&event.url, origin);

        if kind == EventKind::Close {
            registry.forget_connection(&event.url, origin);
            if self.prune_empty_entries {
                registry.prune(&event.url);
            }
        }

        if owners.is_empty() {
            trace!(url = %event.url, %kind, "没有绑定的消费者 | No bound consumers");
            return RoutingResult::NoBindings;
        }

        trace!(url = %event.url, %kind, owners = owners.len(), "分发事件 | Dispatching event");
        for owner in &owners {
            owner.dispatch(kind, event);
        }
        RoutingResult::Dispatched(owners.len())
    }
}
