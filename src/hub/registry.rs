//! 连接注册表 - 规范化地址到连接与消费者绑定的映射
//! Connection Registry - maps normalized addresses to their connection and consumer bindings

use super::ContextId;
use crate::{
    connection::{ConnectionHandle, WeakConnection},
    error::Result,
    event::Dispatch,
};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// 一个消费者与其当前使用的连接之间的记录
/// The record linking one consumer to the connection it currently uses
#[derive(Clone)]
pub(crate) struct ConsumerBinding {
    pub(crate) context: ContextId,
    pub(crate) owner: Weak<dyn Dispatch>,
    pub(crate) handle: WeakConnection,
}

/// 单个地址的注册表项
/// Registry entry for one address
#[derive(Default)]
pub(crate) struct RegistryEntry {
    /// 该地址最近创建的连接
    /// The most recent connection created for this address
    connection: Option<ConnectionHandle>,
    /// 按绑定顺序排列的消费者
    /// Consumers in the order they attached
    bindings: Vec<ConsumerBinding>,
}

impl RegistryEntry {
    fn live_connection(&self) -> Option<&ConnectionHandle> {
        self.connection.as_ref().filter(|c| c.is_live())
    }

    fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.live_connection().is_none()
    }

    /// 移除所有者已被释放的绑定，返回移除的数量
    /// Drops bindings whose owner is gone, returning how many were removed
    fn sweep_dead_owners(&mut self) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.owner.strong_count() > 0);
        before - self.bindings.len()
    }
}

/// 连接注册表
/// Connection registry
///
/// 每个规范化地址最多记录一个活动连接，以及附着在该地址上的所有消费者绑定。
/// 每个地址的所有操作都在该地址的分片锁下进行，因此并发的附着不会为同一地址创建两个连接。
///
/// Records at most one live connection per normalized address, together with every
/// consumer binding at that address. All operations on one address run under that
/// address's shard lock, so concurrent attaches never create two connections for it.
#[derive(Default)]
pub(crate) struct Registry {
    entries: DashMap<String, RegistryEntry>,
}

impl Registry {
    /// 返回地址上的活动连接，如果没有则通过 `connect` 创建一个
    /// Returns the live connection for `url`, creating one with `connect` if there is none
    pub(crate) fn live_or_connect(
        &self,
        url: &str,
        connect: impl FnOnce() -> Result<ConnectionHandle>,
    ) -> Result<ConnectionHandle> {
        let mut entry = self.entries.entry(url.to_owned()).or_default();
        if let Some(existing) = entry.live_connection() {
            trace!(url = %url, conn = %existing.id(), "复用已有连接 | Reusing existing connection");
            return Ok(existing.clone());
        }
        let handle = connect()?;
        debug!(url = %url, conn = %handle.id(), "创建新连接 | Created new connection");
        entry.connection = Some(handle.clone());
        Ok(handle)
    }

    /// 绑定消费者，先移除同一上下文之前的绑定
    /// Binds a consumer, removing any earlier binding of the same context first
    ///
    /// 返回是否替换了已有绑定。
    /// Returns whether an earlier binding was replaced.
    pub(crate) fn bind(&self, handle: &ConnectionHandle, binding: ConsumerBinding) -> bool {
        let url = handle.url();
        let mut entry = self.entries.entry(url.to_owned()).or_default();

        let swept = entry.sweep_dead_owners();
        let before = entry.bindings.len();
        entry.bindings.retain(|b| b.context != binding.context);
        let replaced = entry.bindings.len() < before;
        if swept > 0 {
            trace!(url = %url, swept, "清理已释放所有者的绑定 | Swept bindings of dropped owners");
        }

        if entry.live_connection().is_none() {
            entry.connection = Some(handle.clone());
        }

        trace!(url = %url, conn = %handle.id(), context = ?binding.context, replaced, "绑定消费者 | Bound consumer");
        entry.bindings.push(binding);
        replaced
    }

    /// 移除某个上下文在某地址上的绑定
    /// Removes a context's binding at an address
    pub(crate) fn release(&self, url: &str, context: ContextId) -> bool {
        let Some(mut entry) = self.entries.get_mut(url) else {
            return false;
        };
        let before = entry.bindings.len();
        entry.bindings.retain(|b| b.context != context);
        let removed = entry.bindings.len() < before;
        if removed {
            trace!(url = %url, context = ?context, "释放消费者绑定 | Released consumer binding");
        }
        removed
    }

    /// 收集绑定到 `origin` 连接的所有仍然存活的所有者
    /// Collects every still-alive owner bound to the `origin` connection
    ///
    /// 返回前会释放分片锁，这样所有者在处理事件时可以重新进入注册表。
    /// The shard lock is released before returning so owners may re-enter the
    /// registry while handling the event.
    pub(crate) fn owners_for(&self, url: &str, origin: &WeakConnection) -> Vec<Arc<dyn Dispatch>> {
        let Some(entry) = self.entries.get(url) else {
            return Vec::new();
        };
        entry
            .bindings
            .iter()
            .filter(|b| b.handle.ptr_eq(origin))
            .filter_map(|b| b.owner.upgrade())
            .collect()
    }

    /// 统计绑定到某个连接且所有者仍然存活的消费者数量
    /// Counts consumers with a live owner that are bound to a connection
    pub(crate) fn bound_to(&self, handle: &ConnectionHandle) -> usize {
        self.entries.get(handle.url()).map_or(0, |entry| {
            entry
                .bindings
                .iter()
                .filter(|b| b.handle.is(handle) && b.owner.strong_count() > 0)
                .count()
        })
    }

    /// 如果地址记录的连接是 `origin`，则忘记它
    /// Forgets the address's recorded connection if it is `origin`
    pub(crate) fn forget_connection(&self, url: &str, origin: &WeakConnection) {
        if let Some(mut entry) = self.entries.get_mut(url) {
            if entry.connection.as_ref().is_some_and(|c| origin.is(c)) {
                trace!(url = %url, "移除已关闭的连接 | Dropping closed connection");
                entry.connection = None;
            }
        }
    }

    /// 清理已释放所有者的绑定，并在注册表项为空时移除它
    /// Sweeps bindings of dropped owners, then removes the entry if it is empty
    pub(crate) fn prune(&self, url: &str) -> bool {
        if let Some(mut entry) = self.entries.get_mut(url) {
            entry.sweep_dead_owners();
        }
        let pruned = self.entries.remove_if(url, |_, entry| entry.is_empty()).is_some();
        if pruned {
            debug!(url = %url, "清理空注册表项 | Pruned empty registry entry");
        }
        pruned
    }

    pub(crate) fn connection(&self, url: &str) -> Option<ConnectionHandle> {
        self.entries.get(url).and_then(|entry| entry.connection.clone())
    }

    pub(crate) fn binding_count(&self, url: &str) -> usize {
        self.entries.get(url).map_or(0, |entry| entry.bindings.len())
    }

    pub(crate) fn addresses(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub(crate) fn connections(&self) -> Vec<ConnectionHandle> {
        self.entries
            .iter()
            .filter_map(|entry| entry.connection.clone())
            .collect()
    }
}
