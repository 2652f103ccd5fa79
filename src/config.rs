//! 定义了共享套接字中心和消费者的可配置参数。
//! Defines configurable parameters for the socket hub and its consumers.

use crate::{connection::BinaryType, endpoint::EndpointSpec};

/// A structure containing all configurable parameters of a [`SocketHub`](crate::hub::SocketHub).
///
/// 包含 [`SocketHub`](crate::hub::SocketHub) 所有可配置参数的结构体。
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// The binary mode for new connections when the consumer does not pick one.
    /// 消费者未指定时，新连接使用的二进制模式。
    pub default_binary_type: BinaryType,

    /// Remove registry entries that have neither bindings nor a live connection.
    /// An empty entry is harmless, so this only matters for long-running hosts that
    /// visit many distinct addresses.
    ///
    /// 移除既没有绑定也没有活动连接的注册表项。
    pub prune_empty_entries: bool,

    /// What a consumer's teardown does to a connection other consumers still use.
    /// 消费者拆除时如何处理仍被其他消费者使用的连接。
    pub close_policy: ClosePolicy,
}

/// Close behavior of [`SocketRoute::teardown`](crate::route::SocketRoute::teardown)
/// when keep-alive is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosePolicy {
    /// Close only when the departing consumer was the last one bound to it.
    #[default]
    WhenUnbound,
    /// Close the connection even if other consumers are bound to it.
    Always,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_binary_type: BinaryType::Blob,
            prune_empty_entries: false,
            close_policy: ClosePolicy::WhenUnbound,
        }
    }
}

/// The configuration a consumer supplies when it attaches.
///
/// 消费者在连接时提供的配置。
#[derive(Debug, Clone, Default)]
pub struct SocketConfig {
    /// Where to connect. Nothing is attached while this is `None`.
    /// 连接地址。为 `None` 时不会建立任何连接。
    pub endpoint: Option<EndpointSpec>,

    /// Keep the connection open when the consumer is torn down, so a later setup
    /// at the same address can reuse it.
    ///
    /// 在消费者拆除时保持连接打开，以便稍后在同一地址上复用。
    pub keep_connection_alive_on_deactivate: bool,

    /// The binary mode for a newly created connection.
    pub binary_type: Option<BinaryType>,
}

impl SocketConfig {
    pub fn new(endpoint: impl Into<EndpointSpec>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_connection_alive_on_deactivate = keep_alive;
        self
    }

    pub fn with_binary_type(mut self, binary_type: BinaryType) -> Self {
        self.binary_type = Some(binary_type);
        self
    }
}
