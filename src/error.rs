//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the shared socket library.
/// 共享套接字库的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// The endpoint address is missing, empty, or does not use a `ws`/`wss` scheme.
    /// 端点地址缺失、为空，或未使用 `ws`/`wss` 协议。
    #[error("Invalid endpoint address: {0}")]
    InvalidEndpoint(String),

    /// An operation needed an open connection but none was available.
    /// 操作需要一个打开的连接，但没有可用的连接。
    #[error("No active connection")]
    NoActiveConnection,

    /// Serialization was requested but no serializer is configured.
    /// 请求了序列化，但没有配置序列化器。
    #[error("No serializer is available")]
    SerializationUnavailable,

    /// An error occurred while parsing an endpoint URL.
    /// 解析端点URL时发生错误。
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// A structured payload could not be serialized.
    /// 结构化载荷无法被序列化。
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying WebSocket reported an error.
    /// 底层WebSocket报告了错误。
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The transport needs a tokio runtime but none is running on this thread.
    /// 传输需要tokio运行时，但当前线程上没有运行时。
    #[error("No tokio runtime is available to drive the connection")]
    NoRuntime,

    /// An internal channel for communication between tasks was closed unexpectedly.
    /// 用于任务间通信的内部通道意外关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
