//! 出站与入站消息载荷，以及可选的序列化器。
//! Outbound and inbound message payloads, and the optional serializer.

use crate::error::Result;
use bytes::Bytes;
use serde_json::Value;

/// A message carried over a connection.
///
/// 在连接上传输的消息。
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A text frame.
    /// 文本帧。
    Text(String),
    /// A binary frame.
    /// 二进制帧。
    Binary(Bytes),
    /// A structured value that has not been serialized yet.
    /// 尚未序列化的结构化值。
    Structured(Value),
}

impl Payload {
    /// Returns the text content, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Binary(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(data))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

/// Converts a payload into its wire form before it is sent.
///
/// 在发送之前将载荷转换为其线上形式。
pub trait Serializer: Send + Sync + 'static {
    /// Serializes the payload.
    fn serialize(&self, payload: Payload) -> Result<Payload>;
}

/// Serializes structured and text payloads to JSON text. Binary payloads pass through.
///
/// 将结构化载荷和文本载荷序列化为JSON文本。二进制载荷原样通过。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, payload: Payload) -> Result<Payload> {
        match payload {
            Payload::Structured(value) => Ok(Payload::Text(serde_json::to_string(&value)?)),
            Payload::Text(text) => Ok(Payload::Text(serde_json::to_string(&text)?)),
            binary @ Payload::Binary(_) => Ok(binary),
        }
    }
}
