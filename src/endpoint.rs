//! 端点地址的校验与规范化。
//! Endpoint address validation and normalization.

use crate::error::{Error, Result};
use url::Url;

/// Scheme prefixes accepted by the validator, compared case-insensitively.
const ACCEPTED_SCHEMES: [&str; 2] = ["ws://", "wss://"];

/// An endpoint address as supplied by a consumer, before normalization.
///
/// 消费者提供的端点地址（规范化之前）。可以是单个地址，也可以是按顺序排列的候选地址列表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSpec {
    /// A single address.
    /// 单个地址。
    Single(String),
    /// An ordered list of candidate addresses.
    /// 按顺序排列的候选地址列表。
    List(Vec<String>),
}

impl EndpointSpec {
    /// Returns the candidate addresses in order. A single address is a one-element list.
    ///
    /// 按顺序返回候选地址。单个地址被视为只有一个元素的列表。
    pub fn candidates(&self) -> &[String] {
        match self {
            EndpointSpec::Single(address) => std::slice::from_ref(address),
            EndpointSpec::List(addresses) => addresses,
        }
    }

    /// Shorthand for [`validate`].
    pub fn is_valid(&self) -> bool {
        validate(self)
    }
}

impl From<&str> for EndpointSpec {
    fn from(address: &str) -> Self {
        EndpointSpec::Single(address.to_owned())
    }
}

impl From<String> for EndpointSpec {
    fn from(address: String) -> Self {
        EndpointSpec::Single(address)
    }
}

impl From<Vec<String>> for EndpointSpec {
    fn from(addresses: Vec<String>) -> Self {
        EndpointSpec::List(addresses)
    }
}

impl From<&[&str]> for EndpointSpec {
    fn from(addresses: &[&str]) -> Self {
        EndpointSpec::List(addresses.iter().map(|a| (*a).to_owned()).collect())
    }
}

impl std::fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointSpec::Single(address) => f.write_str(address),
            EndpointSpec::List(addresses) => write!(f, "[{}]", addresses.join(", ")),
        }
    }
}

/// Checks that every candidate address is non-empty and starts with an accepted
/// WebSocket scheme.
///
/// An empty list is rejected. This is a pure predicate; nothing is connected or recorded.
///
/// 检查每个候选地址都非空且以可接受的WebSocket协议开头。空列表会被拒绝。
pub fn validate(endpoint: &EndpointSpec) -> bool {
    let candidates = endpoint.candidates();
    !candidates.is_empty() && candidates.iter().all(|address| has_accepted_scheme(address))
}

fn has_accepted_scheme(address: &str) -> bool {
    !address.is_empty()
        && ACCEPTED_SCHEMES.iter().any(|scheme| {
            address
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        })
}

/// Normalizes an address the way a WebSocket client reports its URL.
///
/// Root-level addresses gain a trailing path separator, so `ws://example.com`
/// becomes `ws://example.com/`. The scheme and host are lower-cased.
///
/// 按照WebSocket客户端报告URL的方式规范化地址。根级地址会追加一个尾部路径分隔符。
pub fn normalize(address: &str) -> Result<String> {
    if !has_accepted_scheme(address) {
        return Err(Error::InvalidEndpoint(address.to_owned()));
    }
    Ok(Url::parse(address)?.to_string())
}
