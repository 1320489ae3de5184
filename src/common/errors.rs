use crate::common::traits::{KeyAlgorithm, KeyId};
use thiserror::Error;

/// 密钥不可用的具体原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusableReason {
    #[error("revoked")]
    Revoked,
    #[error("expired")]
    Expired,
    #[error("usage budget exhausted")]
    UsageExhausted,
}

/// 框架操作可能遇到的错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("secure pool cannot satisfy an allocation of {requested} bytes")]
    Allocation { requested: usize },

    #[error("all entropy sources failed")]
    Rng,

    #[error("key not found: {0}")]
    KeyNotFound(KeyId),

    #[error("key {id} is unusable: {reason}")]
    KeyUnusable { id: KeyId, reason: UnusableReason },

    #[error("algorithm {algorithm} does not support {operation}")]
    UnsupportedAlgorithm {
        algorithm: KeyAlgorithm,
        operation: &'static str,
    },

    #[error("key registry is full ({capacity} slots)")]
    RegistryFull { capacity: usize },

    /// 解密认证失败。标签不匹配与原语内部的其它失败统一归并到这里，
    /// 调用方无法据此区分失败的具体环节。
    #[error("authentication failed")]
    Authentication,

    #[error("cryptographic primitive failed: {0}")]
    Primitive(String),
}

impl Error {
    pub(crate) fn unsupported(algorithm: KeyAlgorithm, operation: &'static str) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm,
            operation,
        }
    }
}
