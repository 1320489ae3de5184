use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 密钥的唯一标识符。
///
/// 由注册表在创建时从单调递增计数器分配，进程生命周期内永不复用。
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct KeyId(pub u32);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 密钥类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// 对称密钥，材料为原始密钥字节
    Symmetric,
    /// 非对称私钥，材料为 PKCS#8 DER
    AsymmetricPrivate,
    /// 非对称公钥，材料为 SPKI DER
    AsymmetricPublic,
}

/// 支持的算法标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Aes128Gcm,
    Aes256Gcm,
    Aes128Cbc,
    Aes256Cbc,
    ChaCha20Poly1305,
    Rsa2048,
    Rsa4096,
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
    EcdhP256,
    EcdhP384,
}

impl KeyAlgorithm {
    /// 该算法生成的密钥属于哪个类别。
    pub fn kind(self) -> KeyKind {
        if self.is_symmetric() {
            KeyKind::Symmetric
        } else {
            KeyKind::AsymmetricPrivate
        }
    }

    pub fn is_symmetric(self) -> bool {
        matches!(
            self,
            KeyAlgorithm::Aes128Gcm
                | KeyAlgorithm::Aes256Gcm
                | KeyAlgorithm::Aes128Cbc
                | KeyAlgorithm::Aes256Cbc
                | KeyAlgorithm::ChaCha20Poly1305
        )
    }

    /// 是否为认证加密算法。CBC 变体保留在标识空间中但不参与任何操作。
    pub fn is_aead(self) -> bool {
        matches!(
            self,
            KeyAlgorithm::Aes128Gcm | KeyAlgorithm::Aes256Gcm | KeyAlgorithm::ChaCha20Poly1305
        )
    }

    /// 对称密钥的原始字节长度，非对称算法返回 `None`。
    pub fn symmetric_key_len(self) -> Option<usize> {
        match self {
            KeyAlgorithm::Aes128Gcm | KeyAlgorithm::Aes128Cbc => Some(16),
            KeyAlgorithm::Aes256Gcm
            | KeyAlgorithm::Aes256Cbc
            | KeyAlgorithm::ChaCha20Poly1305 => Some(32),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyAlgorithm::Aes128Gcm => "AES-128-GCM",
            KeyAlgorithm::Aes256Gcm => "AES-256-GCM",
            KeyAlgorithm::Aes128Cbc => "AES-128-CBC",
            KeyAlgorithm::Aes256Cbc => "AES-256-CBC",
            KeyAlgorithm::ChaCha20Poly1305 => "ChaCha20-Poly1305",
            KeyAlgorithm::Rsa2048 => "RSA-2048",
            KeyAlgorithm::Rsa4096 => "RSA-4096",
            KeyAlgorithm::EcdsaP256 => "ECDSA-P256",
            KeyAlgorithm::EcdsaP384 => "ECDSA-P384",
            KeyAlgorithm::EcdsaP521 => "ECDSA-P521",
            KeyAlgorithm::EcdhP256 => "ECDH-P256",
            KeyAlgorithm::EcdhP384 => "ECDH-P384",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 密钥元数据快照。
///
/// 读取时在记录锁下拷贝生成，不持有密钥材料，可随意传递与序列化。
#[derive(Clone, Debug, Serialize)]
pub struct KeyInfo {
    pub id: KeyId,
    pub kind: KeyKind,
    pub algorithm: KeyAlgorithm,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub usage_count: u64,
    pub max_usage: u64,
    pub revoked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_classification() {
        assert!(KeyAlgorithm::Aes256Gcm.is_symmetric());
        assert!(KeyAlgorithm::Aes256Gcm.is_aead());
        assert!(KeyAlgorithm::Aes256Cbc.is_symmetric());
        assert!(!KeyAlgorithm::Aes256Cbc.is_aead());
        assert!(!KeyAlgorithm::Rsa2048.is_symmetric());
        assert_eq!(KeyAlgorithm::Rsa2048.kind(), KeyKind::AsymmetricPrivate);
        assert_eq!(KeyAlgorithm::ChaCha20Poly1305.kind(), KeyKind::Symmetric);
    }

    #[test]
    fn symmetric_key_lengths() {
        assert_eq!(KeyAlgorithm::Aes128Gcm.symmetric_key_len(), Some(16));
        assert_eq!(KeyAlgorithm::Aes256Gcm.symmetric_key_len(), Some(32));
        assert_eq!(KeyAlgorithm::ChaCha20Poly1305.symmetric_key_len(), Some(32));
        assert_eq!(KeyAlgorithm::EcdsaP256.symmetric_key_len(), None);
    }

    #[test]
    fn display_labels() {
        assert_eq!(KeyAlgorithm::Aes256Gcm.to_string(), "AES-256-GCM");
        assert_eq!(KeyAlgorithm::EcdhP384.to_string(), "ECDH-P384");
        assert_eq!(KeyId(7).to_string(), "7");
    }
}
