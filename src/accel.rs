//! 硬件加速后端接口
//!
//! 能力多态的插槽：注册表与加密引擎只依赖 [`Accelerator`] 特征，
//! 不关心背后是专用硬件还是纯软件。后端缺席（[`SoftwareOnly`]）是默认
//! 且完整支持的路径；后端出错时调用方记录警告并退回软件实现。
use crate::common::errors::Error;
use crate::common::traits::KeyAlgorithm;
use crate::engine::symmetric::CipherOutput;
use zeroize::Zeroizing;

/// 可插拔的加速后端。
///
/// `supports` 为能力探测：返回 `false` 的算法不会收到任何调用。
/// 其余方法的失败不是致命错误，调用方总是可以退回软件路径。
pub trait Accelerator: Send + Sync {
    /// 后端名称，用于日志
    fn name(&self) -> &'static str;

    fn supports(&self, algorithm: KeyAlgorithm) -> bool;

    /// 生成密钥材料：对称算法返回原始密钥字节，非对称算法返回 PKCS#8 DER。
    fn generate_key(&self, algorithm: KeyAlgorithm) -> Result<Zeroizing<Vec<u8>>, Error>;

    /// 认证加密，nonce 由后端自行生成并随结果返回。
    fn encrypt(
        &self,
        algorithm: KeyAlgorithm,
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherOutput, Error>;

    /// 认证解密。
    fn decrypt(
        &self,
        algorithm: KeyAlgorithm,
        key: &[u8],
        ciphertext: &[u8],
        additional_data: Option<&[u8]>,
        nonce: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, Error>;
}

/// 纯软件变体：不声明任何能力，所有操作都走软件引擎。
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareOnly;

impl Accelerator for SoftwareOnly {
    fn name(&self) -> &'static str {
        "software"
    }

    fn supports(&self, _algorithm: KeyAlgorithm) -> bool {
        false
    }

    fn generate_key(&self, algorithm: KeyAlgorithm) -> Result<Zeroizing<Vec<u8>>, Error> {
        Err(Error::unsupported(algorithm, "hardware key generation"))
    }

    fn encrypt(
        &self,
        algorithm: KeyAlgorithm,
        _key: &[u8],
        _plaintext: &[u8],
        _additional_data: Option<&[u8]>,
    ) -> Result<CipherOutput, Error> {
        Err(Error::unsupported(algorithm, "hardware encryption"))
    }

    fn decrypt(
        &self,
        algorithm: KeyAlgorithm,
        _key: &[u8],
        _ciphertext: &[u8],
        _additional_data: Option<&[u8]>,
        _nonce: &[u8],
        _tag: &[u8],
    ) -> Result<Vec<u8>, Error> {
        Err(Error::unsupported(algorithm, "hardware decryption"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_only_claims_nothing() {
        let backend = SoftwareOnly;
        assert_eq!(backend.name(), "software");
        assert!(!backend.supports(KeyAlgorithm::Aes256Gcm));
        assert!(!backend.supports(KeyAlgorithm::Rsa2048));
        assert!(backend.generate_key(KeyAlgorithm::Aes256Gcm).is_err());
    }
}
