//! `Vault`：框架的组合根与公共操作入口
//!
//! 一个显式构造的实例，持有内存池、熵源、注册表与加速后端。没有进程级
//! 单例；需要单实例语义的应用在自己的组合根中持有一个 `Vault`（或
//! `Arc<Vault>`）即可。
//!
//! 每个消耗密钥的操作都遵循同一条路径：按 id 查找记录、在记录锁下重查
//! 可用性、执行原语、仅在成功后把使用计数加一。同一把密钥上的操作因此
//! 严格串行；不同密钥上的操作在表级读锁下完全并行。
use crate::accel::{Accelerator, SoftwareOnly};
use crate::common::config::VaultConfig;
use crate::common::errors::Error;
use crate::common::traits::{KeyAlgorithm, KeyId, KeyInfo, KeyKind};
use crate::engine::symmetric::CipherOutput;
use crate::engine::{asymmetric, kdf, symmetric};
use crate::entropy::EntropySource;
use crate::mempool::SecurePool;
use crate::registry::{KeyOptions, KeyRegistry};
use chrono::Utc;
use secrecy::SecretBox;
use std::sync::Arc;
use zeroize::Zeroizing;

pub struct Vault {
    entropy: Arc<EntropySource>,
    registry: KeyRegistry,
    accel: Arc<dyn Accelerator>,
    config: VaultConfig,
}

impl Vault {
    /// 以纯软件路径构造。
    pub fn new(config: VaultConfig) -> Result<Self, Error> {
        Self::with_accelerator(config, Arc::new(SoftwareOnly))
    }

    /// 以给定的加速后端构造。后端只在声明支持某算法时被调用，
    /// 其失败总是回退到软件引擎。
    pub fn with_accelerator(
        config: VaultConfig,
        accel: Arc<dyn Accelerator>,
    ) -> Result<Self, Error> {
        let pool = SecurePool::new(config.pool_capacity, config.pool_block_size)?;
        let entropy = Arc::new(EntropySource::new());
        let registry = KeyRegistry::new(&config, pool, Arc::clone(&entropy))?;
        Ok(Self {
            entropy,
            registry,
            accel,
            config,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // --- 密钥生命周期 ---

    /// 生成一把新密钥，返回其 id。
    pub fn generate_key(&self, algorithm: KeyAlgorithm) -> Result<KeyId, Error> {
        self.registry
            .generate(algorithm, KeyOptions::default(), self.accel.as_ref())
    }

    /// 以自定义有效期或使用上限生成密钥。
    pub fn generate_key_with(
        &self,
        algorithm: KeyAlgorithm,
        options: KeyOptions,
    ) -> Result<KeyId, Error> {
        self.registry
            .generate(algorithm, options, self.accel.as_ref())
    }

    /// 导入对端公钥（SPKI DER），用于验签或作为 ECDH 对端。
    pub fn import_public_key(
        &self,
        algorithm: KeyAlgorithm,
        spki_der: &[u8],
    ) -> Result<KeyId, Error> {
        self.registry
            .import_public(algorithm, spki_der, KeyOptions::default())
    }

    /// 导出公钥 SPKI DER。私钥记录现场派生公钥的一半；对称密钥没有公钥。
    /// 不消耗使用预算。
    pub fn export_public_key(&self, id: KeyId) -> Result<Vec<u8>, Error> {
        let record = self.registry.lookup(id)?;
        match record.kind() {
            KeyKind::AsymmetricPublic => Ok(record.material().to_vec()),
            KeyKind::AsymmetricPrivate => {
                asymmetric::public_key_der(record.algorithm(), record.material())
            }
            KeyKind::Symmetric => {
                Err(Error::unsupported(record.algorithm(), "public key export"))
            }
        }
    }

    /// 吊销密钥。单向，幂等，id 不存在时为空操作。
    pub fn revoke_key(&self, id: KeyId) {
        self.registry.revoke(id);
    }

    pub fn key_info(&self, id: KeyId) -> Result<KeyInfo, Error> {
        self.registry.info(id)
    }

    pub fn list_keys(&self) -> Vec<KeyInfo> {
        self.registry.list()
    }

    /// 销毁全部密钥记录，材料清零归还。仅用于收尾。
    pub fn destroy_all(&self) {
        self.registry.destroy_all();
    }

    // --- 认证加密 ---

    /// 认证加密。每次调用从熵源取新 nonce，输出密文、nonce 与标签。
    pub fn encrypt(
        &self,
        id: KeyId,
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherOutput, Error> {
        let record = self.registry.lookup(id)?;
        if record.kind() != KeyKind::Symmetric {
            return Err(Error::unsupported(
                record.algorithm(),
                "authenticated encryption",
            ));
        }

        let mut state = record.lock_state();
        state.ensure_usable(id, Utc::now())?;
        let output = self.offer_encrypt(
            record.algorithm(),
            record.material(),
            plaintext,
            additional_data,
        )?;
        state.usage_count += 1;
        Ok(output)
    }

    /// 认证解密。标签校验失败时不返回任何明文，使用计数不前进。
    pub fn decrypt(
        &self,
        id: KeyId,
        ciphertext: &[u8],
        additional_data: Option<&[u8]>,
        nonce: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let record = self.registry.lookup(id)?;
        if record.kind() != KeyKind::Symmetric {
            return Err(Error::unsupported(
                record.algorithm(),
                "authenticated decryption",
            ));
        }

        let mut state = record.lock_state();
        state.ensure_usable(id, Utc::now())?;
        let plaintext = self.offer_decrypt(
            record.algorithm(),
            record.material(),
            ciphertext,
            additional_data,
            nonce,
            tag,
        )?;
        state.usage_count += 1;
        Ok(plaintext)
    }

    fn offer_encrypt(
        &self,
        algorithm: KeyAlgorithm,
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<CipherOutput, Error> {
        if self.accel.supports(algorithm) {
            match self.accel.encrypt(algorithm, key, plaintext, additional_data) {
                Ok(output) => return Ok(output),
                Err(error) => {
                    tracing::warn!(
                        backend = self.accel.name(),
                        %algorithm,
                        %error,
                        "acceleration backend failed, falling back to software encryption"
                    );
                }
            }
        }
        symmetric::encrypt(algorithm, key, plaintext, additional_data, &self.entropy)
    }

    fn offer_decrypt(
        &self,
        algorithm: KeyAlgorithm,
        key: &[u8],
        ciphertext: &[u8],
        additional_data: Option<&[u8]>,
        nonce: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, Error> {
        if self.accel.supports(algorithm) {
            match self
                .accel
                .decrypt(algorithm, key, ciphertext, additional_data, nonce, tag)
            {
                Ok(plaintext) => return Ok(plaintext),
                Err(error) => {
                    tracing::warn!(
                        backend = self.accel.name(),
                        %algorithm,
                        %error,
                        "acceleration backend failed, falling back to software decryption"
                    );
                }
            }
        }
        symmetric::decrypt(algorithm, key, ciphertext, additional_data, nonce, tag)
    }

    // --- 签名 ---

    /// 用私钥记录签名。RSA 走 PSS-SHA256，EC 走 ECDSA。
    pub fn sign(&self, id: KeyId, data: &[u8]) -> Result<Vec<u8>, Error> {
        let record = self.registry.lookup(id)?;
        if record.kind() != KeyKind::AsymmetricPrivate {
            return Err(Error::unsupported(record.algorithm(), "signing"));
        }

        let mut state = record.lock_state();
        state.ensure_usable(id, Utc::now())?;
        let signature = asymmetric::sign(record.algorithm(), record.material(), data)?;
        state.usage_count += 1;
        Ok(signature)
    }

    /// 验证签名。接受私钥记录（内部派生公钥）或导入的公钥记录。
    ///
    /// 验签是公钥操作：不检查生命周期，也不消耗使用预算。否则任何
    /// 持有签名的一方都能耗尽签名密钥的预算。格式不合法的签名返回
    /// `Ok(false)` 而非错误。
    pub fn verify(&self, id: KeyId, data: &[u8], signature: &[u8]) -> Result<bool, Error> {
        let record = self.registry.lookup(id)?;
        match record.kind() {
            KeyKind::AsymmetricPrivate => {
                asymmetric::verify_with_private(record.algorithm(), record.material(), data, signature)
            }
            KeyKind::AsymmetricPublic => {
                asymmetric::verify_with_public(record.algorithm(), record.material(), data, signature)
            }
            KeyKind::Symmetric => Err(Error::unsupported(
                record.algorithm(),
                "signature verification",
            )),
        }
    }

    // --- 密钥协商 ---

    /// ECDH 协商：本地私钥记录与对端 SPKI DER 公钥，输出原始共享密钥。
    /// 消耗本地密钥的使用预算。
    pub fn agree(&self, id: KeyId, peer_spki_der: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
        let record = self.registry.lookup(id)?;
        if record.kind() != KeyKind::AsymmetricPrivate {
            return Err(Error::unsupported(record.algorithm(), "key agreement"));
        }

        let mut state = record.lock_state();
        state.ensure_usable(id, Utc::now())?;
        let shared = asymmetric::agree(record.algorithm(), record.material(), peer_spki_der)?;
        state.usage_count += 1;
        Ok(shared)
    }

    // --- 哈希与派生 ---

    pub fn hash_sha256(&self, data: &[u8]) -> [u8; 32] {
        kdf::hash_sha256(data)
    }

    pub fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> [u8; 32] {
        kdf::hmac_sha256(key, data)
    }

    /// PBKDF2-HMAC-SHA256 口令派生。`iterations` 为 `None` 时取配置默认值。
    pub fn derive_key_pbkdf(
        &self,
        password: &SecretBox<[u8]>,
        salt: &[u8],
        iterations: Option<u32>,
        length: usize,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        kdf::derive_key_pbkdf2(
            password,
            salt,
            iterations.unwrap_or(self.config.pbkdf2_iterations),
            length,
        )
    }

    /// HKDF-SHA256 提取-扩展派生。
    pub fn derive_key_hkdf(
        &self,
        ikm: &[u8],
        salt: Option<&[u8]>,
        info: &[u8],
        length: usize,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        kdf::derive_key_hkdf(ikm, salt, info, length)
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("registry", &self.registry)
            .field("backend", &self.accel.name())
            .finish()
    }
}
