//! 密钥注册表
//!
//! 一张有界的记录表：表级读写锁管理槽位结构，记录级互斥锁管理每把密钥的
//! 生命周期字段。记录由注册表独占拥有，调用方每次操作前都应重新按 id
//! 查找，不得跨操作缓存引用。
//!
//! 没有按 id 删除的接口：被吊销的记录继续占用槽位，直到
//! [`KeyRegistry::destroy_all`] 或整个注册表析构。
use crate::accel::Accelerator;
use crate::common::config::VaultConfig;
use crate::common::errors::{Error, UnusableReason};
use crate::common::traits::{KeyAlgorithm, KeyId, KeyInfo, KeyKind};
use crate::engine::{asymmetric, symmetric};
use crate::entropy::EntropySource;
use crate::mempool::{SecureBuffer, SecurePool};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use zeroize::Zeroizing;

/// 记录锁保护下的可变生命周期字段。
#[derive(Debug)]
pub(crate) struct LifecycleState {
    pub expires_at: DateTime<Utc>,
    pub usage_count: u64,
    pub max_usage: u64,
    pub revoked: bool,
}

impl LifecycleState {
    /// 可用性三条件：未吊销、未过期、未用尽。
    /// 每个消耗密钥的操作都必须在记录锁下、调用原语前立即重查。
    pub fn ensure_usable(&self, id: KeyId, now: DateTime<Utc>) -> Result<(), Error> {
        if self.revoked {
            return Err(Error::KeyUnusable {
                id,
                reason: UnusableReason::Revoked,
            });
        }
        if now >= self.expires_at {
            return Err(Error::KeyUnusable {
                id,
                reason: UnusableReason::Expired,
            });
        }
        if self.usage_count >= self.max_usage {
            return Err(Error::KeyUnusable {
                id,
                reason: UnusableReason::UsageExhausted,
            });
        }
        Ok(())
    }
}

/// 一条密钥记录。
///
/// 身份字段（id、类别、算法、材料、创建时间）在创建后不再变化；
/// 生命周期字段集中在 [`LifecycleState`] 中，只能经由记录锁访问。
/// 材料所在的内存块随记录析构清零并归还，恰好一次。
pub struct KeyRecord {
    id: KeyId,
    kind: KeyKind,
    algorithm: KeyAlgorithm,
    created_at: DateTime<Utc>,
    material: SecureBuffer,
    state: Mutex<LifecycleState>,
}

impl KeyRecord {
    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn material(&self) -> &[u8] {
        self.material.as_slice()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock()
    }

    /// 元数据快照，在记录锁下拷贝。
    pub fn info(&self) -> KeyInfo {
        let state = self.state.lock();
        KeyInfo {
            id: self.id,
            kind: self.kind,
            algorithm: self.algorithm,
            created_at: self.created_at,
            expires_at: state.expires_at,
            usage_count: state.usage_count,
            max_usage: state.max_usage,
            revoked: state.revoked,
        }
    }
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// 创建密钥时的生命周期选项，未指定的字段取配置默认值。
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyOptions {
    pub validity: Option<Duration>,
    pub max_usage: Option<u64>,
}

/// 有界的密钥表。
pub struct KeyRegistry {
    pool: Arc<SecurePool>,
    entropy: Arc<EntropySource>,
    slots: RwLock<Vec<Option<Arc<KeyRecord>>>>,
    next_id: AtomicU32,
    default_validity: Duration,
    default_max_usage: u64,
}

impl KeyRegistry {
    pub fn new(
        config: &VaultConfig,
        pool: Arc<SecurePool>,
        entropy: Arc<EntropySource>,
    ) -> Result<Self, Error> {
        if config.registry_capacity == 0 {
            return Err(Error::Config(
                "registry capacity must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            pool,
            entropy,
            slots: RwLock::new((0..config.registry_capacity).map(|_| None).collect()),
            next_id: AtomicU32::new(1),
            default_validity: Duration::days(config.validity_days),
            default_max_usage: config.max_usage,
        })
    }

    /// 生成一把新密钥并登记。
    ///
    /// 材料优先交给声明支持该算法的加速后端；后端失败则记录警告并退回
    /// 软件生成。材料生成或分配失败时不会在表中留下任何记录，
    /// 已取得的内存块随之清零归还。
    pub fn generate(
        &self,
        algorithm: KeyAlgorithm,
        options: KeyOptions,
        accel: &dyn Accelerator,
    ) -> Result<KeyId, Error> {
        let material = if accel.supports(algorithm) {
            match accel.generate_key(algorithm) {
                Ok(material) => material,
                Err(error) => {
                    tracing::warn!(
                        backend = accel.name(),
                        %algorithm,
                        %error,
                        "acceleration backend failed, falling back to software generation"
                    );
                    self.software_generate(algorithm)?
                }
            }
        } else {
            self.software_generate(algorithm)?
        };

        self.insert(algorithm.kind(), algorithm, &material, options)
    }

    fn software_generate(&self, algorithm: KeyAlgorithm) -> Result<Zeroizing<Vec<u8>>, Error> {
        if algorithm.is_symmetric() {
            symmetric::generate_key(algorithm, &self.entropy)
        } else {
            asymmetric::generate_keypair(algorithm, &self.entropy)
        }
    }

    /// 导入一把对端公钥（SPKI DER），登记为公钥记录。
    pub fn import_public(
        &self,
        algorithm: KeyAlgorithm,
        spki_der: &[u8],
        options: KeyOptions,
    ) -> Result<KeyId, Error> {
        asymmetric::validate_public_key(algorithm, spki_der)?;
        self.insert(KeyKind::AsymmetricPublic, algorithm, spki_der, options)
    }

    fn insert(
        &self,
        kind: KeyKind,
        algorithm: KeyAlgorithm,
        material_bytes: &[u8],
        options: KeyOptions,
    ) -> Result<KeyId, Error> {
        let mut material = self.pool.allocate(material_bytes.len())?;
        material.as_mut_slice().copy_from_slice(material_bytes);

        let now = Utc::now();
        let id = KeyId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(KeyRecord {
            id,
            kind,
            algorithm,
            created_at: now,
            material,
            state: Mutex::new(LifecycleState {
                expires_at: now + options.validity.unwrap_or(self.default_validity),
                usage_count: 0,
                max_usage: options.max_usage.unwrap_or(self.default_max_usage),
                revoked: false,
            }),
        });

        let mut slots = self.slots.write();
        let capacity = slots.len();
        let Some(slot) = slots.iter_mut().find(|slot| slot.is_none()) else {
            // record 在此被丢弃，其内存块清零归还
            return Err(Error::RegistryFull { capacity });
        };
        *slot = Some(record);
        drop(slots);

        tracing::debug!(%id, %algorithm, ?kind, "key registered");
        Ok(id)
    }

    /// 按 id 查找记录。
    ///
    /// 吊销的记录同样返回：调用方在操作时报告 [`Error::KeyUnusable`]，
    /// 只有 id 不存在才是 [`Error::KeyNotFound`]。
    pub fn lookup(&self, id: KeyId) -> Result<Arc<KeyRecord>, Error> {
        let slots = self.slots.read();
        slots
            .iter()
            .flatten()
            .find(|record| record.id == id)
            .cloned()
            .ok_or(Error::KeyNotFound(id))
    }

    /// 吊销密钥。单向转换，幂等，id 不存在时静默返回。
    pub fn revoke(&self, id: KeyId) {
        if let Ok(record) = self.lookup(id) {
            let mut state = record.lock_state();
            if !state.revoked {
                state.revoked = true;
                tracing::info!(%id, "key revoked");
            }
        }
    }

    pub fn info(&self, id: KeyId) -> Result<KeyInfo, Error> {
        Ok(self.lookup(id)?.info())
    }

    /// 全部记录的元数据快照，包括已吊销的。
    pub fn list(&self) -> Vec<KeyInfo> {
        self.slots
            .read()
            .iter()
            .flatten()
            .map(|record| record.info())
            .collect()
    }

    /// 当前占用的槽位数量。
    pub fn len(&self) -> usize {
        self.slots.read().iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 销毁全部记录。材料随记录析构清零并归还内存池。
    pub fn destroy_all(&self) {
        let mut slots = self.slots.write();
        let destroyed = slots.iter().flatten().count();
        for slot in slots.iter_mut() {
            *slot = None;
        }
        tracing::debug!(destroyed, "registry destroyed");
    }
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("occupied", &self.len())
            .field("capacity", &self.slots.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::SoftwareOnly;

    fn registry_with_capacity(capacity: usize) -> KeyRegistry {
        let config = VaultConfig {
            registry_capacity: capacity,
            ..VaultConfig::default()
        };
        let pool = SecurePool::new(config.pool_capacity, config.pool_block_size).unwrap();
        KeyRegistry::new(&config, pool, Arc::new(EntropySource::new())).unwrap()
    }

    #[test]
    fn test_generate_and_lookup() {
        let registry = registry_with_capacity(4);
        let id = registry
            .generate(KeyAlgorithm::Aes256Gcm, KeyOptions::default(), &SoftwareOnly)
            .unwrap();

        let record = registry.lookup(id).unwrap();
        assert_eq!(record.id(), id);
        assert_eq!(record.kind(), KeyKind::Symmetric);
        assert_eq!(record.material().len(), 32);

        let info = registry.info(id).unwrap();
        assert_eq!(info.usage_count, 0);
        assert!(!info.revoked);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let registry = registry_with_capacity(8);
        let mut previous = 0;
        for _ in 0..4 {
            let id = registry
                .generate(
                    KeyAlgorithm::ChaCha20Poly1305,
                    KeyOptions::default(),
                    &SoftwareOnly,
                )
                .unwrap();
            assert!(id.0 > previous);
            previous = id.0;
        }
    }

    #[test]
    fn test_lookup_missing_key() {
        let registry = registry_with_capacity(2);
        assert!(matches!(
            registry.lookup(KeyId(99)),
            Err(Error::KeyNotFound(KeyId(99)))
        ));
    }

    #[test]
    fn test_registry_full() {
        let registry = registry_with_capacity(2);
        registry
            .generate(KeyAlgorithm::Aes128Gcm, KeyOptions::default(), &SoftwareOnly)
            .unwrap();
        registry
            .generate(KeyAlgorithm::Aes128Gcm, KeyOptions::default(), &SoftwareOnly)
            .unwrap();
        let err = registry
            .generate(KeyAlgorithm::Aes128Gcm, KeyOptions::default(), &SoftwareOnly)
            .unwrap_err();
        assert!(matches!(err, Error::RegistryFull { capacity: 2 }));
    }

    #[test]
    fn test_registry_full_releases_pool_blocks() {
        let registry = registry_with_capacity(1);
        let free_before = registry.pool.free_blocks();
        registry
            .generate(KeyAlgorithm::Aes256Gcm, KeyOptions::default(), &SoftwareOnly)
            .unwrap();
        let free_after_first = registry.pool.free_blocks();
        assert!(free_after_first < free_before);

        // 表满导致的失败不得泄漏内存池块
        let _ = registry
            .generate(KeyAlgorithm::Aes256Gcm, KeyOptions::default(), &SoftwareOnly)
            .unwrap_err();
        assert_eq!(registry.pool.free_blocks(), free_after_first);
    }

    #[test]
    fn test_revoke_is_idempotent_and_one_way() {
        let registry = registry_with_capacity(2);
        let id = registry
            .generate(KeyAlgorithm::Aes256Gcm, KeyOptions::default(), &SoftwareOnly)
            .unwrap();

        registry.revoke(id);
        assert!(registry.info(id).unwrap().revoked);
        registry.revoke(id);
        assert!(registry.info(id).unwrap().revoked);

        // 不存在的 id 静默返回
        registry.revoke(KeyId(1000));
    }

    #[test]
    fn test_revoked_record_still_occupies_slot() {
        let registry = registry_with_capacity(1);
        let id = registry
            .generate(KeyAlgorithm::Aes256Gcm, KeyOptions::default(), &SoftwareOnly)
            .unwrap();
        registry.revoke(id);
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.generate(KeyAlgorithm::Aes256Gcm, KeyOptions::default(), &SoftwareOnly),
            Err(Error::RegistryFull { .. })
        ));
    }

    #[test]
    fn test_destroy_all_returns_pool_blocks() {
        let registry = registry_with_capacity(8);
        let free_before = registry.pool.free_blocks();
        for _ in 0..4 {
            registry
                .generate(KeyAlgorithm::Aes256Gcm, KeyOptions::default(), &SoftwareOnly)
                .unwrap();
        }
        assert!(registry.pool.free_blocks() < free_before);

        registry.destroy_all();
        assert!(registry.is_empty());
        assert_eq!(registry.pool.free_blocks(), free_before);
    }

    #[test]
    fn test_custom_options() {
        let registry = registry_with_capacity(2);
        let id = registry
            .generate(
                KeyAlgorithm::Aes256Gcm,
                KeyOptions {
                    validity: Some(Duration::days(7)),
                    max_usage: Some(5),
                },
                &SoftwareOnly,
            )
            .unwrap();
        let info = registry.info(id).unwrap();
        assert_eq!(info.max_usage, 5);
        assert!(info.expires_at <= Utc::now() + Duration::days(7));
    }

    #[test]
    fn test_usability_predicate() {
        let now = Utc::now();
        let mut state = LifecycleState {
            expires_at: now + Duration::hours(1),
            usage_count: 0,
            max_usage: 2,
            revoked: false,
        };
        let id = KeyId(1);

        assert!(state.ensure_usable(id, now).is_ok());

        state.usage_count = 2;
        assert!(matches!(
            state.ensure_usable(id, now),
            Err(Error::KeyUnusable {
                reason: UnusableReason::UsageExhausted,
                ..
            })
        ));

        state.usage_count = 0;
        assert!(matches!(
            state.ensure_usable(id, now + Duration::hours(2)),
            Err(Error::KeyUnusable {
                reason: UnusableReason::Expired,
                ..
            })
        ));

        state.revoked = true;
        assert!(matches!(
            state.ensure_usable(id, now),
            Err(Error::KeyUnusable {
                reason: UnusableReason::Revoked,
                ..
            })
        ));
    }
}
