use serde::{Deserialize, Serialize};

/// 框架配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VaultConfig {
    /// 安全内存池总容量（字节），进程生命周期内一次性锁定
    pub pool_capacity: usize,
    /// 内存池的分配块大小（字节），必须为二的幂
    pub pool_block_size: usize,
    /// 注册表槽位数量
    pub registry_capacity: usize,
    /// 新密钥的默认有效期（天）
    pub validity_days: i64,
    /// 新密钥的默认使用次数上限
    pub max_usage: u64,
    /// PBKDF2 的默认迭代次数
    pub pbkdf2_iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 1024 * 1024, // 1 MiB
            pool_block_size: 64,
            registry_capacity: 1000,
            validity_days: 365,
            max_usage: 1_000_000,
            pbkdf2_iterations: 100_000,
        }
    }
}
