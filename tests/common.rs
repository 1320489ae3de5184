//! 集成测试的共享辅助
#![allow(dead_code)]

use std::sync::Once;
use vault_kit::{Vault, VaultConfig};

static INIT: Once = Once::new();

/// 初始化一次测试用的 tracing 订阅者，便于失败时查看框架日志。
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

pub fn setup_vault() -> Vault {
    init_tracing();
    Vault::new(VaultConfig::default()).unwrap()
}
