//!
//! 并发测试
//!
//! 多线程同时调用框架：id 分配必须无碰撞，不同密钥上的操作互不阻塞，
//! 同一密钥上的使用计数必须线性一致。
//!

mod common;

use common::init_tracing;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use vault_kit::{Error, KeyAlgorithm, Vault, VaultConfig};

#[test]
fn test_concurrent_generation_yields_unique_ids() {
    init_tracing();
    let vault = Arc::new(Vault::new(VaultConfig::default()).unwrap());

    const THREADS: usize = 8;
    const KEYS_PER_THREAD: usize = 125;

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let vault = Arc::clone(&vault);
        handles.push(thread::spawn(move || {
            let mut ids = Vec::with_capacity(KEYS_PER_THREAD);
            for _ in 0..KEYS_PER_THREAD {
                ids.push(vault.generate_key(KeyAlgorithm::Aes256Gcm).unwrap());
            }
            ids
        }));
    }

    let mut all_ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(all_ids.insert(id), "duplicate key id {id}");
        }
    }
    assert_eq!(all_ids.len(), THREADS * KEYS_PER_THREAD);
    assert_eq!(vault.list_keys().len(), THREADS * KEYS_PER_THREAD);

    // 默认容量恰好 1000，第 1001 把密钥必须失败
    assert!(matches!(
        vault.generate_key(KeyAlgorithm::Aes256Gcm),
        Err(Error::RegistryFull { .. })
    ));
}

#[test]
fn test_parallel_operations_on_distinct_keys() {
    init_tracing();
    let vault = Arc::new(Vault::new(VaultConfig::default()).unwrap());

    let mut handles = Vec::new();
    for worker in 0..8 {
        let vault = Arc::clone(&vault);
        handles.push(thread::spawn(move || {
            let key_id = vault.generate_key(KeyAlgorithm::ChaCha20Poly1305).unwrap();
            let plaintext = format!("worker {worker} payload");
            for _ in 0..50 {
                let sealed = vault.encrypt(key_id, plaintext.as_bytes(), None).unwrap();
                let opened = vault
                    .decrypt(key_id, &sealed.ciphertext, None, &sealed.nonce, &sealed.tag)
                    .unwrap();
                assert_eq!(opened, plaintext.as_bytes());
            }
            assert_eq!(vault.key_info(key_id).unwrap().usage_count, 100);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_usage_count_is_linearizable_per_key() {
    init_tracing();
    let vault = Arc::new(Vault::new(VaultConfig::default()).unwrap());
    let key_id = vault.generate_key(KeyAlgorithm::Aes256Gcm).unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let vault = Arc::clone(&vault);
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                vault.encrypt(key_id, b"contended", None).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(vault.key_info(key_id).unwrap().usage_count, 100);
}

#[test]
fn test_revocation_races_with_use() {
    init_tracing();
    let vault = Arc::new(Vault::new(VaultConfig::default()).unwrap());
    let key_id = vault.generate_key(KeyAlgorithm::Aes256Gcm).unwrap();

    let user = {
        let vault = Arc::clone(&vault);
        thread::spawn(move || {
            // 吊销生效后每次使用都必须失败，且只以 KeyUnusable 失败
            let mut saw_unusable = false;
            for _ in 0..200 {
                match vault.encrypt(key_id, b"racing", None) {
                    Ok(_) => {
                        assert!(!saw_unusable, "key recovered after revocation");
                    }
                    Err(Error::KeyUnusable { .. }) => saw_unusable = true,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        })
    };

    let revoker = {
        let vault = Arc::clone(&vault);
        thread::spawn(move || {
            vault.revoke_key(key_id);
        })
    };

    user.join().unwrap();
    revoker.join().unwrap();
    assert!(vault.key_info(key_id).unwrap().revoked);
}
