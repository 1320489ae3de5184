use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vault_kit::{KeyAlgorithm, KeyOptions, Vault, VaultConfig};

// 基准迭代次数会超过默认的使用上限，放开预算
fn unlimited() -> KeyOptions {
    KeyOptions {
        validity: None,
        max_usage: Some(u64::MAX),
    }
}

fn bench_aead(c: &mut Criterion) {
    let vault = Vault::new(VaultConfig::default()).unwrap();
    let key_id = vault
        .generate_key_with(KeyAlgorithm::Aes256Gcm, unlimited())
        .unwrap();
    let data = vec![0u8; 1024];

    c.bench_function("Vault encrypt AES-256-GCM 1KB", |b| {
        b.iter(|| vault.encrypt(key_id, black_box(&data), None).unwrap());
    });

    let sealed = vault.encrypt(key_id, &data, None).unwrap();
    c.bench_function("Vault decrypt AES-256-GCM 1KB", |b| {
        b.iter(|| {
            vault
                .decrypt(
                    key_id,
                    black_box(&sealed.ciphertext),
                    None,
                    &sealed.nonce,
                    &sealed.tag,
                )
                .unwrap()
        });
    });

    let chacha_id = vault
        .generate_key_with(KeyAlgorithm::ChaCha20Poly1305, unlimited())
        .unwrap();
    c.bench_function("Vault encrypt ChaCha20-Poly1305 1KB", |b| {
        b.iter(|| vault.encrypt(chacha_id, black_box(&data), None).unwrap());
    });
}

fn bench_sign(c: &mut Criterion) {
    let vault = Vault::new(VaultConfig::default()).unwrap();
    let key_id = vault
        .generate_key_with(KeyAlgorithm::EcdsaP256, unlimited())
        .unwrap();
    let data = vec![0u8; 100];

    c.bench_function("Vault sign ECDSA-P256 100B", |b| {
        b.iter(|| vault.sign(key_id, black_box(&data)).unwrap());
    });

    let signature = vault.sign(key_id, &data).unwrap();
    c.bench_function("Vault verify ECDSA-P256 100B", |b| {
        b.iter(|| vault.verify(key_id, &data, black_box(&signature)).unwrap());
    });
}

fn bench_derivation(c: &mut Criterion) {
    let vault = Vault::new(VaultConfig::default()).unwrap();
    let ikm = vec![0x17u8; 32];

    c.bench_function("Vault hkdf expand 64B", |b| {
        b.iter(|| {
            vault
                .derive_key_hkdf(black_box(&ikm), Some(b"salt"), b"bench", 64)
                .unwrap()
        });
    });

    c.bench_function("Vault sha256 1KB", |b| {
        let data = vec![0u8; 1024];
        b.iter(|| vault.hash_sha256(black_box(&data)));
    });
}

criterion_group!(benches, bench_aead, bench_sign, bench_derivation);
criterion_main!(benches);
