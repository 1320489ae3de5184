//! 哈希与密钥派生原语
//!
//! 全部基于 SHA-256：一次性摘要、HMAC、口令迭代派生（PBKDF2）与
//! 提取-扩展派生（HKDF）。派生结果在离开作用域时自动清零。
use crate::common::errors::Error;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretBox};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 摘要。
pub fn hash_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// HMAC-SHA256。
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// PBKDF2-HMAC-SHA256 口令派生。
///
/// 迭代次数由调用方给定，典型值为 100000。
pub fn derive_key_pbkdf2(
    password: &SecretBox<[u8]>,
    salt: &[u8],
    iterations: u32,
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    if iterations == 0 {
        return Err(Error::Primitive(
            "PBKDF2 iteration count must be non-zero".to_string(),
        ));
    }
    if length == 0 {
        return Err(Error::Primitive(
            "derived key length must be non-zero".to_string(),
        ));
    }

    let mut output = Zeroizing::new(vec![0u8; length]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.expose_secret(), salt, iterations, &mut output);
    Ok(output)
}

/// HKDF-SHA256 提取-扩展派生。
///
/// `salt` 为空时按 RFC 5869 使用全零盐。
pub fn derive_key_hkdf(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    if length == 0 {
        return Err(Error::Primitive(
            "derived key length must be non-zero".to_string(),
        ));
    }

    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut output = Zeroizing::new(vec![0u8; length]);
    hk.expand(info, &mut output)
        .map_err(|_| Error::Primitive(format!("HKDF cannot expand to {length} bytes")))?;
    Ok(output)
}
