//! 对称认证加密原语
//!
//! 无状态函数：密钥材料由调用方从注册表取出并在记录锁下传入。
//! 每次加密都从熵源取一个新 nonce，绝不复用。
use crate::common::errors::Error;
use crate::common::traits::KeyAlgorithm;
use crate::entropy::EntropySource;
use aes_gcm::aead::{AeadInPlace, KeyInit, Nonce, Tag};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroizing;

/// GCM 族与 ChaCha20-Poly1305 共用的 nonce 长度
pub const NONCE_SIZE: usize = 12;
/// 认证标签长度
pub const TAG_SIZE: usize = 16;

/// 一次认证加密的输出：密文、本次使用的 nonce 与认证标签，三者分离存放。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CipherOutput {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub tag: Vec<u8>,
}

/// 生成一把新的对称密钥，字节全部来自熵源。
pub fn generate_key(
    algorithm: KeyAlgorithm,
    entropy: &EntropySource,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    if !algorithm.is_aead() {
        return Err(Error::unsupported(algorithm, "symmetric key generation"));
    }
    let len = algorithm
        .symmetric_key_len()
        .ok_or_else(|| Error::unsupported(algorithm, "symmetric key generation"))?;

    let mut key = Zeroizing::new(vec![0u8; len]);
    entropy.fill(&mut key)?;
    Ok(key)
}

/// 认证加密。
///
/// 失败条件：算法不支持、nonce 生成失败、底层原语拒绝输入。
pub fn encrypt(
    algorithm: KeyAlgorithm,
    key: &[u8],
    plaintext: &[u8],
    additional_data: Option<&[u8]>,
    entropy: &EntropySource,
) -> Result<CipherOutput, Error> {
    let mut nonce = [0u8; NONCE_SIZE];
    entropy.fill(&mut nonce)?;

    let mut buffer = plaintext.to_vec();
    let aad = additional_data.unwrap_or(&[]);
    let tag = match algorithm {
        KeyAlgorithm::Aes128Gcm => seal::<Aes128Gcm>(key, &nonce, aad, &mut buffer)?,
        KeyAlgorithm::Aes256Gcm => seal::<Aes256Gcm>(key, &nonce, aad, &mut buffer)?,
        KeyAlgorithm::ChaCha20Poly1305 => seal::<ChaCha20Poly1305>(key, &nonce, aad, &mut buffer)?,
        other => return Err(Error::unsupported(other, "authenticated encryption")),
    };

    Ok(CipherOutput {
        ciphertext: buffer,
        nonce: nonce.to_vec(),
        tag,
    })
}

/// 认证解密。
///
/// 标签校验是解密的一部分：校验失败时不输出任何明文字节，
/// 返回的错误与原语内部其它失败不可区分。
pub fn decrypt(
    algorithm: KeyAlgorithm,
    key: &[u8],
    ciphertext: &[u8],
    additional_data: Option<&[u8]>,
    nonce: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, Error> {
    if nonce.len() != NONCE_SIZE {
        return Err(Error::Primitive(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            nonce.len()
        )));
    }
    if tag.len() != TAG_SIZE {
        return Err(Error::Primitive(format!(
            "tag must be {TAG_SIZE} bytes, got {}",
            tag.len()
        )));
    }

    let mut buffer = ciphertext.to_vec();
    let aad = additional_data.unwrap_or(&[]);
    match algorithm {
        KeyAlgorithm::Aes128Gcm => open::<Aes128Gcm>(key, nonce, aad, &mut buffer, tag)?,
        KeyAlgorithm::Aes256Gcm => open::<Aes256Gcm>(key, nonce, aad, &mut buffer, tag)?,
        KeyAlgorithm::ChaCha20Poly1305 => {
            open::<ChaCha20Poly1305>(key, nonce, aad, &mut buffer, tag)?
        }
        other => return Err(Error::unsupported(other, "authenticated decryption")),
    }
    Ok(buffer)
}

fn seal<A: AeadInPlace + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    buffer: &mut Vec<u8>,
) -> Result<Vec<u8>, Error> {
    let cipher = A::new_from_slice(key)
        .map_err(|_| Error::Primitive("key length does not match the cipher".to_string()))?;
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<A>::from_slice(nonce), aad, buffer)
        .map_err(|_| Error::Primitive("authenticated encryption failed".to_string()))?;
    Ok(tag.to_vec())
}

fn open<A: AeadInPlace + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    buffer: &mut Vec<u8>,
    tag: &[u8],
) -> Result<(), Error> {
    let cipher = A::new_from_slice(key)
        .map_err(|_| Error::Primitive("key length does not match the cipher".to_string()))?;
    cipher
        .decrypt_in_place_detached(
            Nonce::<A>::from_slice(nonce),
            aad,
            buffer,
            Tag::<A>::from_slice(tag),
        )
        .map_err(|_| Error::Authentication)
}
