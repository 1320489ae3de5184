//! 非对称原语：密钥对生成、签名与验证、ECDH 协商
//!
//! 私钥一律序列化为 PKCS#8 DER 存入安全内存池，公钥以 SPKI DER 表示。
//! RSA 签名使用 PSS 方案加 SHA-256；EC 签名使用 ECDSA（RFC 6979 确定性
//! nonce），摘要取曲线匹配的 SHA-2 档位。
use crate::common::errors::Error;
use crate::common::traits::KeyAlgorithm;
use crate::entropy::EntropySource;
use p521::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::pss::{SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::rand_core::OsRng as RsaOsRng;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

/// 生成一对非对称密钥，返回 PKCS#8 DER 编码的私钥结构。
///
/// EC 标量通过熵源拒绝采样获得；RSA 素数搜索需要完整的随机数流，
/// 直接使用 `rsa` 库的操作系统 RNG。
pub fn generate_keypair(
    algorithm: KeyAlgorithm,
    entropy: &EntropySource,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    match algorithm {
        KeyAlgorithm::Rsa2048 => generate_rsa(2048),
        KeyAlgorithm::Rsa4096 => generate_rsa(4096),
        KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdhP256 => generate_p256(entropy),
        KeyAlgorithm::EcdsaP384 | KeyAlgorithm::EcdhP384 => generate_p384(entropy),
        KeyAlgorithm::EcdsaP521 => generate_p521(entropy),
        other => Err(Error::unsupported(other, "asymmetric key generation")),
    }
}

fn generate_rsa(bits: usize) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut rng = RsaOsRng;
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| Error::Primitive(format!("RSA key generation failed: {e}")))?;
    let der = private_key
        .to_pkcs8_der()
        .map_err(|e| Error::Primitive(format!("RSA private key encoding failed: {e}")))?;
    Ok(Zeroizing::new(der.as_bytes().to_vec()))
}

fn generate_p256(entropy: &EntropySource) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut bytes = Zeroizing::new([0u8; 32]);
    loop {
        entropy.fill(&mut bytes[..])?;
        // 超出曲线阶的候选被拒绝，重新采样
        if let Ok(secret) = p256::SecretKey::from_slice(&bytes[..]) {
            let der = secret
                .to_pkcs8_der()
                .map_err(|e| Error::Primitive(format!("EC private key encoding failed: {e}")))?;
            return Ok(Zeroizing::new(der.as_bytes().to_vec()));
        }
    }
}

fn generate_p384(entropy: &EntropySource) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut bytes = Zeroizing::new([0u8; 48]);
    loop {
        entropy.fill(&mut bytes[..])?;
        if let Ok(secret) = p384::SecretKey::from_slice(&bytes[..]) {
            let der = secret
                .to_pkcs8_der()
                .map_err(|e| Error::Primitive(format!("EC private key encoding failed: {e}")))?;
            return Ok(Zeroizing::new(der.as_bytes().to_vec()));
        }
    }
}

fn generate_p521(entropy: &EntropySource) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut bytes = Zeroizing::new([0u8; 66]);
    loop {
        entropy.fill(&mut bytes[..])?;
        if let Ok(secret) = p521::SecretKey::from_slice(&bytes[..]) {
            let der = secret
                .to_pkcs8_der()
                .map_err(|e| Error::Primitive(format!("EC private key encoding failed: {e}")))?;
            return Ok(Zeroizing::new(der.as_bytes().to_vec()));
        }
    }
}

/// 从 PKCS#8 私钥派生 SPKI DER 公钥。
pub fn public_key_der(algorithm: KeyAlgorithm, private_der: &[u8]) -> Result<Vec<u8>, Error> {
    let document = match algorithm {
        KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => {
            let private_key = parse_rsa_private(private_der)?;
            RsaPublicKey::from(&private_key)
                .to_public_key_der()
                .map_err(|e| Error::Primitive(format!("RSA public key encoding failed: {e}")))?
        }
        KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdhP256 => {
            let secret = parse_p256_private(private_der)?;
            secret
                .public_key()
                .to_public_key_der()
                .map_err(|e| Error::Primitive(format!("EC public key encoding failed: {e}")))?
        }
        KeyAlgorithm::EcdsaP384 | KeyAlgorithm::EcdhP384 => {
            let secret = parse_p384_private(private_der)?;
            secret
                .public_key()
                .to_public_key_der()
                .map_err(|e| Error::Primitive(format!("EC public key encoding failed: {e}")))?
        }
        KeyAlgorithm::EcdsaP521 => {
            let secret = parse_p521_private(private_der)?;
            secret
                .public_key()
                .to_public_key_der()
                .map_err(|e| Error::Primitive(format!("EC public key encoding failed: {e}")))?
        }
        other => return Err(Error::unsupported(other, "public key derivation")),
    };
    Ok(document.as_bytes().to_vec())
}

/// 校验一段 SPKI DER 能否按给定算法解析，供公钥导入使用。
pub fn validate_public_key(algorithm: KeyAlgorithm, spki_der: &[u8]) -> Result<(), Error> {
    match algorithm {
        KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => {
            RsaPublicKey::from_public_key_der(spki_der)
                .map_err(|e| Error::Primitive(format!("invalid RSA public key: {e}")))?;
        }
        KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdhP256 => {
            p256::PublicKey::from_public_key_der(spki_der)
                .map_err(|e| Error::Primitive(format!("invalid EC public key: {e}")))?;
        }
        KeyAlgorithm::EcdsaP384 | KeyAlgorithm::EcdhP384 => {
            p384::PublicKey::from_public_key_der(spki_der)
                .map_err(|e| Error::Primitive(format!("invalid EC public key: {e}")))?;
        }
        KeyAlgorithm::EcdsaP521 => {
            p521::PublicKey::from_public_key_der(spki_der)
                .map_err(|e| Error::Primitive(format!("invalid EC public key: {e}")))?;
        }
        other => return Err(Error::unsupported(other, "public key import")),
    }
    Ok(())
}

/// 用 PKCS#8 私钥对数据签名。
pub fn sign(algorithm: KeyAlgorithm, private_der: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    match algorithm {
        KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => {
            let private_key = parse_rsa_private(private_der)?;
            let signing_key = RsaSigningKey::<Sha256>::new(private_key);
            let mut rng = RsaOsRng;
            let signature = signing_key.sign_with_rng(&mut rng, data);
            Ok(signature.to_vec())
        }
        KeyAlgorithm::EcdsaP256 => {
            let secret = parse_p256_private(private_der)?;
            let signing_key = p256::ecdsa::SigningKey::from(&secret);
            let signature: p256::ecdsa::Signature = signing_key.sign(data);
            Ok(signature.to_vec())
        }
        KeyAlgorithm::EcdsaP384 => {
            let secret = parse_p384_private(private_der)?;
            let signing_key = p384::ecdsa::SigningKey::from(&secret);
            let signature: p384::ecdsa::Signature = signing_key.sign(data);
            Ok(signature.to_vec())
        }
        KeyAlgorithm::EcdsaP521 => {
            let secret = parse_p521_private(private_der)?;
            let signing_key = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes())
                .map_err(|e| Error::Primitive(format!("invalid EC private key: {e}")))?;
            let signature: p521::ecdsa::Signature = signing_key.sign(data);
            Ok(signature.to_vec())
        }
        other => Err(Error::unsupported(other, "signing")),
    }
}

/// 用私钥记录验证签名，内部先派生公钥的一半。
///
/// 签名格式不合法视为验证失败而非错误，返回 `Ok(false)`。
pub fn verify_with_private(
    algorithm: KeyAlgorithm,
    private_der: &[u8],
    data: &[u8],
    signature: &[u8],
) -> Result<bool, Error> {
    match algorithm {
        KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => {
            let private_key = parse_rsa_private(private_der)?;
            let verifying_key = RsaVerifyingKey::<Sha256>::new(RsaPublicKey::from(&private_key));
            Ok(verify_rsa(&verifying_key, data, signature))
        }
        KeyAlgorithm::EcdsaP256 => {
            let secret = parse_p256_private(private_der)?;
            let verifying_key = p256::ecdsa::VerifyingKey::from(secret.public_key());
            Ok(verify_p256(&verifying_key, data, signature))
        }
        KeyAlgorithm::EcdsaP384 => {
            let secret = parse_p384_private(private_der)?;
            let verifying_key = p384::ecdsa::VerifyingKey::from(secret.public_key());
            Ok(verify_p384(&verifying_key, data, signature))
        }
        KeyAlgorithm::EcdsaP521 => {
            let secret = parse_p521_private(private_der)?;
            let verifying_key =
                p521::ecdsa::VerifyingKey::from_encoded_point(&secret.public_key().to_encoded_point(false))
                    .map_err(|e| Error::Primitive(format!("invalid EC public key: {e}")))?;
            Ok(verify_p521(&verifying_key, data, signature))
        }
        other => Err(Error::unsupported(other, "signature verification")),
    }
}

/// 用 SPKI DER 公钥记录验证签名。
pub fn verify_with_public(
    algorithm: KeyAlgorithm,
    spki_der: &[u8],
    data: &[u8],
    signature: &[u8],
) -> Result<bool, Error> {
    match algorithm {
        KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => {
            let public_key = RsaPublicKey::from_public_key_der(spki_der)
                .map_err(|e| Error::Primitive(format!("invalid RSA public key: {e}")))?;
            let verifying_key = RsaVerifyingKey::<Sha256>::new(public_key);
            Ok(verify_rsa(&verifying_key, data, signature))
        }
        KeyAlgorithm::EcdsaP256 => {
            let public_key = p256::PublicKey::from_public_key_der(spki_der)
                .map_err(|e| Error::Primitive(format!("invalid EC public key: {e}")))?;
            Ok(verify_p256(
                &p256::ecdsa::VerifyingKey::from(public_key),
                data,
                signature,
            ))
        }
        KeyAlgorithm::EcdsaP384 => {
            let public_key = p384::PublicKey::from_public_key_der(spki_der)
                .map_err(|e| Error::Primitive(format!("invalid EC public key: {e}")))?;
            Ok(verify_p384(
                &p384::ecdsa::VerifyingKey::from(public_key),
                data,
                signature,
            ))
        }
        KeyAlgorithm::EcdsaP521 => {
            let public_key = p521::PublicKey::from_public_key_der(spki_der)
                .map_err(|e| Error::Primitive(format!("invalid EC public key: {e}")))?;
            let verifying_key =
                p521::ecdsa::VerifyingKey::from_encoded_point(&public_key.to_encoded_point(false))
                    .map_err(|e| Error::Primitive(format!("invalid EC public key: {e}")))?;
            Ok(verify_p521(&verifying_key, data, signature))
        }
        other => Err(Error::unsupported(other, "signature verification")),
    }
}

/// ECDH 协商：私钥记录与对端 SPKI DER 公钥，输出原始共享密钥。
pub fn agree(
    algorithm: KeyAlgorithm,
    private_der: &[u8],
    peer_spki_der: &[u8],
) -> Result<Zeroizing<Vec<u8>>, Error> {
    match algorithm {
        KeyAlgorithm::EcdhP256 => {
            let secret = parse_p256_private(private_der)?;
            let peer = p256::PublicKey::from_public_key_der(peer_spki_der)
                .map_err(|e| Error::Primitive(format!("invalid peer public key: {e}")))?;
            let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
            Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
        }
        KeyAlgorithm::EcdhP384 => {
            let secret = parse_p384_private(private_der)?;
            let peer = p384::PublicKey::from_public_key_der(peer_spki_der)
                .map_err(|e| Error::Primitive(format!("invalid peer public key: {e}")))?;
            let shared = p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
            Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
        }
        other => Err(Error::unsupported(other, "key agreement")),
    }
}

fn parse_rsa_private(der: &[u8]) -> Result<RsaPrivateKey, Error> {
    RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| Error::Primitive(format!("invalid RSA private key: {e}")))
}

fn parse_p256_private(der: &[u8]) -> Result<p256::SecretKey, Error> {
    p256::SecretKey::from_pkcs8_der(der)
        .map_err(|e| Error::Primitive(format!("invalid EC private key: {e}")))
}

fn parse_p384_private(der: &[u8]) -> Result<p384::SecretKey, Error> {
    p384::SecretKey::from_pkcs8_der(der)
        .map_err(|e| Error::Primitive(format!("invalid EC private key: {e}")))
}

fn parse_p521_private(der: &[u8]) -> Result<p521::SecretKey, Error> {
    p521::SecretKey::from_pkcs8_der(der)
        .map_err(|e| Error::Primitive(format!("invalid EC private key: {e}")))
}

fn verify_rsa(key: &RsaVerifyingKey<Sha256>, data: &[u8], signature: &[u8]) -> bool {
    match rsa::pss::Signature::try_from(signature) {
        Ok(sig) => key.verify(data, &sig).is_ok(),
        // 签名切片长度不正确，按无效签名处理
        Err(_) => false,
    }
}

fn verify_p256(key: &p256::ecdsa::VerifyingKey, data: &[u8], signature: &[u8]) -> bool {
    match p256::ecdsa::Signature::from_slice(signature) {
        Ok(sig) => key.verify(data, &sig).is_ok(),
        Err(_) => false,
    }
}

fn verify_p384(key: &p384::ecdsa::VerifyingKey, data: &[u8], signature: &[u8]) -> bool {
    match p384::ecdsa::Signature::from_slice(signature) {
        Ok(sig) => key.verify(data, &sig).is_ok(),
        Err(_) => false,
    }
}

fn verify_p521(key: &p521::ecdsa::VerifyingKey, data: &[u8], signature: &[u8]) -> bool {
    match p521::ecdsa::Signature::from_slice(signature) {
        Ok(sig) => key.verify(data, &sig).is_ok(),
        Err(_) => false,
    }
}
