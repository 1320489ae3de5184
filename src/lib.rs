//! # Vault-Kit: In-Process Key Management and Cryptographic Operations
//!
//! `vault-kit` is a key management framework that keeps cryptographic key
//! material inside a locked (non-pageable) memory pool, tracks every key's
//! lifecycle in a bounded registry, and exposes the operations that consume
//! those keys: authenticated encryption, signing, ECDH agreement, and key
//! derivation.
//!
//! It aims to make the safe path the only path: nonces are always fresh,
//! revoked or expired keys refuse to work, usage budgets are enforced under
//! per-key locks, and released key material is zeroed before its memory is
//! reused.
//!
//! ## Core Concepts
//!
//! - **`Vault`**: the explicitly constructed entry point, owning the secure
//!   pool, the entropy source, the key registry and the acceleration backend.
//! - **`KeyRegistry`**: a bounded table of key records addressed by
//!   monotonically increasing `KeyId`s; callers never hold key material,
//!   only ids.
//! - **`Accelerator`**: a capability trait for delegating key generation and
//!   authenticated encryption to dedicated hardware, with transparent
//!   fallback to the software engine.
//!
//! ## Quick Start
//!
//! ```rust
//! use vault_kit::{KeyAlgorithm, Vault, VaultConfig};
//!
//! fn main() -> Result<(), vault_kit::Error> {
//!     let vault = Vault::new(VaultConfig::default())?;
//!
//!     let key_id = vault.generate_key(KeyAlgorithm::Aes256Gcm)?;
//!     let sealed = vault.encrypt(key_id, b"Hello, secure world!", None)?;
//!     let opened = vault.decrypt(
//!         key_id,
//!         &sealed.ciphertext,
//!         None,
//!         &sealed.nonce,
//!         &sealed.tag,
//!     )?;
//!
//!     assert_eq!(opened, b"Hello, secure world!");
//!     Ok(())
//! }
//! ```
//!
//! ## Limitations
//!
//! 操作都是同步的，框架内部没有超时与取消；内存池不做碎片整理；
//! 密钥不跨进程重启持久化。

pub mod accel;
pub mod common;
pub mod engine;
pub mod entropy;
pub mod mempool;
pub mod registry;
pub mod vault;

// --- Prelude ---
// A collection of the most commonly used types.
pub mod prelude {
    pub use crate::accel::{Accelerator, SoftwareOnly};
    pub use crate::common::config::VaultConfig;
    pub use crate::common::errors::{Error, UnusableReason};
    pub use crate::common::traits::{KeyAlgorithm, KeyId, KeyInfo, KeyKind};
    pub use crate::engine::symmetric::CipherOutput;
    pub use crate::registry::KeyOptions;
    pub use crate::vault::Vault;
}

pub use accel::{Accelerator, SoftwareOnly};
pub use common::config::VaultConfig;
pub use common::errors::{Error, UnusableReason};
pub use common::traits::{KeyAlgorithm, KeyId, KeyInfo, KeyKind};
pub use engine::symmetric::CipherOutput;
pub use registry::{KeyOptions, KeyRegistry};
pub use vault::Vault;

/// The version of the `vault-kit` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
