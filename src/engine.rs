//! 加密引擎
//!
//! 无状态原语的汇总入口。密钥材料由调用方（注册表或 [`crate::vault::Vault`]）
//! 在记录锁下取出并传入，这里不做任何生命周期判断。
pub mod asymmetric;
pub mod kdf;
pub mod symmetric;

pub use symmetric::{CipherOutput, NONCE_SIZE, TAG_SIZE};
