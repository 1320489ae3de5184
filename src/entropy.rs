//! 分层熵源
//!
//! 按顺序尝试三个随机字节来源：内核系统调用、密码学库的 CSPRNG、
//! 阻塞式的随机设备。三者都失败时整个操作失败，不存在降级路径。

use crate::common::errors::Error;
use parking_lot::Mutex;

/// 进程级随机字节来源。
///
/// 单把锁串行化所有填充请求。熵只用于密钥与 nonce，调用频率远低于
/// 加密操作本身，锁竞争可以忽略。
pub struct EntropySource {
    lock: Mutex<()>,
}

impl EntropySource {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }

    /// 用随机字节填满 `buf`。
    ///
    /// 依次回退：`getrandom` 系统调用、`OsRng`、`/dev/urandom`。
    /// 全部失败返回 [`Error::Rng`]，调用方必须视其为当前操作的致命错误。
    pub fn fill(&self, buf: &mut [u8]) -> Result<(), Error> {
        let _guard = self.lock.lock();
        if buf.is_empty() {
            return Ok(());
        }

        if getrandom::getrandom(buf).is_ok() {
            return Ok(());
        }

        {
            use rand_core::{OsRng, TryRngCore};
            if OsRng.try_fill_bytes(buf).is_ok() {
                return Ok(());
            }
        }

        Self::fill_from_device(buf)
    }

    #[cfg(unix)]
    fn fill_from_device(buf: &mut [u8]) -> Result<(), Error> {
        use std::io::Read;

        let mut device = std::fs::File::open("/dev/urandom").map_err(|_| Error::Rng)?;
        let mut filled = 0;
        while filled < buf.len() {
            match device.read(&mut buf[filled..]) {
                Ok(0) => return Err(Error::Rng),
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return Err(Error::Rng),
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn fill_from_device(_buf: &mut [u8]) -> Result<(), Error> {
        Err(Error::Rng)
    }
}

impl Default for EntropySource {
    fn default() -> Self {
        Self::new()
    }
}
