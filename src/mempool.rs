//! 安全内存池
//!
//! 所有密钥材料都存放在这里：一块进程启动时一次性分配并 `mlock` 的连续内存，
//! 按固定大小的块位图管理。释放时先整段清零再标记空闲，析构时清零整个区域。
//!
//! 池内不做整理或碎片合并。当空闲块总量足够但不连续时，分配仍会失败，
//! 这是刻意保留的设计限制。

#![allow(unsafe_code)]

use crate::common::errors::Error;
use parking_lot::Mutex;
use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::Arc;
use zeroize::Zeroize;

/// 固定块大小的锁定内存池。
///
/// 分配与释放都由单个池锁串行化。相对加密操作而言分配很少发生，
/// 粗粒度的锁在这里足够。
pub struct SecurePool {
    region: NonNull<u8>,
    layout: Layout,
    capacity: usize,
    block_size: usize,
    locked: bool,
    map: Mutex<Vec<bool>>,
}

impl SecurePool {
    /// 分配并锁定整个区域。
    ///
    /// `mlock` 失败（例如 `RLIMIT_MEMLOCK` 过低）不视为致命错误，
    /// 池仍然可用，清零保证不受影响。
    pub fn new(capacity: usize, block_size: usize) -> Result<Arc<Self>, Error> {
        if block_size == 0 || !block_size.is_power_of_two() {
            return Err(Error::Config(format!(
                "pool block size must be a power of two, got {block_size}"
            )));
        }
        if capacity < block_size || capacity % block_size != 0 {
            return Err(Error::Config(format!(
                "pool capacity {capacity} must be a positive multiple of the block size {block_size}"
            )));
        }

        let layout = Layout::from_size_align(capacity, block_size)
            .map_err(|e| Error::Config(format!("invalid pool layout: {e}")))?;
        let ptr = unsafe { alloc_zeroed(layout) };
        let Some(region) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };

        let locked = unsafe { memsec::mlock(region.as_ptr(), capacity) };
        if !locked {
            tracing::warn!(capacity, "mlock failed, secure pool pages may be swapped");
        }

        let blocks = capacity / block_size;
        Ok(Arc::new(Self {
            region,
            layout,
            capacity,
            block_size,
            locked,
            map: Mutex::new(vec![false; blocks]),
        }))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 区域是否成功锁定为不可换页。
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// 当前空闲块数量。
    pub fn free_blocks(&self) -> usize {
        self.map.lock().iter().filter(|used| !**used).count()
    }

    /// 分配至少 `len` 字节，向上取整到块粒度。
    ///
    /// 在位图中扫描首个足够长的连续空闲块串；找不到则返回
    /// [`Error::Allocation`]，无论空闲块总量是否足够。
    pub fn allocate(self: &Arc<Self>, len: usize) -> Result<SecureBuffer, Error> {
        if len == 0 {
            return Err(Error::Allocation { requested: 0 });
        }
        let needed = len.div_ceil(self.block_size);

        let mut map = self.map.lock();
        let start =
            Self::find_free_run(&map, needed).ok_or(Error::Allocation { requested: len })?;
        for block in &mut map[start..start + needed] {
            *block = true;
        }
        drop(map);

        Ok(SecureBuffer {
            pool: Arc::clone(self),
            offset: start * self.block_size,
            len,
        })
    }

    fn find_free_run(map: &[bool], needed: usize) -> Option<usize> {
        let mut run = 0;
        for (index, used) in map.iter().enumerate() {
            if *used {
                run = 0;
            } else {
                run += 1;
                if run == needed {
                    return Some(index + 1 - needed);
                }
            }
        }
        None
    }

    /// 清零并归还 `offset..offset+len` 覆盖的所有块。
    /// 只能由拥有该范围的 [`SecureBuffer`] 在析构时调用一次。
    fn release(&self, offset: usize, len: usize) {
        let first = offset / self.block_size;
        let blocks = len.div_ceil(self.block_size);

        let mut map = self.map.lock();
        unsafe {
            memsec::memzero(self.region.as_ptr().add(offset), blocks * self.block_size);
        }
        for block in &mut map[first..first + blocks] {
            debug_assert!(*block, "releasing a block that was not allocated");
            *block = false;
        }
    }

    #[cfg(test)]
    fn peek(&self, offset: usize, len: usize) -> Vec<u8> {
        unsafe { std::slice::from_raw_parts(self.region.as_ptr().add(offset), len).to_vec() }
    }
}

impl Drop for SecurePool {
    fn drop(&mut self) {
        unsafe {
            memsec::memzero(self.region.as_ptr(), self.capacity);
            if self.locked {
                memsec::munlock(self.region.as_ptr(), self.capacity);
            }
            dealloc(self.region.as_ptr(), self.layout);
        }
    }
}

unsafe impl Send for SecurePool {}
unsafe impl Sync for SecurePool {}

impl std::fmt::Debug for SecurePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurePool")
            .field("capacity", &self.capacity)
            .field("block_size", &self.block_size)
            .field("locked", &self.locked)
            .finish()
    }
}

/// 池内一段已分配内存的独占句柄。
///
/// 析构时自动清零并归还底层块，密钥材料因此恰好被擦除一次。
pub struct SecureBuffer {
    pool: Arc<SecurePool>,
    offset: usize,
    len: usize,
}

impl SecureBuffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.pool.region.as_ptr().add(self.offset), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(self.pool.region.as_ptr().add(self.offset), self.len)
        }
    }
}

impl Deref for SecureBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for SecureBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl Zeroize for SecureBuffer {
    fn zeroize(&mut self) {
        self.as_mut_slice().zeroize();
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        self.pool.release(self.offset, self.len);
    }
}

// 缓冲区覆盖的块范围互不重叠，跨线程移动与共享引用都是安全的。
unsafe impl Send for SecureBuffer {}
unsafe impl Sync for SecureBuffer {}

impl std::fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 不打印内容
        f.debug_struct("SecureBuffer").field("len", &self.len).finish()
    }
}
