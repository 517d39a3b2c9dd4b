//! Shared open-file description. Many file-table slots (across `fork`
//! and `dup2`) may reference one handle; the handle's own refcount is
//! the single source of truth for when it is actually torn down.

use alloc::string::String;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::errno::{Errno, KResult};
use crate::external::vfs::{SeekWhence, VnodeRef};
use crate::sync::mutex::Mutex;

pub struct FileHandle {
    name: String,
    vnode: VnodeRef,
    readable: bool,
    writable: bool,
    /// Guarded by `lock`, not by the type system — `lock` is a blocking
    /// primitive, not a data-carrying RAII guard, so callers must bracket
    /// every access between `acquire`/`release` by convention.
    offset: UnsafeCell<u64>,
    lock: Mutex,
    refcount: AtomicUsize,
}

// SAFETY: `offset` is only ever touched while `lock` is held.
unsafe impl Sync for FileHandle {}

impl FileHandle {
    pub fn new(name: String, vnode: VnodeRef, readable: bool, writable: bool) -> FileHandle {
        FileHandle {
            name,
            vnode,
            readable,
            writable,
            offset: UnsafeCell::new(0),
            lock: Mutex::new("filehandle"),
            refcount: AtomicUsize::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn readable(&self) -> bool {
        self.readable
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn incref(&self) {
        self.refcount.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the refcount and return its new value.
    pub fn decref(&self) -> usize {
        self.refcount.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Relaxed)
    }

    /// Read at the handle's current offset and advance it by the number
    /// of bytes actually read. The source this handle's shape is modeled
    /// on leaves the offset untouched on read while `write` does advance
    /// it; that divergence is not reproduced here — `read` follows
    /// ordinary POSIX offset semantics.
    pub fn read(&self, holder: u32, buf: &mut [u8]) -> KResult<usize> {
        if !self.readable {
            return Err(Errno::Ebadf);
        }
        self.lock.acquire(holder);
        let result = (|| {
            // SAFETY: `lock` is held for the duration of this closure.
            let offset = unsafe { *self.offset.get() };
            let n = self.vnode.read(offset, buf)?;
            unsafe {
                *self.offset.get() = offset + n as u64;
            }
            Ok(n)
        })();
        self.lock.release(holder);
        result
    }

    pub fn write(&self, holder: u32, buf: &[u8]) -> KResult<usize> {
        if !self.writable {
            return Err(Errno::Ebadf);
        }
        self.lock.acquire(holder);
        let result = (|| {
            let offset = unsafe { *self.offset.get() };
            let n = self.vnode.write(offset, buf)?;
            unsafe {
                *self.offset.get() = offset + n as u64;
            }
            Ok(n)
        })();
        self.lock.release(holder);
        result
    }

    pub fn lseek(&self, holder: u32, pos: i64, whence: SeekWhence) -> KResult<u64> {
        if !self.vnode.is_seekable() {
            return Err(Errno::Espipe);
        }
        self.lock.acquire(holder);
        let result = (|| {
            let current = unsafe { *self.offset.get() } as i64;
            let base = match whence {
                SeekWhence::Set => 0,
                SeekWhence::Cur => current,
                SeekWhence::End => self.vnode.size()? as i64,
            };
            let new_offset = base + pos;
            if new_offset < 0 {
                return Err(Errno::Einval);
            }
            unsafe {
                *self.offset.get() = new_offset as u64;
            }
            Ok(new_offset as u64)
        })();
        self.lock.release(holder);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::install_test_collaborators;
    use alloc::sync::Arc;
    use alloc::vec;
    use std::sync::Mutex as StdMutex;

    struct MemVnode {
        data: StdMutex<alloc::vec::Vec<u8>>,
    }

    impl crate::external::vfs::Vnode for MemVnode {
        fn read(&self, offset: u64, buf: &mut [u8]) -> KResult<usize> {
            let data = self.data.lock().unwrap();
            let offset = offset as usize;
            if offset >= data.len() {
                return Ok(0);
            }
            let n = buf.len().min(data.len() - offset);
            buf[..n].copy_from_slice(&data[offset..offset + n]);
            Ok(n)
        }

        fn write(&self, offset: u64, buf: &[u8]) -> KResult<usize> {
            let mut data = self.data.lock().unwrap();
            let offset = offset as usize;
            if data.len() < offset + buf.len() {
                data.resize(offset + buf.len(), 0);
            }
            data[offset..offset + buf.len()].copy_from_slice(buf);
            Ok(buf.len())
        }

        fn is_seekable(&self) -> bool {
            true
        }

        fn size(&self) -> KResult<u64> {
            Ok(self.data.lock().unwrap().len() as u64)
        }
    }

    fn handle(readable: bool, writable: bool) -> FileHandle {
        install_test_collaborators();
        let vnode: VnodeRef = Arc::new(MemVnode {
            data: StdMutex::new(vec![1, 2, 3, 4, 5]),
        });
        FileHandle::new(String::from("test"), vnode, readable, writable)
    }

    #[test]
    fn read_advances_offset() {
        let h = handle(true, false);
        let mut buf = [0u8; 2];
        assert_eq!(h.read(1, &mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(h.read(1, &mut buf).unwrap(), 2);
        assert_eq!(buf, [3, 4]);
    }

    #[test]
    fn write_only_handle_rejects_read() {
        let h = handle(false, true);
        let mut buf = [0u8; 2];
        assert_eq!(h.read(1, &mut buf), Err(Errno::Ebadf));
    }

    #[test]
    fn lseek_end_then_negative_offset_fails() {
        let h = handle(true, true);
        assert_eq!(h.lseek(1, 0, SeekWhence::End).unwrap(), 5);
        assert_eq!(h.lseek(1, -10, SeekWhence::Cur), Err(Errno::Einval));
    }
}
