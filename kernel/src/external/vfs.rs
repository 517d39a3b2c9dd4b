//! The VFS layer (`vnode`, `vfs_open`, `VOP_*`) is out of scope (spec §1):
//! treated as an opaque, refcounted file-object abstraction.

use alloc::sync::Arc;

use crate::errno::KResult;

/// Whence values for `lseek`, mirrored from the syscall surface so the
/// contract doesn't need to reach back into `syscall`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SeekWhence {
    Set,
    Cur,
    End,
}

/// An open file object as the VFS would hand back from `vfs_open`.
/// Reference-counted (`VOP_DECREF` on drop of the last `Arc`).
pub trait Vnode: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns the
    /// number of bytes actually read.
    fn read(&self, offset: u64, buf: &mut [u8]) -> KResult<usize>;
    /// Write `buf` starting at `offset`. Returns the number of bytes
    /// actually written.
    fn write(&self, offset: u64, buf: &[u8]) -> KResult<usize>;
    /// `VOP_ISSEEKABLE`.
    fn is_seekable(&self) -> bool;
    /// `VOP_STAT().size`.
    fn size(&self) -> KResult<u64>;
}

pub type VnodeRef = Arc<dyn Vnode>;

/// `vfs_open`/`vfs_close`/`chdir`/`__getcwd`, as a collaborator contract.
pub trait Vfs: Sync {
    fn open(&self, path: &str, flags: i32, mode: u32) -> KResult<VnodeRef>;
    /// The pre-opened console device, bound to file-table slots 0/1/2.
    fn console(&self) -> VnodeRef;
    fn chdir(&self, path: &str) -> KResult<()>;
    fn getcwd(&self, buf: &mut [u8]) -> KResult<usize>;
}
