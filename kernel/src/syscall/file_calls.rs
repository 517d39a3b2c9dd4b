//! File calls: thin wrappers composing `FileTable`/`FileHandle` over the
//! out-of-scope `Vfs` contract, marshaling between kernel buffers and the
//! calling process's user address space.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;

use crate::errno::{Errno, KResult};
use crate::external::vfs::SeekWhence;
use crate::fs::FileHandle;
use crate::mm::Coremap;
use crate::param::PATH_MAX;
use crate::proc::Process;
use crate::vm::usercopy::{copyin_bytes, copyin_cstr, copyout_bytes};

use super::Syscalls;

/// Access-mode bits, 2.11BSD-style: `flags & O_ACCMODE` is one of these
/// three, not a bitmask of independent flags.
pub const O_RDONLY: i32 = 0;
pub const O_WRONLY: i32 = 1;
pub const O_RDWR: i32 = 2;
const O_ACCMODE: i32 = 0x3;

fn path_from_user(current: &Process, coremap: &Coremap, path_uaddr: usize) -> KResult<String> {
    let guard = current.addrspace.lock();
    let as_ = guard.as_ref().ok_or(Errno::Efault)?;
    let bytes = copyin_cstr(as_, coremap, path_uaddr, PATH_MAX)?;
    String::from_utf8(bytes).map_err(|_| Errno::Einval)
}

impl<'a> Syscalls<'a> {
    pub fn open(&self, current: &Process, path_uaddr: usize, flags: i32, mode: u32) -> KResult<usize> {
        let path = path_from_user(current, self.coremap, path_uaddr)?;
        let vnode = self.vfs.open(&path, flags, mode)?;
        let accmode = flags & O_ACCMODE;
        let readable = accmode == O_RDONLY || accmode == O_RDWR;
        let writable = accmode == O_WRONLY || accmode == O_RDWR;
        let handle = Arc::new(FileHandle::new(path, vnode, readable, writable));
        current.file_table.insert(handle)
    }

    pub fn close(&self, current: &Process, fd: usize) -> KResult<()> {
        current.file_table.close(fd)
    }

    /// Read up to `len` bytes from `fd` into the user buffer at `uaddr`.
    pub fn read(&self, current: &Process, fd: usize, uaddr: usize, len: usize) -> KResult<usize> {
        let handle = current.file_table.get(fd)?;
        let mut kbuf = vec![0u8; len];
        let n = handle.read(current.pid(), &mut kbuf)?;
        let guard = current.addrspace.lock();
        let as_ = guard.as_ref().ok_or(Errno::Efault)?;
        copyout_bytes(as_, self.coremap, uaddr, &kbuf[..n])?;
        Ok(n)
    }

    pub fn write(&self, current: &Process, fd: usize, uaddr: usize, len: usize) -> KResult<usize> {
        let handle = current.file_table.get(fd)?;
        let mut kbuf = vec![0u8; len];
        {
            let guard = current.addrspace.lock();
            let as_ = guard.as_ref().ok_or(Errno::Efault)?;
            copyin_bytes(as_, self.coremap, uaddr, &mut kbuf)?;
        }
        handle.write(current.pid(), &kbuf)
    }

    pub fn lseek(&self, current: &Process, fd: usize, pos: i64, whence: SeekWhence) -> KResult<u64> {
        let handle = current.file_table.get(fd)?;
        handle.lseek(current.pid(), pos, whence)
    }

    pub fn dup2(&self, current: &Process, oldfd: usize, newfd: usize) -> KResult<usize> {
        current.file_table.dup2(oldfd, newfd)
    }

    pub fn chdir(&self, current: &Process, path_uaddr: usize) -> KResult<()> {
        let path = path_from_user(current, self.coremap, path_uaddr)?;
        self.vfs.chdir(&path)
    }

    pub fn getcwd(&self, current: &Process, buf_uaddr: usize, len: usize) -> KResult<usize> {
        let mut kbuf = vec![0u8; len];
        let n = self.vfs.getcwd(&mut kbuf)?;
        let guard = current.addrspace.lock();
        let as_ = guard.as_ref().ok_or(Errno::Efault)?;
        copyout_bytes(as_, self.coremap, buf_uaddr, &kbuf[..n])?;
        Ok(n)
    }
}
