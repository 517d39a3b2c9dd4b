//! Per-process fixed-size descriptor table. Slots 0/1/2 are pre-opened
//! to the console device at process creation.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::errno::{Errno, KResult};
use crate::external::vfs::Vfs;
use crate::fs::filehandle::FileHandle;
use crate::param::OPEN_MAX;
use crate::sync::spinlock::Spinlock;

pub struct FileTable {
    slots: Spinlock<Vec<Option<Arc<FileHandle>>>>,
}

fn empty_slots() -> Vec<Option<Arc<FileHandle>>> {
    let mut slots = Vec::with_capacity(OPEN_MAX);
    slots.resize_with(OPEN_MAX, || None);
    slots
}

impl FileTable {
    /// An empty table with no slots populated — used for intermediate
    /// construction before the console slots or a `fork` copy are filled
    /// in.
    pub fn new_empty() -> FileTable {
        FileTable {
            slots: Spinlock::new("filetable", empty_slots()),
        }
    }

    /// A fresh table with stdin/stdout/stderr bound to the console,
    /// read-only then write-only, write-only.
    pub fn new_with_console(vfs: &dyn Vfs) -> FileTable {
        let mut slots = empty_slots();
        slots[0] = Some(Arc::new(FileHandle::new(
            "con:".into(),
            vfs.console(),
            true,
            false,
        )));
        slots[1] = Some(Arc::new(FileHandle::new(
            "con:".into(),
            vfs.console(),
            false,
            true,
        )));
        slots[2] = Some(Arc::new(FileHandle::new(
            "con:".into(),
            vfs.console(),
            false,
            true,
        )));
        FileTable {
            slots: Spinlock::new("filetable", slots),
        }
    }

    /// A table for a freshly-forked child: every non-null parent slot
    /// shares its handle (refcount bumped), at the same slot index.
    pub fn fork_from(&self) -> FileTable {
        let mut new_slots = empty_slots();
        let slots = self.slots.lock();
        for i in 0..OPEN_MAX {
            if let Some(h) = &slots[i] {
                h.incref();
                new_slots[i] = Some(h.clone());
            }
        }
        FileTable {
            slots: Spinlock::new("filetable", new_slots),
        }
    }

    pub fn insert(&self, handle: Arc<FileHandle>) -> KResult<usize> {
        let mut slots = self.slots.lock();
        match slots.iter().position(|s| s.is_none()) {
            Some(i) => {
                slots[i] = Some(handle);
                Ok(i)
            }
            None => Err(Errno::Emfile),
        }
    }

    pub fn get(&self, fd: usize) -> KResult<Arc<FileHandle>> {
        if fd >= OPEN_MAX {
            return Err(Errno::Ebadf);
        }
        self.slots.lock()[fd].clone().ok_or(Errno::Ebadf)
    }

    pub fn close(&self, fd: usize) -> KResult<()> {
        if fd >= OPEN_MAX {
            return Err(Errno::Ebadf);
        }
        let handle = {
            let mut slots = self.slots.lock();
            slots[fd].take().ok_or(Errno::Ebadf)?
        };
        handle.decref();
        // `handle` drops here; the last `Arc<FileHandle>` taking the
        // vnode with it releases the vnode reference too.
        Ok(())
    }

    /// Place `oldfd`'s handle into `newfd`, closing whatever `newfd`
    /// held first. `close` takes the table spinlock itself, so the
    /// occupancy check, the close, and the reassignment are each their
    /// own critical section rather than one nested acquisition.
    pub fn dup2(&self, oldfd: usize, newfd: usize) -> KResult<usize> {
        if oldfd >= OPEN_MAX || newfd >= OPEN_MAX {
            return Err(Errno::Ebadf);
        }
        if oldfd == newfd {
            return Ok(newfd);
        }
        let handle = self.get(oldfd)?;
        let newfd_occupied = self.slots.lock()[newfd].is_some();
        if newfd_occupied {
            self.close(newfd)?;
        }
        handle.incref();
        self.slots.lock()[newfd] = Some(handle);
        Ok(newfd)
    }
}
