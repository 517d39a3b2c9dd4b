//! Process table: a sparse array indexed by PID in `[PID_MIN, PID_MAX)`.
//! PID 0, the bootstrap kernel process, is never a slot in this table.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::errno::{Errno, KResult};
use crate::param::{PID_MAX, PID_MIN};
use crate::proc::process::Process;
use crate::sync::spinlock::Spinlock;

pub struct ProcTable {
    slots: Spinlock<Vec<Option<Arc<Process>>>>,
}

impl ProcTable {
    pub fn new() -> ProcTable {
        let n = (PID_MAX - PID_MIN) as usize;
        let mut slots = Vec::with_capacity(n);
        slots.resize_with(n, || None);
        ProcTable {
            slots: Spinlock::new("proctable", slots),
        }
    }

    fn index(pid: u32) -> KResult<usize> {
        if pid < PID_MIN || pid >= PID_MAX {
            Err(Errno::Esrch)
        } else {
            Ok((pid - PID_MIN) as usize)
        }
    }

    /// Linear-scan for the first free slot, install `p`, and return the
    /// assigned PID. `EMPROC` if the table is full. The caller is
    /// responsible for calling `p.set_pid` with the returned value.
    pub fn insert(&self, p: Arc<Process>) -> KResult<u32> {
        let mut slots = self.slots.lock();
        match slots.iter().position(|s| s.is_none()) {
            Some(i) => {
                slots[i] = Some(p);
                Ok(PID_MIN + i as u32)
            }
            None => Err(Errno::Emproc),
        }
    }

    /// Swap the slot to empty and return whatever was there (possibly
    /// nothing). `ESRCH` only if `pid` is out of range.
    pub fn remove(&self, pid: u32) -> KResult<Option<Arc<Process>>> {
        let index = Self::index(pid)?;
        let mut slots = self.slots.lock();
        Ok(slots[index].take())
    }

    pub fn get(&self, pid: u32) -> KResult<Arc<Process>> {
        let index = Self::index(pid)?;
        self.slots.lock()[index].clone().ok_or(Errno::Esrch)
    }

    /// Read-only diagnostic snapshot of every occupied PID.
    pub fn snapshot(&self) -> Vec<u32> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| PID_MIN + i as u32))
            .collect()
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        ProcTable::new()
    }
}
