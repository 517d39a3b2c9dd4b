//! Physical frame allocator. Tracks every usable physical page after the
//! kernel image and services contiguous kernel allocations plus
//! single-page user allocations.
//!
//! The coremap conceptually lives inside the memory it manages
//! (bootstrap self-placement): `bootstrap` reserves whole pages for its
//! own header+array before computing the window it actually tracks, and
//! `first_paddr` records that boundary. The reservation is only
//! arithmetic here — the array itself is heap-allocated — but the
//! boundary it produces is the one every index computation below must
//! respect.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::errno::{Errno, KResult};
use crate::memlayout::PAGE_SIZE;
use crate::mm::physmem;
use crate::sync::spinlock::Spinlock;

/// Identifies an owning address space without this leaf module depending
/// on `vm::addrspace`. Callers pass the address space's own address.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AsId(pub usize);

const FLAG_ALLOCATED: u32 = 1 << 0;
const FLAG_CONTIG: u32 = 1 << 1;
const FLAG_WRITABLE: u32 = 1 << 2;
const FRAME_SHIFT: u32 = 12;

#[derive(Clone, Copy)]
struct Entry {
    owner: Option<AsId>,
    vaddr: usize,
    info: u32,
}

impl Entry {
    fn new(paddr: usize) -> Self {
        Entry {
            owner: None,
            vaddr: 0,
            info: (paddr as u32 >> FRAME_SHIFT) << FRAME_SHIFT,
        }
    }

    fn allocated(&self) -> bool {
        self.info & FLAG_ALLOCATED != 0
    }

    fn contig(&self) -> bool {
        self.info & FLAG_CONTIG != 0
    }

    fn writable(&self) -> bool {
        self.info & FLAG_WRITABLE != 0
    }

    fn set_flag(&mut self, flag: u32, on: bool) {
        if on {
            self.info |= flag;
        } else {
            self.info &= !flag;
        }
    }
}

pub struct Coremap {
    entries: Spinlock<Vec<Entry>>,
    /// Count of managed frames; immutable once `bootstrap` returns.
    n_mapped: usize,
    /// Physical address of the first managed frame; immutable.
    first_paddr: usize,
    /// Updated under `entries`' lock, read lock-free by `used_bytes` —
    /// the one operation spec'd to return a possibly-stale snapshot.
    free_count: AtomicUsize,
}

impl Coremap {
    /// Lay out the coremap over `[first_free_paddr, ram_size)`: size the
    /// header+array, round up to whole pages, and begin the managed
    /// region immediately after.
    pub fn bootstrap(first_free_paddr: usize, ram_size: usize) -> Coremap {
        assert_eq!(first_free_paddr % PAGE_SIZE, 0, "first_free_paddr must be page-aligned");
        assert!(ram_size > first_free_paddr, "no RAM left after kernel image");

        let pages_free = (ram_size - first_free_paddr) / PAGE_SIZE;
        let entry_size = core::mem::size_of::<Entry>();
        let header_size = core::mem::size_of::<Coremap>();
        let coremap_bytes = header_size + pages_free * entry_size;
        let n_coremap_pages = (coremap_bytes + PAGE_SIZE - 1) / PAGE_SIZE;
        let first_paddr = first_free_paddr + n_coremap_pages * PAGE_SIZE;

        assert!(first_paddr < ram_size, "no frames left to manage after coremap self-placement");
        let n_mapped = (ram_size - first_paddr) / PAGE_SIZE;

        let mut entries = Vec::with_capacity(n_mapped);
        for i in 0..n_mapped {
            entries.push(Entry::new(first_paddr + i * PAGE_SIZE));
        }

        Coremap {
            entries: Spinlock::new("coremap", entries),
            n_mapped,
            first_paddr,
            free_count: AtomicUsize::new(n_mapped),
        }
    }

    pub fn n_mapped(&self) -> usize {
        self.n_mapped
    }

    fn index_of(&self, paddr: usize) -> Option<usize> {
        if paddr < self.first_paddr {
            return None;
        }
        let index = (paddr - self.first_paddr) / PAGE_SIZE;
        if index >= self.n_mapped {
            None
        } else {
            Some(index)
        }
    }

    /// Linear-scan for `n` contiguous free frames and mark them allocated.
    /// Returns the kernel-virtual address of the run's first frame, or 0
    /// if `n == 0` or no run of that length is free.
    pub fn alloc_kpages(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let mut entries = self.entries.lock();
        if self.free_count.load(Ordering::Relaxed) < n {
            return 0;
        }

        let total = entries.len();
        let mut run_start = None;
        let mut i = 0;
        while i + n <= total {
            if (0..n).all(|j| !entries[i + j].allocated()) {
                run_start = Some(i);
                break;
            }
            i += 1;
        }

        let start = match run_start {
            Some(s) => s,
            None => return 0,
        };

        for j in 0..n {
            let e = &mut entries[start + j];
            e.set_flag(FLAG_ALLOCATED, true);
            e.set_flag(FLAG_CONTIG, j != 0);
            e.set_flag(FLAG_WRITABLE, true);
            e.owner = None;
        }
        self.free_count.fetch_sub(n, Ordering::Relaxed);
        let paddr = self.first_paddr + start * PAGE_SIZE;
        drop(entries);
        physmem::kvaddr_for(paddr)
    }

    /// Free the run starting at `vaddr`. A no-op on a misaligned or
    /// out-of-range address, or one that names an already-free frame.
    /// The forward walk is bounded by `n_mapped` so a contiguous run
    /// ending at the last managed frame can never read past the array.
    pub fn free_kpages(&self, vaddr: usize) {
        if vaddr % PAGE_SIZE != 0 {
            return;
        }
        let paddr = physmem::paddr_for(vaddr);
        let mut entries = self.entries.lock();
        let start = match self.index_of(paddr) {
            Some(i) => i,
            None => return,
        };
        if !entries[start].allocated() {
            return;
        }
        entries[start].set_flag(FLAG_ALLOCATED, false);
        self.free_count.fetch_add(1, Ordering::Relaxed);

        let mut i = start + 1;
        while i < self.n_mapped && entries[i].allocated() && entries[i].contig() {
            entries[i].set_flag(FLAG_ALLOCATED, false);
            entries[i].set_flag(FLAG_CONTIG, false);
            self.free_count.fetch_add(1, Ordering::Relaxed);
            i += 1;
        }
    }

    /// Allocate a single frame for user space, bound to `owner`/`vaddr`.
    /// Returns the physical address, or 0 if no frame is free.
    pub fn alloc_upage(&self, owner: AsId, vaddr: usize) -> usize {
        let mut entries = self.entries.lock();
        if self.free_count.load(Ordering::Relaxed) == 0 {
            return 0;
        }
        let index = match (0..entries.len()).find(|&i| !entries[i].allocated()) {
            Some(i) => i,
            None => return 0,
        };
        let e = &mut entries[index];
        e.set_flag(FLAG_ALLOCATED, true);
        e.set_flag(FLAG_CONTIG, false);
        e.set_flag(FLAG_WRITABLE, true);
        e.owner = Some(owner);
        e.vaddr = vaddr;
        self.free_count.fetch_sub(1, Ordering::Relaxed);
        self.first_paddr + index * PAGE_SIZE
    }

    /// Free a user frame. `EPERM` if `caller` does not own it. The index
    /// range-check is against `n_mapped`, the total frame count — not
    /// `free_count`, which changes underneath a free in progress.
    pub fn free_upage(&self, paddr: usize, caller: AsId) -> KResult<()> {
        if paddr % PAGE_SIZE != 0 {
            return Err(Errno::Einval);
        }
        let mut entries = self.entries.lock();
        let index = self.index_of(paddr).ok_or(Errno::Efault)?;
        let e = &mut entries[index];
        if e.owner != Some(caller) {
            return Err(Errno::Eperm);
        }
        e.owner = None;
        e.vaddr = 0;
        e.set_flag(FLAG_ALLOCATED, false);
        e.set_flag(FLAG_CONTIG, false);
        e.set_flag(FLAG_WRITABLE, false);
        self.free_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Copy one page from `src` to `dest`, both physical addresses. Both
    /// must be page-aligned and within the managed region; `dest` must be
    /// allocated and writable.
    pub fn copy_page(&self, src: usize, dest: usize) -> KResult<()> {
        if src % PAGE_SIZE != 0 || dest % PAGE_SIZE != 0 {
            return Err(Errno::Einval);
        }
        let entries = self.entries.lock();
        self.index_of(src).ok_or(Errno::Efault)?;
        let dest_index = self.index_of(dest).ok_or(Errno::Efault)?;
        if !entries[dest_index].allocated() || !entries[dest_index].writable() {
            return Err(Errno::Efault);
        }
        drop(entries);
        // SAFETY: both addresses were just validated as page-aligned and
        // within the managed region.
        unsafe { physmem::copy_page(src, dest) };
        Ok(())
    }

    /// Bytes currently allocated. Lock-free; may be stale by the time the
    /// caller observes it.
    pub fn used_bytes(&self) -> usize {
        (self.n_mapped - self.free_count.load(Ordering::Relaxed)) * PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot(frames: usize) -> Coremap {
        let first_free = 0;
        let ram = frames * PAGE_SIZE + PAGE_SIZE * 8;
        Coremap::bootstrap(first_free, ram)
    }

    #[test]
    fn alloc_zero_returns_zero() {
        let cm = boot(16);
        assert_eq!(cm.alloc_kpages(0), 0);
    }

    #[test]
    fn alloc_more_than_free_fails_without_mutation() {
        let cm = boot(4);
        let before = cm.used_bytes();
        assert_eq!(cm.alloc_kpages(cm.n_mapped() + 1), 0);
        assert_eq!(cm.used_bytes(), before);
    }

    #[test]
    fn frame_allocator_round_trip() {
        let cm = boot(1000);
        let v1 = cm.alloc_kpages(4);
        assert_ne!(v1, 0);
        let v2 = cm.alloc_kpages(1);
        assert_ne!(v2, 0);
        cm.free_kpages(v1);
        let v3 = cm.alloc_kpages(3);
        assert_ne!(v3, 0);
        // v3 must land inside the 4-frame run just freed.
        let p1 = physmem::paddr_for(v1);
        let p3 = physmem::paddr_for(v3);
        assert!(p3 >= p1 && p3 < p1 + 4 * PAGE_SIZE);
        assert_eq!(cm.used_bytes(), PAGE_SIZE);
    }

    #[test]
    fn free_kpages_unaligned_is_noop() {
        let cm = boot(16);
        let before = cm.used_bytes();
        cm.free_kpages(1);
        assert_eq!(cm.used_bytes(), before);
    }

    #[test]
    fn upage_ownership_enforced() {
        let cm = boot(16);
        let a = AsId(1);
        let b = AsId(2);
        let paddr = cm.alloc_upage(a, 0x1000);
        assert_ne!(paddr, 0);
        assert_eq!(cm.free_upage(paddr, b), Err(Errno::Eperm));
        assert_eq!(cm.free_upage(paddr, a), Ok(()));
    }

    #[test]
    fn copy_page_requires_allocated_writable_dest() {
        let cm = boot(16);
        let a = AsId(1);
        let src = cm.alloc_upage(a, 0x1000);
        let dest = cm.alloc_upage(a, 0x2000);
        assert!(cm.copy_page(src, dest).is_ok());
        assert_eq!(cm.copy_page(src, 0xdead_f000), Err(Errno::Efault));
    }
}
