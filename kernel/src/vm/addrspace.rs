//! Per-process virtual memory container: one page table plus a resizable
//! segment list, with distinguished heap and stack pointers.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::errno::KResult;
use crate::memlayout::{page_round_down, PAGE_SIZE, USERSTACK, USERSTACK_SIZE};
use crate::mm::{AsId, Coremap};
use crate::sync::spinlock::Spinlock;
use crate::vm::pagetable::PageTable;

/// A mapped region: base virtual address and page count. Permission bits
/// are recorded but not currently enforced by the fault handler (open
/// question in the source this crate is based on — segments are created
/// writable regardless).
#[derive(Clone, Copy)]
pub struct Segment {
    pub start_vaddr: usize,
    pub n_pages: usize,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

struct SegmentState {
    segments: Vec<Option<Segment>>,
    heap_start: usize,
    heap_end: usize,
    stack_base: usize,
}

static NEXT_AS_ID: AtomicUsize = AtomicUsize::new(1);

pub struct AddrSpace {
    pub page_table: PageTable,
    id: AsId,
    state: Spinlock<SegmentState>,
}

impl AddrSpace {
    /// Identity used to tag frames this address space owns in the
    /// coremap. A monotonic counter rather than `self`'s address, since
    /// address spaces are built before they have a final, stable home
    /// (see `copy`).
    fn next_id() -> AsId {
        AsId(NEXT_AS_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn create() -> AddrSpace {
        let mut segments = Vec::with_capacity(4);
        segments.resize_with(4, || None);
        AddrSpace {
            page_table: PageTable::new(),
            id: Self::next_id(),
            state: Spinlock::new(
                "addrspace-segments",
                SegmentState {
                    segments,
                    heap_start: 0,
                    heap_end: 0,
                    stack_base: 0,
                },
            ),
        }
    }

    pub fn id(&self) -> AsId {
        self.id
    }

    /// Define a segment of `memsize` bytes starting at `vaddr`, eagerly
    /// creating (unbacked) page-table entries for every page it covers.
    /// `r`/`w`/`x` are recorded on the segment but not yet enforced.
    pub fn define_region(&self, vaddr: usize, memsize: usize, r: bool, w: bool, x: bool) -> KResult<()> {
        let start = page_round_down(vaddr);
        let n_pages = (memsize + PAGE_SIZE - 1) / PAGE_SIZE;
        let seg = Segment {
            start_vaddr: start,
            n_pages,
            readable: r,
            writable: w,
            executable: x,
        };

        {
            let mut state = self.state.lock();
            match state.segments.iter_mut().find(|s| s.is_none()) {
                Some(slot) => *slot = Some(seg),
                None => state.segments.push(Some(seg)),
            }
            let end = start + n_pages * PAGE_SIZE;
            if state.heap_start == 0 || end > state.heap_end {
                state.heap_end = end;
            }
            if state.heap_start == 0 {
                state.heap_start = end;
            }
        }

        for i in 0..n_pages {
            self.page_table.alloc_page(start + i * PAGE_SIZE)?;
        }
        Ok(())
    }

    /// Install the 2 MiB user stack segment, eagerly backed with
    /// unbacked page-table entries, and return the initial stack pointer
    /// (`USERSTACK`).
    pub fn define_stack(&self) -> KResult<usize> {
        let start = USERSTACK - USERSTACK_SIZE;
        let n_pages = USERSTACK_SIZE / PAGE_SIZE;
        let seg = Segment {
            start_vaddr: start,
            n_pages,
            readable: true,
            writable: true,
            executable: false,
        };

        {
            let mut state = self.state.lock();
            match state.segments.iter_mut().find(|s| s.is_none()) {
                Some(slot) => *slot = Some(seg),
                None => state.segments.push(Some(seg)),
            }
            state.stack_base = start;
        }

        for i in 0..n_pages {
            self.page_table.alloc_page(start + i * PAGE_SIZE)?;
        }
        Ok(USERSTACK)
    }

    /// Deep-copy: a fresh page table with every backed frame copied, plus
    /// a clone of every segment record and the heap/stack pointers.
    pub fn copy(&self, coremap: &Coremap) -> KResult<AddrSpace> {
        let mut new_as = AddrSpace::create();
        new_as.page_table = self.page_table.copy(coremap, new_as.id())?;

        let src_state = self.state.lock();
        let mut dst_state = new_as.state.lock();
        dst_state.segments = src_state.segments.clone();
        dst_state.heap_start = src_state.heap_start;
        dst_state.heap_end = src_state.heap_end;
        dst_state.stack_base = src_state.stack_base;
        drop(dst_state);
        drop(src_state);

        Ok(new_as)
    }

    /// Tear down the page table (freeing every backed frame) and drop
    /// the segment list.
    pub fn destroy(self, coremap: &Coremap) {
        self.page_table.destroy(coremap, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coremap() -> Coremap {
        Coremap::bootstrap(0, 4000 * PAGE_SIZE)
    }

    #[test]
    fn define_stack_reaches_userstack_minus_one() {
        let cm = coremap();
        let as1 = AddrSpace::create();
        let sp = as1.define_stack().unwrap();
        assert_eq!(sp, USERSTACK);
        assert!(as1.page_table.get_entry(USERSTACK - 1).is_some());
        as1.destroy(&cm);
    }

    #[test]
    fn copy_is_independent_of_original() {
        let cm = coremap();
        let a = AddrSpace::create();
        a.define_region(0x1000, PAGE_SIZE, true, true, false).unwrap();
        let paddr = cm.alloc_upage(a.id(), 0x1000);
        a.page_table.set_backing(0x1000, paddr).unwrap();
        unsafe {
            *crate::mm::physmem::paddr_to_ptr(paddr) = 0x42;
        }

        let b = a.copy(&cm).unwrap();
        let b_entry = b.page_table.get_entry(0x1000).unwrap();
        assert_ne!(b_entry.paddr, paddr);

        a.destroy(&cm);
        // `b` must still be usable after `a` is gone.
        let byte = unsafe { *crate::mm::physmem::paddr_to_ptr(b_entry.paddr) };
        assert_eq!(byte, 0x42);
        b.destroy(&cm);
    }
}
