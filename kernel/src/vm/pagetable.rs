//! Two-level page table: top 10 bits of a virtual address select a
//! first-level slot, the next 10 bits a second-level slot. Second-level
//! arrays are allocated on first use in that first-level slot — an
//! arena-of-arenas, with entries stored inline rather than behind their
//! own heap allocation.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::errno::{Errno, KResult};
use crate::memlayout::{l1_index, l2_index, PTE_PER_TABLE};
use crate::mm::{AsId, Coremap};
use crate::sync::spinlock::Spinlock;

/// One mapping: the virtual page it covers and the physical frame
/// backing it (0 = allocated but not yet faulted in).
#[derive(Clone, Copy)]
pub struct PageTableEntry {
    pub vaddr: usize,
    pub paddr: usize,
}

type SecondLevel = Box<[Option<PageTableEntry>; PTE_PER_TABLE]>;

struct Inner {
    l1: Vec<Option<SecondLevel>>,
    n_alloc: usize,
}

fn empty_second_level() -> SecondLevel {
    // `Box<[T; N]>` has no direct array-literal constructor for N this
    // large without blowing the stack on debug builds, so build it via a
    // Vec and convert.
    let v: Vec<Option<PageTableEntry>> = vec![None; PTE_PER_TABLE];
    v.into_boxed_slice()
        .try_into()
        .unwrap_or_else(|_| unreachable!("PTE_PER_TABLE-sized vec always converts"))
}

pub struct PageTable {
    inner: Spinlock<Inner>,
}

impl PageTable {
    pub fn new() -> PageTable {
        let mut l1 = Vec::with_capacity(PTE_PER_TABLE);
        l1.resize_with(PTE_PER_TABLE, || None);
        PageTable {
            inner: Spinlock::new("pagetable", Inner { l1, n_alloc: 0 }),
        }
    }

    pub fn n_alloc(&self) -> usize {
        self.inner.lock().n_alloc
    }

    /// Create an unbacked entry for `vaddr`. `EFAULT` if one already
    /// exists there.
    pub fn alloc_page(&self, vaddr: usize) -> KResult<()> {
        let mut inner = self.inner.lock();
        let l1 = l1_index(vaddr);
        let l2 = l2_index(vaddr);
        if inner.l1[l1].is_none() {
            inner.l1[l1] = Some(empty_second_level());
        }
        let second = inner.l1[l1].as_mut().unwrap();
        if second[l2].is_some() {
            return Err(Errno::Efault);
        }
        second[l2] = Some(PageTableEntry { vaddr, paddr: 0 });
        inner.n_alloc += 1;
        Ok(())
    }

    /// Detach the entry for `vaddr`, if any, and free its backing frame
    /// through `coremap`. A no-op if the slot is absent.
    pub fn free_page(&self, vaddr: usize, coremap: &Coremap, owner: AsId) {
        let mut inner = self.inner.lock();
        let l1 = l1_index(vaddr);
        let l2 = l2_index(vaddr);
        let entry = match inner.l1[l1].as_mut().and_then(|second| second[l2].take()) {
            Some(e) => e,
            None => return,
        };
        inner.n_alloc -= 1;
        drop(inner);
        if entry.paddr != 0 {
            coremap
                .free_upage(entry.paddr, owner)
                .expect("page table freed a frame it did not own");
        }
    }

    /// Lookup without allocating any intermediate second-level array.
    pub fn get_entry(&self, vaddr: usize) -> Option<PageTableEntry> {
        let inner = self.inner.lock();
        let l1 = l1_index(vaddr);
        let l2 = l2_index(vaddr);
        inner.l1[l1].as_ref().and_then(|second| second[l2])
    }

    /// Bind a physical frame to an already-allocated-but-unbacked entry.
    /// Used by the TLB fault handler once it has obtained a frame.
    pub fn set_backing(&self, vaddr: usize, paddr: usize) -> KResult<()> {
        let mut inner = self.inner.lock();
        let l1 = l1_index(vaddr);
        let l2 = l2_index(vaddr);
        let entry = inner.l1[l1]
            .as_mut()
            .and_then(|second| second[l2].as_mut())
            .ok_or(Errno::Efault)?;
        entry.paddr = paddr;
        Ok(())
    }

    /// Deep-copy: build a fresh table, and for every backed entry
    /// allocate a new frame owned by `new_owner` and copy its bytes;
    /// unbacked entries are recreated unbacked (there is nothing yet to
    /// copy). On `ENOMEM` partway through, the partial destination table
    /// is torn down and the error reported.
    pub fn copy(&self, coremap: &Coremap, new_owner: AsId) -> KResult<PageTable> {
        let inner = self.inner.lock();
        let dest = PageTable::new();
        {
            let mut dest_inner = dest.inner.lock();
            for second in inner.l1.iter().flatten() {
                for entry in second.iter().flatten() {
                    let result = Self::copy_one(&mut dest_inner, coremap, new_owner, entry);
                    if let Err(e) = result {
                        drop(dest_inner);
                        dest.destroy(coremap, new_owner);
                        return Err(e);
                    }
                }
            }
        }
        Ok(dest)
    }

    fn copy_one(
        dest_inner: &mut Inner,
        coremap: &Coremap,
        new_owner: AsId,
        src_entry: &PageTableEntry,
    ) -> KResult<()> {
        let l1 = l1_index(src_entry.vaddr);
        let l2 = l2_index(src_entry.vaddr);
        if dest_inner.l1[l1].is_none() {
            dest_inner.l1[l1] = Some(empty_second_level());
        }

        let new_paddr = if src_entry.paddr != 0 {
            let paddr = coremap.alloc_upage(new_owner, src_entry.vaddr);
            if paddr == 0 {
                return Err(Errno::Enomem);
            }
            coremap.copy_page(src_entry.paddr, paddr)?;
            paddr
        } else {
            0
        };

        let second = dest_inner.l1[l1].as_mut().unwrap();
        second[l2] = Some(PageTableEntry {
            vaddr: src_entry.vaddr,
            paddr: new_paddr,
        });
        dest_inner.n_alloc += 1;
        Ok(())
    }

    /// Free every backing frame and tear down the table. Asserts
    /// `n_alloc == 0` afterward — a non-zero count means some entry was
    /// skipped, an invariant violation rather than a recoverable error.
    pub fn destroy(&self, coremap: &Coremap, owner: AsId) {
        let mut inner = self.inner.lock();
        for second in inner.l1.iter_mut().flatten() {
            for slot in second.iter_mut() {
                if let Some(entry) = slot.take() {
                    inner.n_alloc -= 1;
                    if entry.paddr != 0 {
                        coremap
                            .free_upage(entry.paddr, owner)
                            .expect("page table destroy freed a frame it did not own");
                    }
                }
            }
        }
        assert_eq!(inner.n_alloc, 0, "page table destroy left entries behind");
    }
}

impl Default for PageTable {
    fn default() -> Self {
        PageTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coremap() -> Coremap {
        Coremap::bootstrap(0, 2000 * crate::memlayout::PAGE_SIZE)
    }

    #[test]
    fn alloc_then_free_clears_entry() {
        let cm = coremap();
        let pt = PageTable::new();
        let owner = AsId(1);
        pt.alloc_page(0x1000).unwrap();
        assert!(pt.get_entry(0x1000).is_some());
        pt.free_page(0x1000, &cm, owner);
        assert!(pt.get_entry(0x1000).is_none());
    }

    #[test]
    fn double_alloc_same_page_fails() {
        let pt = PageTable::new();
        pt.alloc_page(0x1000).unwrap();
        assert_eq!(pt.alloc_page(0x1000), Err(Errno::Efault));
    }

    #[test]
    fn copy_rolls_back_without_underflow_on_mid_copy_enomem() {
        let cm = coremap();
        let owner_a = AsId(1);
        let owner_b = AsId(2);
        let pt = PageTable::new();
        pt.alloc_page(0x1000).unwrap();
        pt.alloc_page(0x2000).unwrap();
        let p1 = cm.alloc_upage(owner_a, 0x1000);
        let p2 = cm.alloc_upage(owner_a, 0x2000);
        pt.set_backing(0x1000, p1).unwrap();
        pt.set_backing(0x2000, p2).unwrap();

        // Exhaust every remaining frame but one, so the destination
        // table's copy succeeds for the first backed entry and must fail
        // with ENOMEM on the second — exercising the rollback path with
        // a non-empty partial destination table.
        let mut filler = Vec::new();
        loop {
            let p = cm.alloc_upage(owner_a, 0);
            if p == 0 {
                break;
            }
            filler.push(p);
        }
        let spare = filler.pop().unwrap();
        cm.free_upage(spare, owner_a).unwrap();

        let result = pt.copy(&cm, owner_b);
        assert_eq!(result.err(), Some(Errno::Enomem));
    }

    #[test]
    fn copy_is_deep() {
        let cm = coremap();
        let owner_a = AsId(1);
        let owner_b = AsId(2);
        let pt = PageTable::new();
        pt.alloc_page(0x1000).unwrap();
        let paddr = cm.alloc_upage(owner_a, 0x1000);
        pt.set_backing(0x1000, paddr).unwrap();
        unsafe {
            *crate::mm::physmem::paddr_to_ptr(paddr) = 0xAA;
        }

        let copy = pt.copy(&cm, owner_b).unwrap();
        let copied_entry = copy.get_entry(0x1000).unwrap();
        assert_ne!(copied_entry.paddr, paddr);

        unsafe {
            *crate::mm::physmem::paddr_to_ptr(paddr) = 0xBB;
        }
        let copied_byte = unsafe { *crate::mm::physmem::paddr_to_ptr(copied_entry.paddr) };
        assert_eq!(copied_byte, 0xAA);
    }

    #[test]
    fn destroy_with_live_pages_frees_all_and_zeroes_n_alloc() {
        let cm = coremap();
        let owner = AsId(1);
        let pt = PageTable::new();
        pt.alloc_page(0x1000).unwrap();
        pt.alloc_page(0x2000).unwrap();
        let paddr = cm.alloc_upage(owner, 0x1000);
        pt.set_backing(0x1000, paddr).unwrap();
        pt.destroy(&cm, owner);
        assert_eq!(pt.n_alloc(), 0);
    }
}
