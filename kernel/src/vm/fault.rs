//! TLB refill: on a translation miss the out-of-scope trap dispatcher
//! calls here with the fault type and faulting address; this computes
//! the EntryHi/EntryLo pair to load, allocating a backing frame on first
//! touch. Actually writing the hardware TLB register is the CPU
//! trampoline's job, not this crate's.

use crate::errno::{Errno, KResult};
use crate::memlayout::{page_round_down, TlbLoFlags, TLB_HI_VPAGE, TLB_LO_PPAGE};
use crate::mm::Coremap;
use crate::sync::spinlock::{push_off, pop_off};
use crate::vm::addrspace::AddrSpace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    Read,
    Write,
    /// A write fault on a page the MMU reports read-only. Pages are
    /// currently always created writable, so this can only mean a
    /// hardware/page-table inconsistency.
    Readonly,
}

/// The EntryHi/EntryLo pair the caller should load into the TLB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    pub entry_hi: usize,
    pub entry_lo: usize,
}

/// Look up the frame backing `page_addr` (already page-aligned),
/// allocating and binding one on first touch. Shared by `vm_fault` and
/// the user-copy helpers in `vm::usercopy`, which need the same
/// lazy-backing behavior without going through a TLB-entry computation.
pub fn ensure_backed(as_: &AddrSpace, coremap: &Coremap, page_addr: usize) -> KResult<usize> {
    let entry = as_.page_table.get_entry(page_addr).ok_or(Errno::Efault)?;
    if entry.paddr != 0 {
        return Ok(entry.paddr);
    }
    let p = coremap.alloc_upage(as_.id(), page_addr);
    if p == 0 {
        return Err(Errno::Enomem);
    }
    as_.page_table.set_backing(page_addr, p)?;
    Ok(p)
}

/// Resolve a TLB miss against `as_`. Absent entries are `EFAULT`
/// (the process gets killed by the syscall layer); present-but-unbacked
/// entries get a frame allocated on the spot.
pub fn vm_fault(as_: &AddrSpace, coremap: &Coremap, fault_type: FaultType, vaddr: usize) -> KResult<TlbEntry> {
    if fault_type == FaultType::Readonly {
        panic!("read-only fault on a page that was created writable");
    }

    let page_addr = page_round_down(vaddr);
    let paddr = ensure_backed(as_, coremap, page_addr)?;

    // The actual TLB write instruction is off-limits here (CPU
    // trampoline); interrupts are masked only around the register pair
    // computation, matching where the source disables them.
    push_off();
    let flags = TlbLoFlags::VALID | TlbLoFlags::DIRTY;
    let tlb = TlbEntry {
        entry_hi: page_addr & TLB_HI_VPAGE,
        entry_lo: (paddr & TLB_LO_PPAGE) | flags.bits(),
    };
    pop_off();
    Ok(tlb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memlayout::PAGE_SIZE;
    use crate::tests::support::install_test_collaborators;

    #[test]
    fn unmapped_address_faults() {
        install_test_collaborators();
        let cm = Coremap::bootstrap(0, 100 * PAGE_SIZE);
        let as_ = AddrSpace::create();
        assert_eq!(vm_fault(&as_, &cm, FaultType::Read, 0x1000), Err(Errno::Efault));
    }

    #[test]
    fn lazy_backing_allocates_on_first_fault() {
        install_test_collaborators();
        let cm = Coremap::bootstrap(0, 100 * PAGE_SIZE);
        let as_ = AddrSpace::create();
        as_.define_region(0x1000, PAGE_SIZE, true, true, false).unwrap();
        assert_eq!(as_.page_table.get_entry(0x1000).unwrap().paddr, 0);

        let tlb = vm_fault(&as_, &cm, FaultType::Write, 0x1000).unwrap();
        assert_eq!(tlb.entry_hi, 0x1000);
        assert_ne!(as_.page_table.get_entry(0x1000).unwrap().paddr, 0);
    }

    #[test]
    #[should_panic(expected = "read-only fault")]
    fn readonly_fault_panics() {
        install_test_collaborators();
        let cm = Coremap::bootstrap(0, 100 * PAGE_SIZE);
        let as_ = AddrSpace::create();
        let _ = vm_fault(&as_, &cm, FaultType::Readonly, 0x1000);
    }
}
