//! Physical/virtual memory map for the 32-bit MIPS-like target.
//!
//! Modeled on the classic three-segment MIPS layout: `kuseg` (mapped,
//! per-process, `0x0000_0000..0x8000_0000`), `kseg0` (unmapped, cached,
//! direct physical view, `0x8000_0000..0xa000_0000`), `kseg1` (unmapped,
//! uncached — MMIO, not used by this crate). KSEG2 (mapped kernel space)
//! is explicitly out of scope (spec Non-goals).

/// Bytes per page frame.
pub const PAGE_SIZE: usize = 4096;

/// Mask that rounds a virtual/physical address down to its containing
/// page frame.
pub const PAGE_FRAME: usize = !(PAGE_SIZE - 1);

/// Base of the unmapped, cached, direct-physical-mapped kernel segment.
/// `kvaddr = paddr | KSEG0_BASE` and `paddr = kvaddr & !KSEG0_BASE`.
pub const KSEG0_BASE: usize = 0x8000_0000;

/// Top of user virtual address space; also numerically the start of
/// `KSEG0`, since `kuseg` runs `0x0..KSEG0_BASE`.
pub const USERSTACK: usize = KSEG0_BASE;

/// Maximum size of a process's user stack; the stack occupies
/// `[USERSTACK - USERSTACK_SIZE, USERSTACK)` and grows down from the top.
pub const USERSTACK_SIZE: usize = 2 * 1024 * 1024;

/// First virtual page number bits: top 10 bits of a 32-bit address.
pub const PAGE_TABLE_L1_SHIFT: u32 = 22;
pub const PAGE_TABLE_L1_MASK: usize = 0xFFC0_0000;

/// Second-level index: next 10 bits.
pub const PAGE_TABLE_L2_SHIFT: u32 = 12;
pub const PAGE_TABLE_L2_MASK: usize = 0x003F_F000;

/// First-level page-table index for a virtual address.
pub const fn l1_index(vaddr: usize) -> usize {
    (vaddr & PAGE_TABLE_L1_MASK) >> PAGE_TABLE_L1_SHIFT
}

/// Second-level page-table index for a virtual address.
pub const fn l2_index(vaddr: usize) -> usize {
    (vaddr & PAGE_TABLE_L2_MASK) >> PAGE_TABLE_L2_SHIFT
}

/// Round an address down to the start of its page.
pub const fn page_round_down(addr: usize) -> usize {
    addr & PAGE_FRAME
}

/// Round a size/address up to the next page boundary.
pub const fn page_round_up(addr: usize) -> usize {
    (addr + PAGE_SIZE - 1) & PAGE_FRAME
}

/// Convert a physical address to this kernel's direct-mapped virtual view.
pub const fn paddr_to_kvaddr(paddr: usize) -> usize {
    paddr | KSEG0_BASE
}

/// Convert a kernel direct-mapped virtual address back to physical.
pub const fn kvaddr_to_paddr(kvaddr: usize) -> usize {
    kvaddr & !KSEG0_BASE
}

/// TLB entry masks, per spec §6.
pub const TLB_HI_VPAGE: usize = PAGE_FRAME;
pub const TLB_LO_PPAGE: usize = PAGE_FRAME;

bitflags::bitflags! {
    /// Status bits packed into EntryLo alongside the physical frame
    /// number, per spec §6.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TlbLoFlags: usize {
        const VALID = 1 << 1;
        const DIRTY = 1 << 2;
    }
}
