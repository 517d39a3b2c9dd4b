//! Simulated RAM. The trap dispatcher and CPU trampoline that would
//! otherwise hand the kernel a physical address space are out of scope
//! (spec §1), so on the host build (and in `cfg(test)`) physical memory
//! is backed by a static byte arena instead of real hardware — the same
//! role System/161 plays for the machine this crate models.

use crate::memlayout::{kvaddr_to_paddr, paddr_to_kvaddr, PAGE_SIZE};

/// Total simulated RAM, in bytes. Large enough for coremap tests to
/// exercise multi-hundred-frame scenarios without real hardware.
pub const RAM_SIZE: usize = 8 * 1024 * 1024;

#[repr(align(4096))]
struct RamArena([u8; RAM_SIZE]);

static mut RAM: RamArena = RamArena([0u8; RAM_SIZE]);

/// Base kernel-virtual address backing physical address 0. On the real
/// target this would simply be `KSEG0_BASE`; here it's wherever the host
/// allocator decided to place `RAM`, so `kvaddr_of`/`paddr_of` go through
/// this indirection rather than `paddr_to_kvaddr` directly.
fn ram_base() -> usize {
    core::ptr::addr_of!(RAM) as usize
}

/// Total simulated RAM size, in bytes.
pub fn ram_size() -> usize {
    RAM_SIZE
}

/// Translate a physical address (an offset into simulated RAM) to a
/// kernel-virtual pointer usable for direct access.
///
/// # Safety
/// `paddr` must be `< RAM_SIZE`.
pub unsafe fn paddr_to_ptr(paddr: usize) -> *mut u8 {
    (ram_base() + paddr) as *mut u8
}

/// Zero a page of simulated physical memory.
///
/// # Safety
/// `paddr` must be page-aligned and `< RAM_SIZE`.
pub unsafe fn zero_page(paddr: usize) {
    let ptr = paddr_to_ptr(paddr);
    core::ptr::write_bytes(ptr, 0, PAGE_SIZE);
}

/// Copy one page of simulated physical memory from `src` to `dest`.
///
/// # Safety
/// Both addresses must be page-aligned and `< RAM_SIZE`.
pub unsafe fn copy_page(src: usize, dest: usize) {
    let src_ptr = paddr_to_ptr(src);
    let dest_ptr = paddr_to_ptr(dest);
    core::ptr::copy_nonoverlapping(src_ptr, dest_ptr, PAGE_SIZE);
}

/// Kernel-virtual address the coremap should record in its entries; kept
/// distinct from the bare `paddr_to_kvaddr` KSEG0 arithmetic so the rest
/// of `mm`/`vm` can be written against the real memory map while the host
/// build quietly substitutes the arena's actual address.
pub fn kvaddr_for(paddr: usize) -> usize {
    if cfg!(test) {
        ram_base() + paddr
    } else {
        paddr_to_kvaddr(paddr)
    }
}

/// Inverse of [`kvaddr_for`].
pub fn paddr_for(kvaddr: usize) -> usize {
    if cfg!(test) {
        kvaddr - ram_base()
    } else {
        kvaddr_to_paddr(kvaddr)
    }
}
