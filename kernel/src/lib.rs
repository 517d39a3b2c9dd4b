//! Kernel core of a teaching operating system targeting a 32-bit
//! MIPS-like machine, modeled after OS/161: synchronization primitives,
//! a coremap frame allocator, two-level page tables and address spaces,
//! a process table, and the process/file syscall surface. The trap
//! dispatcher, VFS, ELF loader, device drivers, and scheduler internals
//! are out of scope and live behind the traits in `external`.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod errno;
pub mod external;
pub mod fs;
pub mod klog;
pub mod memlayout;
pub mod mm;
pub mod param;
pub mod proc;
pub mod sync;
pub mod syscall;
pub mod vm;

#[cfg(test)]
pub mod tests;

#[cfg(not(test))]
mod heap {
    use linked_list_allocator::LockedHeap;

    /// Bare-metal heap backing `Box`/`Vec`/`Arc`. Separate from the
    /// simulated-RAM arena in `mm::physmem`: this is the kernel's own
    /// bookkeeping heap, not page-granular user memory.
    const HEAP_SIZE: usize = 1024 * 1024;

    #[repr(align(16))]
    struct HeapArena([u8; HEAP_SIZE]);
    static mut HEAP_ARENA: HeapArena = HeapArena([0u8; HEAP_SIZE]);

    #[global_allocator]
    static ALLOCATOR: LockedHeap = LockedHeap::empty();

    /// # Safety
    /// Must be called exactly once, before any allocation, from the
    /// single-threaded boot path.
    pub unsafe fn init() {
        ALLOCATOR.lock().init(HEAP_ARENA.0.as_mut_ptr(), HEAP_SIZE);
    }
}

#[cfg(not(test))]
pub use heap::init as init_heap;
