//! Per-process virtual memory: two-level page tables, address spaces,
//! and TLB-refill fault handling.

pub mod addrspace;
pub mod fault;
pub mod pagetable;
pub mod usercopy;

pub use addrspace::{AddrSpace, Segment};
pub use fault::{vm_fault, FaultType, TlbEntry};
pub use pagetable::{PageTable, PageTableEntry};
pub use usercopy::{copyin_bytes, copyin_cstr, copyin_usize, copyout_bytes, copyout_usize};
