//! `load_elf` is out of scope (spec §1): an opaque loader that, given an
//! opened executable and an active address space, populates the
//! code/data segments and reports the entry point.

use crate::errno::KResult;
use crate::external::vfs::VnodeRef;
use crate::vm::addrspace::AddrSpace;

pub trait ElfLoader: Sync {
    /// Populate `into`'s segments from `executable`. `into` must already
    /// be the *active* address space (execv activates the new address
    /// space before loading, per spec §4.E step 4).
    fn load(&self, executable: &VnodeRef, into: &mut AddrSpace) -> KResult<usize>;
}
