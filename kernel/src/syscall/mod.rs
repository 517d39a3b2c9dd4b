//! The syscall surface: process calls (`fork`/`execv`/`_exit`/`waitpid`/
//! `getpid`) and file calls (`open`/`close`/`read`/`write`/`lseek`/`dup2`/
//! `chdir`/`__getcwd`). Both operate against an explicit `current: &Process`
//! rather than a global "current process" lookup — which thread is running
//! which process is the out-of-scope scheduler's business, not this
//! module's.
//!
//! `Syscalls` bundles the collaborators every call needs: the coremap (for
//! any usercopy that has to fault in a page), the process table, and the
//! two out-of-scope contracts (`Vfs`, `ElfLoader`) that only `execv`/the
//! file calls ever reach into.

pub mod file_calls;
pub mod process_calls;

pub use file_calls::{O_RDONLY, O_RDWR, O_WRONLY};
pub use process_calls::ExecResult;

use crate::external::{ElfLoader, Vfs};
use crate::mm::Coremap;
use crate::proc::ProcTable;

pub struct Syscalls<'a> {
    pub proctable: &'a ProcTable,
    pub coremap: &'a Coremap,
    pub vfs: &'a dyn Vfs,
    pub elf: &'a dyn ElfLoader,
}

impl<'a> Syscalls<'a> {
    pub fn new(proctable: &'a ProcTable, coremap: &'a Coremap, vfs: &'a dyn Vfs, elf: &'a dyn ElfLoader) -> Self {
        Syscalls {
            proctable,
            coremap,
            vfs,
            elf,
        }
    }
}
