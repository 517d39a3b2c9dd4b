//! Process calls: `getpid`, `fork`, `_exit`, `waitpid`, `execv`. Each takes
//! an explicit `current: &Process` (or `&Arc<Process>` where the call
//! needs to hand a clone to the process table) — there is no `myproc()`
//! global lookup here, since which thread is running which process is the
//! out-of-scope scheduler's business.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::errno::{Errno, KResult};
use crate::external::scheduler::{scheduler, Trapframe};
use crate::param::{ARG_MAX, OPEN_MAX, PATH_MAX};
use crate::proc::{wait_status, Process};
use crate::vm::addrspace::AddrSpace;
use crate::vm::usercopy::{copyin_cstr, copyin_usize, copyout_bytes};

use super::file_calls::O_RDONLY;
use super::Syscalls;

/// What the (out-of-scope) final entry into the new process image needs:
/// `enter_new_process`/the MIPS trampoline would consume these and never
/// return. That dispatch is trap/trampoline territory, so `execv` hands
/// the assembled parameters back instead of performing the jump itself.
pub struct ExecResult {
    pub argc: i32,
    pub argv_user_addr: usize,
    pub stack_pointer: usize,
    pub entry_point: usize,
}

impl<'a> Syscalls<'a> {
    pub fn getpid(&self, current: &Process) -> u32 {
        current.pid()
    }

    /// Deep-copy the address space, share the file table, install the
    /// child in the process table, and hand its trapframe to the
    /// scheduler. Any failure after the address-space copy unwinds what
    /// was already built — no frames or table slots are left attributed
    /// to a child that never gets to run.
    pub fn fork(&self, current: &Arc<Process>, trapframe: Trapframe) -> KResult<u32> {
        let child_as = {
            let guard = current.addrspace.lock();
            let parent_as = guard.as_ref().ok_or(Errno::Einval)?;
            parent_as.copy(self.coremap)?
        };
        let child_file_table = current.file_table.fork_from();
        let child = Arc::new(Process::new(
            String::from(current.name()),
            current.pid(),
            Some(child_as),
            child_file_table,
        ));

        let pid = match self.proctable.insert(child.clone()) {
            Ok(pid) => pid,
            Err(e) => {
                if let Some(as_) = child.addrspace.lock().take() {
                    as_.destroy(self.coremap);
                }
                return Err(e);
            }
        };
        child.set_pid(pid);

        if let Err(e) = scheduler().thread_fork(pid, trapframe) {
            self.proctable.remove(pid).ok();
            if let Some(as_) = child.addrspace.lock().take() {
                as_.destroy(self.coremap);
            }
            return Err(e);
        }

        Ok(pid)
    }

    /// Tear down `current`'s resources and either retire it immediately
    /// (its parent is gone or already exited — an orphan) or leave its
    /// exit status in the table for a parent's `waitpid` to collect. The
    /// scheduler's own thread teardown (`thread_exit`, which never
    /// returns) happens after this and is out of scope — this function
    /// legitimately returns once every in-scope mutation is committed.
    pub fn exit_process(&self, current: &Arc<Process>, code: i32) -> KResult<()> {
        for fd in 0..OPEN_MAX {
            let _ = current.file_table.close(fd);
        }
        if let Some(as_) = current.addrspace.lock().take() {
            as_.destroy(self.coremap);
        }

        let orphan = match self.proctable.get(current.ppid()) {
            Ok(parent) => parent.is_exited(),
            Err(_) => true,
        };

        if orphan {
            self.proctable.remove(current.pid())?;
        } else {
            current.mark_exited(wait_status::mkwait_exit(code));
        }
        Ok(())
    }

    pub fn waitpid(&self, current: &Process, pid: u32, status_uaddr: usize, options: i32) -> KResult<u32> {
        if options & !(wait_status::WNOHANG | wait_status::WUNTRACED) != 0 {
            return Err(Errno::Einval);
        }
        let target = self.proctable.get(pid)?;
        if target.ppid() != current.pid() {
            return Err(Errno::Echild);
        }
        target.wait_for_exit(current.pid());

        if status_uaddr != 0 {
            let guard = current.addrspace.lock();
            let as_ = guard.as_ref().ok_or(Errno::Efault)?;
            copyout_bytes(as_, self.coremap, status_uaddr, &target.exit_status().to_ne_bytes())?;
        }

        self.proctable.remove(pid)?;
        Ok(pid)
    }

    /// Replace `current`'s program image. Failures through address-space
    /// creation, ELF load, and stack setup roll back to the address space
    /// saved at entry. Once argument marshaling onto the new stack begins
    /// the operation can no longer be undone, and a usercopy failure there
    /// panics instead of returning an error.
    pub fn execv(&self, current: &Arc<Process>, path_uaddr: usize, argv_uaddr: usize) -> KResult<ExecResult> {
        let ptr_size = core::mem::size_of::<usize>();

        let (path, args) = {
            let guard = current.addrspace.lock();
            let as_ = guard.as_ref().ok_or(Errno::Efault)?;

            let path_bytes = copyin_cstr(as_, self.coremap, path_uaddr, PATH_MAX)?;
            let path = String::from_utf8(path_bytes).map_err(|_| Errno::Einval)?;

            let mut args: Vec<Vec<u8>> = Vec::new();
            let mut total = 0usize;
            let mut i = 0usize;
            loop {
                let entry_addr = argv_uaddr + i * ptr_size;
                let arg_uaddr = copyin_usize(as_, self.coremap, entry_addr)?;
                if arg_uaddr == 0 {
                    break;
                }
                let remaining = ARG_MAX.saturating_sub(total);
                let s = copyin_cstr(as_, self.coremap, arg_uaddr, remaining)?;
                total += s.len() + 1;
                if total > ARG_MAX {
                    return Err(Errno::E2big);
                }
                args.push(s);
                i += 1;
            }
            (path, args)
        };

        let exe = self.vfs.open(&path, O_RDONLY, 0)?;

        let old_as = current.addrspace.lock().take().ok_or(Errno::Efault)?;
        *current.addrspace.lock() = Some(AddrSpace::create());

        let entry = {
            let mut guard = current.addrspace.lock();
            let as_mut = guard.as_mut().expect("just installed above");
            match self.elf.load(&exe, as_mut) {
                Ok(e) => e,
                Err(e) => {
                    drop(guard);
                    let failed = current.addrspace.lock().take().unwrap();
                    failed.destroy(self.coremap);
                    *current.addrspace.lock() = Some(old_as);
                    return Err(e);
                }
            }
        };
        drop(exe);

        let stack_top = {
            let mut guard = current.addrspace.lock();
            let as_mut = guard.as_mut().expect("just installed above");
            match as_mut.define_stack() {
                Ok(sp) => sp,
                Err(e) => {
                    drop(guard);
                    let failed = current.addrspace.lock().take().unwrap();
                    failed.destroy(self.coremap);
                    *current.addrspace.lock() = Some(old_as);
                    return Err(e);
                }
            }
        };

        // Point of no return: the new address space is live and its stack
        // is mapped, so from here a usercopy failure means a corrupted
        // invariant, not bad userland input — it can no longer be
        // reported as an errno.
        let guard = current.addrspace.lock();
        let as_ = guard.as_ref().expect("just installed above");

        let mut sp = stack_top;
        let mut arg_addrs = Vec::with_capacity(args.len());
        for arg in &args {
            sp -= arg.len() + 1;
            copyout_bytes(as_, self.coremap, sp, arg).expect("argv string copyout failed past the point of no return");
            copyout_bytes(as_, self.coremap, sp + arg.len(), &[0])
                .expect("argv NUL copyout failed past the point of no return");
            arg_addrs.push(sp);
        }
        sp &= !(ptr_size - 1);
        let table_bytes = (args.len() + 1) * ptr_size;
        sp -= table_bytes;
        let argv_table_addr = sp;
        for (i, addr) in arg_addrs.iter().enumerate() {
            copyout_bytes(as_, self.coremap, argv_table_addr + i * ptr_size, &addr.to_ne_bytes())
                .expect("argv pointer copyout failed past the point of no return");
        }
        copyout_bytes(as_, self.coremap, argv_table_addr + args.len() * ptr_size, &0usize.to_ne_bytes())
            .expect("argv null terminator copyout failed past the point of no return");
        drop(guard);

        old_as.destroy(self.coremap);

        Ok(ExecResult {
            argc: args.len() as i32,
            argv_user_addr: argv_table_addr,
            stack_pointer: argv_table_addr,
            entry_point: entry,
        })
    }
}
