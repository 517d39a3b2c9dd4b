//! A process: address space, file table, and the exit/reap bookkeeping
//! that `_exit`/`waitpid` coordinate over.

use alloc::string::String;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::fs::FileTable;
use crate::sync::condvar::Condvar;
use crate::sync::mutex::Mutex;
use crate::sync::spinlock::Spinlock;
use crate::vm::AddrSpace;

struct ExitState {
    exited: bool,
    exit_status: i32,
}

pub struct Process {
    pid: AtomicU32,
    ppid: u32,
    name: String,
    /// `None` for the bootstrap kernel process (PID 0), which owns no
    /// user address space.
    pub addrspace: Spinlock<Option<AddrSpace>>,
    pub file_table: FileTable,
    state: Spinlock<ExitState>,
    exit_wait_mutex: Mutex,
    exit_wait_cv: Condvar,
}

impl Process {
    pub fn new(name: String, ppid: u32, addrspace: Option<AddrSpace>, file_table: FileTable) -> Process {
        Process {
            pid: AtomicU32::new(0),
            ppid,
            name,
            addrspace: Spinlock::new("proc-as", addrspace),
            file_table,
            state: Spinlock::new(
                "proc-state",
                ExitState {
                    exited: false,
                    exit_status: 0,
                },
            ),
            exit_wait_mutex: Mutex::new("proc-exit-wait"),
            exit_wait_cv: Condvar::new(),
        }
    }

    /// Assigning the PID is the inserting caller's responsibility — the
    /// process table hands back the slot index, not a pre-filled PID.
    pub fn set_pid(&self, pid: u32) {
        self.pid.store(pid, Ordering::Release);
    }

    pub fn pid(&self) -> u32 {
        self.pid.load(Ordering::Acquire)
    }

    pub fn ppid(&self) -> u32 {
        self.ppid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_exited(&self) -> bool {
        self.state.lock().exited
    }

    pub fn exit_status(&self) -> i32 {
        self.state.lock().exit_status
    }

    /// Record the exit status and wake any `waitpid` callers blocked on
    /// this process. The process spinlock is released (at the end of
    /// the inner block) only after `exited` is set, so a waiter that
    /// observes `exited == true` through the exit-wait mutex always sees
    /// the matching `exit_status` too.
    pub fn mark_exited(&self, status: i32) {
        {
            let mut state = self.state.lock();
            state.exit_status = status;
            state.exited = true;
        }
        let holder = self.pid();
        self.exit_wait_mutex.acquire(holder);
        self.exit_wait_cv.broadcast();
        self.exit_wait_mutex.release(holder);
    }

    /// Block until `exited` is observed true. `waiter_pid` identifies the
    /// calling thread only for the exit-wait mutex's same-holder check —
    /// it is always the parent reaping this child.
    pub fn wait_for_exit(&self, waiter_pid: u32) {
        self.exit_wait_mutex.acquire(waiter_pid);
        while !self.is_exited() {
            self.exit_wait_cv.wait(&self.exit_wait_mutex, waiter_pid);
        }
        self.exit_wait_mutex.release(waiter_pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::install_test_collaborators;
    use alloc::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn bare_process(ppid: u32) -> Process {
        Process::new(
            String::from("test"),
            ppid,
            None,
            FileTable::new_empty(),
        )
    }

    #[test]
    fn wait_for_exit_returns_immediately_if_already_exited() {
        install_test_collaborators();
        let p = bare_process(1);
        p.set_pid(2);
        p.mark_exited(crate::proc::wait_status::mkwait_exit(5));
        p.wait_for_exit(1);
        assert_eq!(crate::proc::wait_status::wexitstatus(p.exit_status()), 5);
    }

    #[test]
    fn wait_for_exit_blocks_until_marked() {
        install_test_collaborators();
        let p = Arc::new(bare_process(1));
        p.set_pid(2);
        let p2 = p.clone();
        let handle = thread::spawn(move || {
            p2.wait_for_exit(1);
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        p.mark_exited(crate::proc::wait_status::mkwait_exit(7));
        handle.join().unwrap();
    }
}
