//! Test doubles for the collaborators spec.md puts out of scope (the
//! scheduler, interrupt control, the VFS). Backed by real OS threads and
//! `std::sync::{Mutex, Condvar}` so that blocking primitives built on top
//! of `WaitChannel` get exercised under genuine concurrency instead of a
//! single-threaded stand-in.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use std::cell::Cell;
use std::sync::{Condvar as StdCondvar, Mutex as StdMutex, Once as StdOnce};
use std::thread_local;

use crate::errno::KResult;
use crate::external::scheduler::{install_interrupt_control, install_scheduler, InterruptControl, Scheduler, Trapframe};

struct Parker {
    woken: StdMutex<bool>,
    cv: StdCondvar,
}

impl Parker {
    fn new() -> Self {
        Parker {
            woken: StdMutex::new(false),
            cv: StdCondvar::new(),
        }
    }

    fn park(&self) {
        let mut woken = self.woken.lock().unwrap();
        while !*woken {
            woken = self.cv.wait(woken).unwrap();
        }
    }

    fn wake(&self) {
        *self.woken.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

pub struct TestScheduler {
    waiters: StdMutex<BTreeMap<usize, Vec<Arc<Parker>>>>,
}

impl TestScheduler {
    const fn new() -> Self {
        TestScheduler {
            waiters: StdMutex::new(BTreeMap::new()),
        }
    }
}

impl Scheduler for TestScheduler {
    fn sleep(&self, chan: usize, unlock: &mut dyn FnMut()) {
        let parker = Arc::new(Parker::new());
        // Register ourselves on the channel *before* releasing the caller's
        // spinlock, so a `wake_one`/`wake_all` racing in from another
        // thread can never fire before we're durably enqueued.
        self.waiters
            .lock()
            .unwrap()
            .entry(chan)
            .or_insert_with(Vec::new)
            .push(parker.clone());
        unlock();
        parker.park();
    }

    fn wake_one(&self, chan: usize) {
        let mut waiters = self.waiters.lock().unwrap();
        if let Some(queue) = waiters.get_mut(&chan) {
            if !queue.is_empty() {
                let parker = queue.remove(0);
                parker.wake();
            }
        }
    }

    fn wake_all(&self, chan: usize) {
        let mut waiters = self.waiters.lock().unwrap();
        if let Some(queue) = waiters.remove(&chan) {
            for parker in queue {
                parker.wake();
            }
        }
    }

    fn in_interrupt_context(&self) -> bool {
        false
    }

    /// No real thread/trampoline to launch here — the test double just
    /// reports success, since `fork`'s rollback paths are exercised by
    /// table/address-space failures rather than scheduler failures.
    fn thread_fork(&self, _child_pid: u32, _trapframe: Trapframe) -> KResult<()> {
        Ok(())
    }
}

thread_local! {
    static PUSH_DEPTH: Cell<u32> = Cell::new(0);
}

pub struct TestInterruptControl;

impl InterruptControl for TestInterruptControl {
    fn push_off(&self) {
        PUSH_DEPTH.with(|d| d.set(d.get() + 1));
    }

    fn pop_off(&self) {
        PUSH_DEPTH.with(|d| {
            let depth = d.get();
            assert!(depth > 0, "pop_off without matching push_off");
            d.set(depth - 1);
        });
    }
}

static SCHEDULER: TestScheduler = TestScheduler::new();
static INTERRUPTS: TestInterruptControl = TestInterruptControl;
static INSTALLED: StdOnce = StdOnce::new();

/// Install the test scheduler/interrupt-control collaborators, once per
/// process. Safe to call from every test that touches a sync primitive.
pub fn install_test_collaborators() {
    INSTALLED.call_once(|| {
        install_scheduler(&SCHEDULER);
        install_interrupt_control(&INTERRUPTS);
    });
}
