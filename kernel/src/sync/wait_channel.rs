//! Wait channels: atomically unlock a held spinlock, park the calling
//! thread, and wake it on request. The channel itself is in scope (spec
//! §4.A); the scheduler machinery it rides on (`wchan_*`) is not (§1) —
//! see `external::scheduler`.

use crate::external::scheduler::scheduler;
use crate::sync::spinlock::SpinlockGuard;

pub struct WaitChannel {
    _private: (),
}

impl WaitChannel {
    pub const fn new() -> Self {
        WaitChannel { _private: () }
    }

    /// Channel identity: this wait channel's own address, taken lazily so
    /// it stays valid across a move that happens before first use (the
    /// teacher uses the sleeping structure's address the same way).
    fn id(&self) -> usize {
        self as *const WaitChannel as usize
    }

    /// Release `guard`'s spinlock, sleep until woken, then reacquire the
    /// same lock before returning. Callers must not be in interrupt
    /// context (asserted).
    pub fn sleep<'a, T>(&self, guard: SpinlockGuard<'a, T>) -> SpinlockGuard<'a, T> {
        assert!(
            !scheduler().in_interrupt_context(),
            "wait channel used from interrupt context"
        );
        let lock = guard.spinlock();
        let mut guard = Some(guard);
        scheduler().sleep(self.id(), &mut || {
            if let Some(g) = guard.take() {
                drop(g);
            }
        });
        lock.lock()
    }

    pub fn wake_one(&self) {
        scheduler().wake_one(self.id());
    }

    pub fn wake_all(&self) {
        scheduler().wake_all(self.id());
    }
}
