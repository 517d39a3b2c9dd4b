//! A spinlock that disables preemption on the local CPU while held (spec
//! §4.A, "assumed" primitive). Modeled on the teacher's hand-rolled
//! `Spinlock` (`push_off`/`pop_off` nesting, a `holding()` debug check)
//! but generalized to guard data directly, RAII-style, the way
//! `spin::Mutex` does — so call sites can't forget to release.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::external::scheduler::interrupt_control;

pub struct Spinlock<T> {
    name: &'static str,
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is only ever granted through a `SpinlockGuard`
// obtained while `locked` is held.
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(name: &'static str, data: T) -> Self {
        Spinlock {
            name,
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquire the lock, spinning until it is free. Disables interrupts
    /// on the local CPU first (push_off), matching the teacher's
    /// ordering, so the critical section can never be preempted.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        push_off();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        SpinlockGuard { lock: self }
    }

    /// Non-blocking acquisition; used by callers that must not sleep.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        push_off();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinlockGuard { lock: self })
        } else {
            pop_off();
            None
        }
    }

    fn raw_unlock(&self) {
        self.locked.store(false, Ordering::Release);
        pop_off();
    }
}

pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
}

impl<'a, T> SpinlockGuard<'a, T> {
    /// The spinlock this guard was obtained from — used by `WaitChannel`
    /// to relock after a sleep/wake round trip.
    pub fn spinlock(&self) -> &'a Spinlock<T> {
        self.lock
    }
}

impl<'a, T> Deref for SpinlockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding the guard means `locked` is true and we are the
        // exclusive holder.
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see Deref.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.raw_unlock();
    }
}

/// push_off/pop_off are matched: it takes two pop_offs to undo two
/// push_offs. If interrupts are initially off, push_off/pop_off leaves
/// them off. Ported from the teacher's `spinlock.rs`, but nesting depth
/// lives with the (out-of-scope) per-CPU interrupt-control collaborator
/// instead of a hand-rolled `Cpu` struct.
pub fn push_off() {
    interrupt_control().push_off();
}

pub fn pop_off() {
    interrupt_control().pop_off();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::install_test_collaborators;

    #[test]
    fn mutual_exclusion_basic() {
        install_test_collaborators();
        let lock = Spinlock::new("test", 0u32);
        {
            let mut g = lock.lock();
            *g += 1;
        }
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn try_lock_fails_while_held() {
        install_test_collaborators();
        let lock = Spinlock::new("test", 0u32);
        let g = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(g);
        assert!(lock.try_lock().is_some());
    }
}
