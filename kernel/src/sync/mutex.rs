//! Blocking mutex (spec §4.A): a wait channel guarding ownership, distinct
//! from `Spinlock` in that holders may sleep while holding it.
//!
//! Non-recursion is enforced rather than silently tolerated: acquiring a
//! lock already held by the calling thread panics instead of returning
//! success without actually taking the lock, which would hand out two
//! live references to the guarded data at once.

use crate::sync::spinlock::Spinlock;
use crate::sync::wait_channel::WaitChannel;

struct State {
    held: bool,
    holder: Option<u32>,
}

pub struct Mutex {
    name: &'static str,
    state: Spinlock<State>,
    wchan: WaitChannel,
}

impl Mutex {
    pub const fn new(name: &'static str) -> Self {
        Mutex {
            name,
            state: Spinlock::new(
                name,
                State {
                    held: false,
                    holder: None,
                },
            ),
            wchan: WaitChannel::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Block until the lock is free, then take it. `holder` identifies the
    /// calling thread (its pid, typically) so a same-thread re-acquire can
    /// be detected and rejected rather than silently double-granted.
    pub fn acquire(&self, holder: u32) {
        let mut guard = self.state.lock();
        while guard.held {
            assert!(
                guard.holder != Some(holder),
                "mutex {} acquired recursively by the same thread",
                self.name
            );
            guard = self.wchan.sleep(guard);
        }
        guard.held = true;
        guard.holder = Some(holder);
    }

    /// Release the lock. Panics if called by a thread that does not hold
    /// it, which is always a caller bug.
    pub fn release(&self, holder: u32) {
        let mut guard = self.state.lock();
        assert!(guard.held, "mutex {} released while not held", self.name);
        assert_eq!(
            guard.holder,
            Some(holder),
            "mutex {} released by non-holder",
            self.name
        );
        guard.held = false;
        guard.holder = None;
        drop(guard);
        self.wchan.wake_one();
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }
}
