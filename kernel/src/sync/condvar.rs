//! Condition variable (spec §4.A): used together with a `Mutex`, in the
//! usual `wait`/`signal`/`broadcast` shape. The caller must already hold
//! the associated mutex when calling any of these.

use crate::sync::mutex::Mutex;
use crate::sync::spinlock::Spinlock;
use crate::sync::wait_channel::WaitChannel;

pub struct Condvar {
    wchan: WaitChannel,
    /// Held across the release-then-register sequence in `wait`, so a
    /// concurrent `signal`/`broadcast` can't run between the mutex
    /// release and the wait-channel registration (a lost wakeup — see
    /// `WaitChannel::sleep`, which the same pattern rides on).
    guard_lock: Spinlock<()>,
}

impl Condvar {
    pub const fn new() -> Self {
        Condvar {
            wchan: WaitChannel::new(),
            guard_lock: Spinlock::new("condvar", ()),
        }
    }

    /// Atomically release `mutex` and sleep, then reacquire `mutex` before
    /// returning. `holder` is re-passed through to the reacquire so the
    /// same-thread bookkeeping in `Mutex` stays consistent.
    ///
    /// "Atomically" here means under `guard_lock`: it is taken before
    /// `mutex` is released and only given up by `WaitChannel::sleep`
    /// once this thread is durably registered on the wait channel, so a
    /// `signal`/`broadcast` racing in right after the mutex release
    /// always finds the waiter already enqueued.
    pub fn wait(&self, mutex: &Mutex, holder: u32) {
        let guard = self.guard_lock.lock();
        mutex.release(holder);
        self.wchan.sleep(guard);
        mutex.acquire(holder);
    }

    pub fn signal(&self) {
        let _guard = self.guard_lock.lock();
        self.wchan.wake_one();
    }

    pub fn broadcast(&self) {
        let _guard = self.guard_lock.lock();
        self.wchan.wake_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::install_test_collaborators;
    use alloc::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn signal_wakes_a_waiter() {
        install_test_collaborators();
        let mutex = Arc::new(Mutex::new("test"));
        let cv = Arc::new(Condvar::new());
        let ready = Arc::new(Spinlock::new("ready", false));

        let mutex2 = mutex.clone();
        let cv2 = cv.clone();
        let ready2 = ready.clone();
        let handle = thread::spawn(move || {
            mutex2.acquire(2);
            while !*ready2.lock() {
                cv2.wait(&mutex2, 2);
            }
            mutex2.release(2);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        mutex.acquire(1);
        *ready.lock() = true;
        mutex.release(1);
        cv.signal();

        handle.join().unwrap();
    }
}
