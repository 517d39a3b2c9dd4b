//! Counting semaphore (spec §4.A). No fairness guarantee: a just-woken
//! waiter may lose the decrement race to a fresh arrival.

use crate::sync::spinlock::Spinlock;
use crate::sync::wait_channel::WaitChannel;

pub struct Semaphore {
    name: &'static str,
    count: Spinlock<u32>,
    wchan: WaitChannel,
}

impl Semaphore {
    pub const fn new(name: &'static str, initial: u32) -> Self {
        Semaphore {
            name,
            count: Spinlock::new(name, initial),
            wchan: WaitChannel::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Block until the count is positive, then decrement it.
    pub fn p(&self) {
        let mut guard = self.count.lock();
        while *guard == 0 {
            guard = self.wchan.sleep(guard);
        }
        *guard -= 1;
    }

    /// Non-blocking `P`: decrements and returns `true` only if the count
    /// was already positive.
    pub fn try_p(&self) -> bool {
        let mut guard = self.count.lock();
        if *guard > 0 {
            *guard -= 1;
            true
        } else {
            false
        }
    }

    /// Increment the count and wake one waiter.
    pub fn v(&self) {
        let mut guard = self.count.lock();
        *guard += 1;
        drop(guard);
        self.wchan.wake_one();
    }

    pub fn count(&self) -> u32 {
        *self.count.lock()
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
    fn p_decrements_available_count() {
        install_test_collaborators();
        let sem = Semaphore::new("test", 2);
        sem.p();
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn try_p_does_not_block_when_empty() {
        install_test_collaborators();
        let sem = Semaphore::new("test", 0);
        assert!(!sem.try_p());
    }

    #[test]
    fn p_blocks_until_matching_v() {
        install_test_collaborators();
        let sem = Arc::new(Semaphore::new("test", 0));
        let sem2 = sem.clone();
        let handle = thread::spawn(move || {
            sem2.p();
        });
        // give the waiter a chance to actually block
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        sem.v();
        handle.join().unwrap();
    }
}
