//! Writer-preferring reader/writer lock (spec §4.A): once a writer is
//! waiting, new readers queue behind it instead of continuing to pile in,
//! so a steady stream of readers cannot starve a writer.

use crate::sync::spinlock::Spinlock;
use crate::sync::wait_channel::WaitChannel;

struct State {
    active_readers: u32,
    writer_active: bool,
    writers_waiting: u32,
}

pub struct RwLock {
    name: &'static str,
    state: Spinlock<State>,
    readers_chan: WaitChannel,
    writers_chan: WaitChannel,
}

impl RwLock {
    pub const fn new(name: &'static str) -> Self {
        RwLock {
            name,
            state: Spinlock::new(
                name,
                State {
                    active_readers: 0,
                    writer_active: false,
                    writers_waiting: 0,
                },
            ),
            readers_chan: WaitChannel::new(),
            writers_chan: WaitChannel::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Block while a writer holds or is waiting for the lock, then join
    /// as a reader.
    pub fn acquire_read(&self) {
        let mut guard = self.state.lock();
        while guard.writer_active || guard.writers_waiting > 0 {
            guard = self.readers_chan.sleep(guard);
        }
        guard.active_readers += 1;
    }

    /// Leave as a reader. The last reader to leave while a writer is
    /// waiting hands the lock straight to a writer.
    pub fn release_read(&self) {
        let mut guard = self.state.lock();
        assert!(guard.active_readers > 0, "rwlock {} over-released", self.name);
        guard.active_readers -= 1;
        let last_reader = guard.active_readers == 0;
        drop(guard);
        if last_reader {
            self.writers_chan.wake_one();
        }
    }

    /// Register as a waiting writer, then block until no reader and no
    /// other writer holds the lock.
    pub fn acquire_write(&self) {
        let mut guard = self.state.lock();
        guard.writers_waiting += 1;
        while guard.writer_active || guard.active_readers > 0 {
            guard = self.writers_chan.sleep(guard);
        }
        guard.writers_waiting -= 1;
        guard.writer_active = true;
    }

    /// Release the lock held for writing. Prefers waking a waiting writer
    /// over readers, and only releases the floodgates to readers once no
    /// writer remains waiting.
    pub fn release_write(&self) {
        let mut guard = self.state.lock();
        assert!(guard.writer_active, "rwlock {} released while not write-held", self.name);
        guard.writer_active = false;
        let writers_waiting = guard.writers_waiting;
        drop(guard);
        if writers_waiting > 0 {
            self.writers_chan.wake_one();
        } else {
            self.readers_chan.wake_all();
        }
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
    fn multiple_readers_concurrent() {
        install_test_collaborators();
        let lock = RwLock::new("test");
        lock.acquire_read();
        lock.acquire_read();
        lock.release_read();
        lock.release_read();
    }

    #[test]
    fn writer_excludes_readers() {
        install_test_collaborators();
        let lock = Arc::new(RwLock::new("test"));
        lock.acquire_write();

        let lock2 = lock.clone();
        let handle = thread::spawn(move || {
            lock2.acquire_read();
            lock2.release_read();
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        lock.release_write();
        handle.join().unwrap();
    }

    #[test]
    fn waiting_writer_blocks_new_readers() {
        install_test_collaborators();
        let lock = Arc::new(RwLock::new("test"));
        lock.acquire_read();

        let lock2 = lock.clone();
        let writer = thread::spawn(move || {
            lock2.acquire_write();
            lock2.release_write();
        });
        thread::sleep(Duration::from_millis(50));

        // A fresh reader arriving after the writer is queued must wait
        // behind it rather than jumping ahead.
        let lock3 = lock.clone();
        let late_reader = thread::spawn(move || {
            lock3.acquire_read();
            lock3.release_read();
        });
        thread::sleep(Duration::from_millis(50));
        assert!(!writer.is_finished());
        assert!(!late_reader.is_finished());

        lock.release_read();
        writer.join().unwrap();
        late_reader.join().unwrap();
    }
}
