//! Synchronization primitives built bottom-up: `Spinlock` and
//! `WaitChannel` are the two foundations, everything else composes them.

pub mod condvar;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;
pub mod spinlock;
pub mod wait_channel;

pub use condvar::Condvar;
pub use mutex::Mutex;
pub use rwlock::RwLock;
pub use semaphore::Semaphore;
pub use spinlock::{Spinlock, SpinlockGuard};
pub use wait_channel::WaitChannel;
