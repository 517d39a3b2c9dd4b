//! The thread scheduler is out of scope (spec §1); this is the contract
//! the synchronization primitives need from it: wait channels and
//! per-CPU interrupt masking. `thread_fork` itself is referenced only at
//! the one call site in `fork()` and is modeled the same way.

use alloc::boxed::Box;
use spin::Once;

use crate::errno::KResult;

/// An opaque, heap-copyable snapshot of a trapped user context. The
/// trampoline that actually restores register state into a new thread
/// (`enter_new_process`, `mips_usermode`) is out of scope — this is only
/// the carrier `fork` hands across to the scheduler.
pub struct Trapframe {
    bytes: Box<[u8]>,
}

impl Trapframe {
    pub fn copy_from(bytes: &[u8]) -> Trapframe {
        Trapframe {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// What a wait channel demands of the scheduler: atomically unlock a
/// predicate lock once the calling thread is enqueued, park it, and wake
/// it back up on `wake_one`/`wake_all`.
///
/// `sleep`'s `unlock` callback must be invoked by the implementation only
/// after the calling thread is durably enqueued on `chan` — that ordering
/// is what makes a `V`/`signal`/`release_write` racing with a fresh
/// sleeper impossible to lose. Callers never call `unlock` themselves.
pub trait Scheduler: Sync {
    fn sleep(&self, chan: usize, unlock: &mut dyn FnMut());
    fn wake_one(&self, chan: usize);
    fn wake_all(&self, chan: usize);
    /// True while running in interrupt/trap context, where blocking is
    /// forbidden. Sync primitives assert this is false before sleeping.
    fn in_interrupt_context(&self) -> bool;

    /// Launch a kernel thread bound to `child_pid` that restores
    /// `trapframe`, frees it, sets the child's syscall-return registers
    /// (`v0 = 0, a3 = 0`, PC advanced past the syscall instruction),
    /// activates the child's address space, and enters user mode. Never
    /// returns on the child's side; on the caller's side, returns once
    /// the thread is created or reports why it couldn't be.
    fn thread_fork(&self, child_pid: u32, trapframe: Trapframe) -> KResult<()>;
}

/// Per-CPU interrupt enable/disable, used by the spinlock's push_off/
/// pop_off nesting (spec §4.A: "disables preemption on the local CPU").
/// `push_off`/`pop_off` must nest: two `push_off`s require two
/// `pop_off`s before interrupts come back on, and if interrupts were
/// already off at the first `push_off`, `pop_off` leaves them off.
/// Only the per-CPU/per-thread owner of this state (the scheduler
/// collaborator) can implement this correctly, which is why it isn't
/// just a raw `AtomicBool` inside `Spinlock`.
pub trait InterruptControl: Sync {
    fn push_off(&self);
    fn pop_off(&self);
}

static SCHEDULER: Once<&'static dyn Scheduler> = Once::new();
static INTERRUPTS: Once<&'static dyn InterruptControl> = Once::new();

/// Installed once at boot by the (out-of-scope) scheduler/trap subsystem.
pub fn install_scheduler(s: &'static dyn Scheduler) {
    SCHEDULER.call_once(|| s);
}

pub fn install_interrupt_control(i: &'static dyn InterruptControl) {
    INTERRUPTS.call_once(|| i);
}

pub fn scheduler() -> &'static dyn Scheduler {
    *SCHEDULER
        .get()
        .expect("scheduler collaborator not installed")
}

pub fn interrupt_control() -> &'static dyn InterruptControl {
    *INTERRUPTS
        .get()
        .expect("interrupt-control collaborator not installed")
}
