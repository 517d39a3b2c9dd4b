//! Kernel policy knobs — sizes and counts, as distinct from the hardware
//! addresses in `memlayout`.

/// Highest number of simultaneously-open process-table slots.
pub const PID_MIN: u32 = 1;
pub const PID_MAX: u32 = 256;

/// Per-process open file descriptor slots.
pub const OPEN_MAX: usize = 64;

/// Bound on total `argv` byte count for `execv`, mirroring 2.11BSD.
pub const ARG_MAX: usize = 64 * 1024;

/// Bound on path strings copied in from userland.
pub const PATH_MAX: usize = 1024;

/// First-level / second-level page table fan-out (10 bits each).
pub const PTE_PER_TABLE: usize = 1024;
