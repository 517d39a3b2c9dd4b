//! Process table, process objects, and wait-status encoding.

pub mod process;
pub mod proctable;
pub mod wait_status;

pub use process::Process;
pub use proctable::ProcTable;
pub use wait_status::{mkwait_exit, mkwait_sig, wexitstatus, wifsignaled, wtermsig};
