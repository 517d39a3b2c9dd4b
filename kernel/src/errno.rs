//! Kernel error codes and the `Result` alias used across the syscall
//! surface. Expected errors (resource exhaustion, bad userland arguments)
//! are returned as `Errno`; invariant violations panic instead (spec §7).

use core::fmt;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Errno {
    /// Bad file descriptor.
    Ebadf,
    /// Process's file table is full.
    Emfile,
    /// System-wide open-file table is full (unused by this crate's fixed
    /// per-process tables, kept for the documented errno set).
    Enfile,
    /// Out of memory (frames, heap, or table slots).
    Enomem,
    /// Invalid argument.
    Einval,
    /// Illegal seek — descriptor is not seekable.
    Espipe,
    /// No such process.
    Esrch,
    /// No such child process.
    Echild,
    /// Too many processes — process table full.
    Emproc,
    /// Bad address — invalid user pointer or unmapped page.
    Efault,
    /// Operation not permitted.
    Eperm,
    /// Argument list too long.
    E2big,
}

impl Errno {
    /// The positive errno value the syscall-return convention (§6) uses.
    pub const fn code(self) -> i32 {
        match self {
            Errno::Ebadf => 9,
            Errno::Emfile => 24,
            Errno::Enfile => 23,
            Errno::Enomem => 12,
            Errno::Einval => 22,
            Errno::Espipe => 29,
            Errno::Esrch => 3,
            Errno::Echild => 10,
            Errno::Emproc => 83,
            Errno::Efault => 14,
            Errno::Eperm => 1,
            Errno::E2big => 7,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Errno::Ebadf => "bad file descriptor",
            Errno::Emfile => "too many open files",
            Errno::Enfile => "file table overflow",
            Errno::Enomem => "out of memory",
            Errno::Einval => "invalid argument",
            Errno::Espipe => "illegal seek",
            Errno::Esrch => "no such process",
            Errno::Echild => "no child processes",
            Errno::Emproc => "too many processes",
            Errno::Efault => "bad address",
            Errno::Eperm => "operation not permitted",
            Errno::E2big => "argument list too long",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for Errno {}

pub type KResult<T> = Result<T, Errno>;
