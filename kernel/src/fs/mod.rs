//! Per-process file I/O: file handles (shared, refcounted open-file
//! descriptions) and the per-process descriptor table over them. The
//! VFS/vnode layer underneath is out of scope (`external::vfs`).

pub mod filehandle;
pub mod filetable;

pub use filehandle::FileHandle;
pub use filetable::FileTable;
