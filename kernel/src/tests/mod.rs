//! Host-only test scaffolding: nothing under here is compiled into the
//! kernel binary.

#[cfg(test)]
pub mod support;
