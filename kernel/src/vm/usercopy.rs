//! Copy bytes between the kernel and a user address space, faulting in
//! pages on demand the same way a real TLB miss would. This is the
//! primitive `execv`'s argument marshaling is built on; the trap
//! dispatcher that would otherwise drive a hardware `copyin`/`copyout`
//! is out of scope, but the lookup it would do is exactly `ensure_backed`.

use alloc::vec::Vec;

use crate::errno::{Errno, KResult};
use crate::memlayout::{page_round_down, PAGE_SIZE};
use crate::mm::{physmem, Coremap};
use crate::vm::addrspace::AddrSpace;
use crate::vm::fault::ensure_backed;

/// Copy `buf.len()` bytes from user address `uaddr` into `buf`.
pub fn copyin_bytes(as_: &AddrSpace, coremap: &Coremap, uaddr: usize, buf: &mut [u8]) -> KResult<()> {
    let mut done = 0;
    while done < buf.len() {
        let page_addr = page_round_down(uaddr + done);
        let paddr = ensure_backed(as_, coremap, page_addr)?;
        let page_off = (uaddr + done) - page_addr;
        let n = (PAGE_SIZE - page_off).min(buf.len() - done);
        unsafe {
            let src = physmem::paddr_to_ptr(paddr + page_off);
            core::ptr::copy_nonoverlapping(src, buf[done..done + n].as_mut_ptr(), n);
        }
        done += n;
    }
    Ok(())
}

/// Copy `buf` out to user address `uaddr`.
pub fn copyout_bytes(as_: &AddrSpace, coremap: &Coremap, uaddr: usize, buf: &[u8]) -> KResult<()> {
    let mut done = 0;
    while done < buf.len() {
        let page_addr = page_round_down(uaddr + done);
        let paddr = ensure_backed(as_, coremap, page_addr)?;
        let page_off = (uaddr + done) - page_addr;
        let n = (PAGE_SIZE - page_off).min(buf.len() - done);
        unsafe {
            let dest = physmem::paddr_to_ptr(paddr + page_off);
            core::ptr::copy_nonoverlapping(buf[done..done + n].as_ptr(), dest, n);
        }
        done += n;
    }
    Ok(())
}

/// Copy a NUL-terminated string in from user space, capped at `max_len`
/// bytes (excluding the NUL). `E2BIG` if the cap is hit first.
pub fn copyin_cstr(as_: &AddrSpace, coremap: &Coremap, uaddr: usize, max_len: usize) -> KResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut addr = uaddr;
    loop {
        if out.len() >= max_len {
            return Err(Errno::E2big);
        }
        let mut byte = [0u8; 1];
        copyin_bytes(as_, coremap, addr, &mut byte)?;
        if byte[0] == 0 {
            break;
        }
        out.push(byte[0]);
        addr += 1;
    }
    Ok(out)
}

/// Read one native-width pointer value from user space (used to walk a
/// user `argv` array).
pub fn copyin_usize(as_: &AddrSpace, coremap: &Coremap, uaddr: usize) -> KResult<usize> {
    let mut buf = [0u8; core::mem::size_of::<usize>()];
    copyin_bytes(as_, coremap, uaddr, &mut buf)?;
    Ok(usize::from_ne_bytes(buf))
}

/// Write one native-width pointer value out to user space (used to build
/// an `argv` array on a freshly-laid-out user stack).
pub fn copyout_usize(as_: &AddrSpace, coremap: &Coremap, uaddr: usize, value: usize) -> KResult<()> {
    copyout_bytes(as_, coremap, uaddr, &value.to_ne_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::AsId;

    fn setup() -> (Coremap, AddrSpace) {
        let cm = Coremap::bootstrap(0, 4000 * PAGE_SIZE);
        let as_ = AddrSpace::create();
        as_.define_region(0x1000, PAGE_SIZE * 2, true, true, false).unwrap();
        (cm, as_)
    }

    #[test]
    fn copyout_then_copyin_round_trips_across_a_page_boundary() {
        let (cm, as_) = setup();
        let uaddr = PAGE_SIZE - 2 + 0x1000;
        let payload = [0xAAu8, 0xBB, 0xCC, 0xDD];
        copyout_bytes(&as_, &cm, uaddr, &payload).unwrap();
        let mut out = [0u8; 4];
        copyin_bytes(&as_, &cm, uaddr, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn copyin_cstr_reads_until_nul() {
        let (cm, as_) = setup();
        copyout_bytes(&as_, &cm, 0x1000, b"hello\0").unwrap();
        let s = copyin_cstr(&as_, &cm, 0x1000, 64).unwrap();
        assert_eq!(&s, b"hello");
    }

    #[test]
    fn copyin_cstr_too_long_is_e2big() {
        let (cm, as_) = setup();
        copyout_bytes(&as_, &cm, 0x1000, b"abcdef\0").unwrap();
        assert_eq!(copyin_cstr(&as_, &cm, 0x1000, 3), Err(Errno::E2big));
    }

    #[test]
    fn copyin_from_unmapped_address_faults() {
        let (cm, as_) = setup();
        let mut buf = [0u8; 1];
        assert_eq!(copyin_bytes(&as_, &cm, 0x9000_0000, &mut buf), Err(Errno::Efault));
        let _ = AsId(0);
    }
}
