#![no_std]
#![no_main]

extern crate alloc;

use core::panic::PanicInfo;

use kernel::klog::{self, ConsoleSink};
use kernel::mm::{physmem, Coremap};
use kernel::proc::ProcTable;

/// The real console device is out of scope (Non-goal); boot diagnostics
/// have nowhere real to go until a trap/MMIO layer exists above this
/// crate, so this sink is a placeholder rather than a working UART.
struct NoConsole;
impl ConsoleSink for NoConsole {
    fn write_str(&self, _s: &str) {}
}
static CONSOLE: NoConsole = NoConsole;

#[no_mangle]
extern "C" fn eh_personality() {}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    halt();
}

fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Brings up the subsystems this crate owns: the kernel heap, the
/// coremap frame allocator over simulated RAM, and an empty process
/// table. The trap dispatcher, scheduler, VFS, and ELF loader that would
/// normally run the first user process from here are out of scope, so
/// boot ends by parking rather than calling into a scheduler loop.
#[no_mangle]
pub extern "C" fn kmain() -> ! {
    unsafe {
        kernel::init_heap();
    }
    klog::init(&CONSOLE);
    log::info!("kernel heap initialized");

    let _coremap = Coremap::bootstrap(0, physmem::ram_size());
    log::info!("coremap bootstrapped over {} bytes of simulated RAM", physmem::ram_size());

    let _proctable = ProcTable::new();
    log::info!("process table initialized");

    halt();
}
