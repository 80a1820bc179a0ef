//! Public Pager Entry Points
//!
//! The host drives the pager through these free functions, which route to a
//! process-global instance and flatten internal errors into the host's
//! `0 | -1 | null` contract:
//!
//! - `vm_init`: build the pager (called once)
//! - `vm_create` / `vm_switch`: registry management and context switch
//! - `vm_extend`: grow the current arena, `None` on exhaustion
//! - `vm_fault`: resolve a fault, `-1` on an invalid address
//! - `vm_destroy`: tear down the current process
//! - `vm_syslog`: copy and log a message, `-1` on a bad region

use spin::{Mutex, Once};

use crate::vm::vm_pager::Pager;
use crate::vm::vm_process::Pid;

static PAGER: Once<Mutex<Pager>> = Once::new();

fn pager() -> &'static Mutex<Pager> {
    PAGER.get().expect("pager not initialised; call vm_init first")
}

/// Initialise the global pager with `memory_pages` physical frames and
/// `disk_blocks` disk blocks, backed by the in-memory machine simulation.
/// Subsequent calls are ignored.
pub fn vm_init(memory_pages: u64, disk_blocks: u64) {
    PAGER.call_once(|| Mutex::new(Pager::with_sim(memory_pages, disk_blocks)));
}

/// Register a new process.
pub fn vm_create(pid: Pid) {
    if let Err(err) = pager().lock().create(pid) {
        log::warn!("vm_create({}): {}", pid, err);
    }
}

/// Make `pid` current and point the base register at its page table.
pub fn vm_switch(pid: Pid) {
    if let Err(err) = pager().lock().switch_to(pid) {
        log::warn!("vm_switch({}): {}", pid, err);
    }
}

/// Grow the current arena by one page. Returns the page's starting address,
/// or `None` when the arena or the block pool is exhausted.
pub fn vm_extend() -> Option<u64> {
    pager().lock().extend().ok()
}

/// Resolve a fault at `addr`. Returns `0` on success, `-1` when the address
/// is not covered by an allocated page.
pub fn vm_fault(addr: u64, write: bool) -> i32 {
    match pager().lock().fault(addr, write) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Tear down the current process and return its resources to the pools.
pub fn vm_destroy() {
    if let Err(err) = pager().lock().destroy() {
        log::warn!("vm_destroy: {}", err);
    }
}

/// Copy `len` bytes at `ptr` out of the current arena and emit them to the
/// log sink. Returns `0` on success, `-1` on an invalid region.
pub fn vm_syslog(ptr: u64, len: u64) -> i32 {
    match pager().lock().syslog(ptr, len) {
        Ok(_) => 0,
        Err(_) => -1,
    }
}

/// Run `f` against the global pager. Gives hosts access to the byte-level
/// memory emulation and the inspection API without widening the C-style
/// surface above.
pub fn with_pager<T>(f: impl FnOnce(&mut Pager) -> T) -> T {
    f(&mut pager().lock())
}
