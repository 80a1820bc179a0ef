//! External Demand Pager Subsystem
//!
//! Manages a fixed pool of physical frames and disk blocks on behalf of
//! cooperating client processes, each of which sees a private virtual
//! arena:
//!
//! - `vm_page`: arena geometry, frame/block pools, per-page records
//! - `pmap`: hardware-visible page tables consulted by the host
//! - `vm_process`: per-process entries and identifiers
//! - `vm_fault`: the fault dispatcher and its three handlers
//! - `vm_pageout`: the clock queue and second-chance replacement
//! - `vm_pager`: the pager object tying the global state together
//! - `machine`: the host-machine seam (physical memory and disk)
//! - `vm_user`: host-facing entry points over a global pager instance

pub mod machine;
pub mod pmap;
pub mod vm_fault;
pub mod vm_page;
pub mod vm_pageout;
pub mod vm_pager;
pub mod vm_process;
pub mod vm_user;

pub use machine::{MachineOps, SimMachine};
pub use pmap::{PageTable, PageTableEntry};
pub use vm_fault::FaultStats;
pub use vm_page::{
    addr_to_vpage, page_offset, vpage_to_addr, Block, Frame, FreePool, PageKey, PageRecord,
    VPage, ARENA_BASE, ARENA_PAGES, ARENA_SIZE, PAGE_SHIFT, PAGE_SIZE,
};
pub use vm_pageout::{ClockQueue, PageoutStats};
pub use vm_pager::{PageState, Pager};
pub use vm_process::{Pid, ProcessEntry};
pub use vm_user::{
    vm_create, vm_destroy, vm_extend, vm_fault, vm_init, vm_switch, vm_syslog, with_pager,
};
