//! pager_r - a user-space external demand pager
//!
//! This crate mediates every page fault for its client processes: it keeps
//! per-page state, maintains page-table entries whose enable bits always
//! under-approximate a page's logical permissions, evicts with a global
//! second-chance clock, defers zero-filling until first touch, and tears
//! processes down without leaking a frame or block.
//!
//! The host supplies physical memory and the backing disk through the
//! `MachineOps` seam and drives the pager either through a `Pager` instance
//! or through the global `vm_*` entry points.

pub mod error;
pub mod vm;

pub use error::PagerError;
pub use vm::{MachineOps, PageState, PageTableEntry, Pager, Pid, SimMachine};
