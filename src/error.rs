//! Pager error types.

use thiserror::Error;

use crate::vm::vm_process::Pid;

/// Errors surfaced by the pager's fallible operations.
///
/// Failed operations mutate no pager state. The public host-facing entry
/// points flatten these into the `0 | -1 | null` codes of the host contract;
/// library callers get the full variant.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerError {
    #[error("address {addr:#x} is outside any allocated page")]
    InvalidAddress { addr: u64 },

    #[error("message region is empty or outside the arena")]
    BadMessageRange,

    #[error("arena is full")]
    ArenaFull,

    #[error("no free disk blocks")]
    OutOfBlocks,

    #[error("no process is current")]
    NoCurrentProcess,

    #[error("no process registered for pid {0}")]
    UnknownProcess(Pid),

    #[error("pid {0} is already registered")]
    ProcessExists(Pid),
}
