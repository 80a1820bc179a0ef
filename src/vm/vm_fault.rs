//! Fault Dispatcher
//!
//! Classifies each fault by the target page's residency and zero-fill
//! status and applies the matching handler:
//!
//! - **Page-in**: non-resident with settled disk contents; read the block
//!   into a frame.
//! - **Zero-fill**: non-resident with the deferred zero still pending; fill
//!   the frame with zeros and never touch the block, whose contents are
//!   undefined.
//! - **Permission upgrade**: resident; the table's enable bits understated
//!   the needed permission (reference reset, or first write after a
//!   read-only bind).
//!
//! The record and the hardware-visible entry are updated together, so the
//! host never observes an enabled entry for a non-resident page.

use crate::error::PagerError;
use crate::vm::machine::zero_frame;
use crate::vm::vm_page::{addr_to_vpage, Frame, PageKey, VPage, ARENA_BASE};
use crate::vm::vm_pager::Pager;
use crate::vm::vm_process::Pid;

// ============================================================================
// Fault Statistics
// ============================================================================

/// Counters kept across all fault handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaultStats {
    /// Faults dispatched to a handler.
    pub total: u64,
    /// Pages read in from disk.
    pub page_ins: u64,
    /// Frames filled with zeros instead of disk contents.
    pub zero_fills: u64,
    /// Faults resolved by raising enable bits on a resident page.
    pub upgrades: u64,
}

// ============================================================================
// Dispatch
// ============================================================================

impl Pager {
    /// Resolve a fault at `addr` for the current process.
    ///
    /// Returns `InvalidAddress` without mutating state when the address is
    /// not covered by a validated page of the current arena.
    pub fn fault(&mut self, addr: u64, write: bool) -> Result<(), PagerError> {
        let pid = self.current.ok_or(PagerError::NoCurrentProcess)?;
        if addr < ARENA_BASE {
            return Err(PagerError::InvalidAddress { addr });
        }
        let vpage = addr_to_vpage(addr);
        let (resident, zero_pending) = {
            let proc = self
                .processes
                .get(&pid)
                .ok_or(PagerError::UnknownProcess(pid))?;
            match proc.record(vpage) {
                Some(rec) => (rec.resident, rec.zero_pending),
                None => return Err(PagerError::InvalidAddress { addr }),
            }
        };
        self.fault_stats.total += 1;
        if resident {
            self.upgrade_fault(pid, vpage, write);
        } else if zero_pending {
            self.zero_fill_fault(pid, vpage, write);
        } else {
            self.page_in_fault(pid, vpage, write);
        }
        Ok(())
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Non-resident page whose disk block holds its contents.
    fn page_in_fault(&mut self, pid: Pid, vpage: VPage, write: bool) {
        let frame = self.take_frame();
        let block = self.processes[&pid].records[&vpage].block;
        self.machine.disk_read(block, frame);
        self.fault_stats.page_ins += 1;
        self.bind_frame(pid, vpage, frame, write);
    }

    /// Non-resident page whose deferred zero has not been discharged. The
    /// frame is zeroed in memory; the disk block is never read.
    fn zero_fill_fault(&mut self, pid: Pid, vpage: VPage, write: bool) {
        let frame = self.take_frame();
        zero_frame(self.machine.physmem(), frame);
        self.fault_stats.zero_fills += 1;
        self.bind_frame(pid, vpage, frame, write);
    }

    /// Resident page: raise the enable bits the access needs.
    ///
    /// A read leaves `write_enable` tracking `modified`, so a page dirtied
    /// earlier stays writable without a redundant fault, and leaves any
    /// pending zero in place. A write discharges the pending zero and marks
    /// the page modified.
    fn upgrade_fault(&mut self, pid: Pid, vpage: VPage, write: bool) {
        let proc = self
            .processes
            .get_mut(&pid)
            .expect("fault dispatched for unregistered process");
        let rec = proc
            .records
            .get_mut(&vpage)
            .expect("fault dispatched for missing record");
        rec.referenced = true;
        if write {
            rec.modified = true;
            rec.zero_pending = false;
        }
        let writable = rec.modified;
        let pte = proc.pagetable.entry_mut(vpage);
        pte.read_enable = true;
        pte.write_enable = writable;
        self.fault_stats.upgrades += 1;
    }

    /// Shared tail of both non-resident handlers: bind the frame, set the
    /// conservative enable bits, and put the record on the clock.
    fn bind_frame(&mut self, pid: Pid, vpage: VPage, frame: Frame, write: bool) {
        let proc = self
            .processes
            .get_mut(&pid)
            .expect("fault dispatched for unregistered process");
        let rec = proc
            .records
            .get_mut(&vpage)
            .expect("fault dispatched for missing record");
        rec.frame = frame;
        rec.resident = true;
        rec.referenced = true;
        rec.modified = write;
        if write {
            rec.zero_pending = false;
        }
        let pte = proc.pagetable.entry_mut(vpage);
        pte.frame = frame;
        pte.read_enable = true;
        pte.write_enable = write;
        self.clock.enqueue(PageKey { pid, vpage });
    }
}
