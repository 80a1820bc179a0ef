//! The Pager
//!
//! Owns every piece of process-global state: the frame and block pools, the
//! process registry, the current-process selection, the host's page-table
//! base register, the clock queue, and the handle to the host machine. All
//! public operations route through this object; the host serialises calls,
//! so no operation suspends and every state transition is observed
//! atomically.
//!
//! ## Operations
//!
//! - `create` / `switch_to`: registry management and context switch
//! - `extend`: grow the current arena by one page, reserving a disk block
//! - `fault`: the dispatcher (see `vm_fault`)
//! - `destroy`: tear down the current process, returning its resources
//! - `syslog`: validate, force residency, and copy a message out of the
//!   client's virtual memory

use std::collections::{BTreeMap, BTreeSet};

use crate::error::PagerError;
use crate::vm::machine::{MachineOps, SimMachine};
use crate::vm::pmap::PageTableEntry;
use crate::vm::vm_fault::FaultStats;
use crate::vm::vm_page::{
    addr_to_vpage, page_offset, Block, Frame, FreePool, PageKey, PageRecord, VPage, ARENA_BASE,
    ARENA_SIZE, PAGE_SIZE,
};
use crate::vm::vm_pageout::{ClockQueue, PageoutStats};
use crate::vm::vm_process::{Pid, ProcessEntry};

// ============================================================================
// Pager
// ============================================================================

/// Global pager state. One instance manages all client processes.
pub struct Pager {
    pub(crate) machine: Box<dyn MachineOps>,
    pub(crate) frames: FreePool,
    pub(crate) blocks: FreePool,
    pub(crate) processes: BTreeMap<Pid, ProcessEntry>,
    /// Process the pager operations act on.
    pub(crate) current: Option<Pid>,
    /// Table the host consults on each access; cleared on teardown.
    pub(crate) base_register: Option<Pid>,
    pub(crate) clock: ClockQueue,
    pub(crate) fault_stats: FaultStats,
    pub(crate) pageout_stats: PageoutStats,
    pub(crate) syslog_calls: u64,
}

impl Pager {
    /// Pager over `frames` physical pages and `blocks` disk blocks, backed
    /// by the given host machine.
    pub fn new(frames: u64, blocks: u64, machine: Box<dyn MachineOps>) -> Self {
        Self {
            machine,
            frames: FreePool::new(frames),
            blocks: FreePool::new(blocks),
            processes: BTreeMap::new(),
            current: None,
            base_register: None,
            clock: ClockQueue::new(),
            fault_stats: FaultStats::default(),
            pageout_stats: PageoutStats::default(),
            syslog_calls: 0,
        }
    }

    /// Pager backed by an in-memory machine simulation of matching size.
    pub fn with_sim(frames: u64, blocks: u64) -> Self {
        Self::new(frames, blocks, Box::new(SimMachine::new(frames, blocks)))
    }

    // ========================================================================
    // Registry and context switch
    // ========================================================================

    /// Register a new process with an empty arena.
    pub fn create(&mut self, pid: Pid) -> Result<(), PagerError> {
        if self.processes.contains_key(&pid) {
            return Err(PagerError::ProcessExists(pid));
        }
        self.processes.insert(pid, ProcessEntry::new(pid));
        Ok(())
    }

    /// Make `pid` current and point the host's base register at its table.
    pub fn switch_to(&mut self, pid: Pid) -> Result<(), PagerError> {
        if !self.processes.contains_key(&pid) {
            return Err(PagerError::UnknownProcess(pid));
        }
        self.current = Some(pid);
        self.base_register = Some(pid);
        Ok(())
    }

    /// Entry for the current process.
    pub fn current_process(&self) -> Result<&ProcessEntry, PagerError> {
        let pid = self.current.ok_or(PagerError::NoCurrentProcess)?;
        self.processes
            .get(&pid)
            .ok_or(PagerError::UnknownProcess(pid))
    }

    // ========================================================================
    // Arena growth
    // ========================================================================

    /// Validate the next arena page of the current process and return its
    /// starting address.
    ///
    /// The disk block is reserved here, eagerly, so a later write can never
    /// find the disk exhausted. Fails without mutating state when the arena
    /// is full or no block is free.
    pub fn extend(&mut self) -> Result<u64, PagerError> {
        let pid = self.current.ok_or(PagerError::NoCurrentProcess)?;
        {
            let proc = self
                .processes
                .get(&pid)
                .ok_or(PagerError::UnknownProcess(pid))?;
            if proc.next_vaddr + PAGE_SIZE as u64 > ARENA_BASE + ARENA_SIZE {
                return Err(PagerError::ArenaFull);
            }
        }
        let block = self
            .blocks
            .acquire()
            .ok_or(PagerError::OutOfBlocks)?;
        let proc = self
            .processes
            .get_mut(&pid)
            .ok_or(PagerError::UnknownProcess(pid))?;
        let vpage = proc.next_vpage;
        let addr = proc.next_vaddr;
        proc.pagetable.push_entry();
        proc.records.insert(vpage, PageRecord::new(pid, vpage, block));
        proc.next_vpage += 1;
        proc.next_vaddr += PAGE_SIZE as u64;
        log::trace!("extend: pid {} vpage {} block {}", pid, vpage, block);
        Ok(addr)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Tear down the current process: return its frames and blocks to the
    /// global pools, drop its clock entries, zero its page table, and clear
    /// the host's base register.
    pub fn destroy(&mut self) -> Result<(), PagerError> {
        let pid = self.current.ok_or(PagerError::NoCurrentProcess)?;
        self.clock.remove_owned_by(pid);
        let mut proc = self
            .processes
            .remove(&pid)
            .ok_or(PagerError::UnknownProcess(pid))?;
        for rec in proc.records.values() {
            if rec.resident {
                self.frames.release(rec.frame);
            }
            self.blocks.release(rec.block);
        }
        proc.pagetable.reset();
        self.base_register = None;
        self.current = None;
        log::trace!("destroy: pid {}", pid);
        Ok(())
    }

    // ========================================================================
    // Message reader
    // ========================================================================

    /// Copy `len` bytes starting at virtual address `ptr` out of the current
    /// process's arena and emit them to the log sink.
    ///
    /// Residency is re-established one page at a time through the fault
    /// dispatcher; the read-enable bit is re-checked for every byte because
    /// the region may span pages whose frames were reclaimed while earlier
    /// bytes were being copied in.
    pub fn syslog(&mut self, ptr: u64, len: u64) -> Result<Vec<u8>, PagerError> {
        if !self.current_process()?.arena_covers(ptr, len) {
            return Err(PagerError::BadMessageRange);
        }
        let mut message = Vec::with_capacity(len as usize);
        for addr in ptr..ptr + len {
            let vpage = addr_to_vpage(addr);
            let readable = self
                .current_process()?
                .pagetable
                .entry(vpage)
                .map(|pte| pte.read_enable)
                .unwrap_or(false);
            if !readable {
                self.fault(addr, false)?;
            }
            let frame = self
                .current_process()?
                .record(vpage)
                .ok_or(PagerError::InvalidAddress { addr })?
                .frame;
            let idx = frame as usize * PAGE_SIZE + page_offset(addr);
            message.push(self.machine.physmem()[idx]);
        }
        self.syslog_calls += 1;
        log::info!("syslog {}", String::from_utf8_lossy(&message));
        Ok(message)
    }

    // ========================================================================
    // Host access emulation
    // ========================================================================

    /// Perform one byte load the way the host mechanism would: consult the
    /// active table, trap to the fault dispatcher when read is not enabled,
    /// then read physical memory at the entry's frame.
    pub fn mem_read(&mut self, addr: u64) -> Result<u8, PagerError> {
        let frame = self.access(addr, false)?;
        let idx = frame as usize * PAGE_SIZE + page_offset(addr);
        Ok(self.machine.physmem()[idx])
    }

    /// Perform one byte store the way the host mechanism would.
    pub fn mem_write(&mut self, addr: u64, byte: u8) -> Result<(), PagerError> {
        let frame = self.access(addr, true)?;
        let idx = frame as usize * PAGE_SIZE + page_offset(addr);
        self.machine.physmem()[idx] = byte;
        Ok(())
    }

    /// Shared access path: fault until the required enable bit is set, then
    /// return the frame the active table maps the address to.
    fn access(&mut self, addr: u64, write: bool) -> Result<Frame, PagerError> {
        let pid = self.base_register.ok_or(PagerError::NoCurrentProcess)?;
        if addr < ARENA_BASE {
            return Err(PagerError::InvalidAddress { addr });
        }
        let vpage = addr_to_vpage(addr);
        let lookup = |proc: &ProcessEntry| -> Option<PageTableEntry> {
            proc.pagetable.entry(vpage).copied()
        };
        let entry = self
            .processes
            .get(&pid)
            .and_then(|proc| lookup(proc));
        let enabled = match entry {
            Some(pte) if write => pte.write_enable,
            Some(pte) => pte.read_enable,
            None => false,
        };
        if !enabled {
            self.fault(addr, write)?;
        }
        let pte = self
            .processes
            .get(&pid)
            .and_then(|proc| lookup(proc))
            .ok_or(PagerError::InvalidAddress { addr })?;
        Ok(pte.frame)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Pid of the current process, if any.
    pub fn current_pid(&self) -> Option<Pid> {
        self.current
    }

    /// Copy of the page-table entry for `vpage` of `pid`.
    pub fn pte(&self, pid: Pid, vpage: VPage) -> Option<PageTableEntry> {
        self.processes
            .get(&pid)
            .and_then(|proc| proc.pagetable.entry(vpage))
            .copied()
    }

    /// Snapshot of the record state for `vpage` of `pid`.
    pub fn page_state(&self, pid: Pid, vpage: VPage) -> Option<PageState> {
        self.processes
            .get(&pid)
            .and_then(|proc| proc.record(vpage))
            .map(|rec| PageState {
                frame: rec.frame,
                block: rec.block,
                resident: rec.resident,
                modified: rec.modified,
                referenced: rec.referenced,
                zero_pending: rec.zero_pending,
            })
    }

    /// Number of free physical frames.
    pub fn free_frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Number of free disk blocks.
    pub fn free_block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of resident pages on the clock.
    pub fn clock_len(&self) -> usize {
        self.clock.len()
    }

    /// Fault counters.
    pub fn fault_stats(&self) -> FaultStats {
        self.fault_stats
    }

    /// Eviction counters.
    pub fn pageout_stats(&self) -> PageoutStats {
        self.pageout_stats
    }

    /// Number of completed syslog calls.
    pub fn syslog_calls(&self) -> u64 {
        self.syslog_calls
    }

    // ========================================================================
    // Consistency
    // ========================================================================

    /// Debugging aid: verify that pools, records, the clock, and the page
    /// tables agree. Returns a description of the first violation found.
    pub fn check_consistency(&self) -> Result<(), String> {
        let mut resident_frames = BTreeSet::new();
        let mut live_blocks = BTreeSet::new();
        let mut resident_keys: Vec<PageKey> = Vec::new();

        for (pid, proc) in &self.processes {
            if proc.next_vpage != proc.records.len() as u64 {
                return Err(format!("pid {}: next_vpage does not match record count", pid));
            }
            if proc.pagetable.len() != proc.records.len() {
                return Err(format!("pid {}: page table length does not match records", pid));
            }
            for (i, (vpage, rec)) in proc.records.iter().enumerate() {
                if *vpage != i as u64 {
                    return Err(format!("pid {}: record keys are not dense", pid));
                }
                if rec.owner != *pid || rec.vpage != *vpage {
                    return Err(format!("pid {} vpage {}: record back-reference wrong", pid, vpage));
                }
                if !live_blocks.insert(rec.block) {
                    return Err(format!("block {} owned by two records", rec.block));
                }
                if rec.resident {
                    if !resident_frames.insert(rec.frame) {
                        return Err(format!("frame {} bound to two records", rec.frame));
                    }
                    resident_keys.push(rec.key());
                }
                let pte = match proc.pagetable.entry(*vpage) {
                    Some(pte) => pte,
                    None => return Err(format!("pid {} vpage {}: no page-table entry", pid, vpage)),
                };
                if (pte.read_enable || pte.write_enable) && !rec.resident {
                    return Err(format!("pid {} vpage {}: enabled but not resident", pid, vpage));
                }
                if (pte.read_enable || pte.write_enable) && pte.frame != rec.frame {
                    return Err(format!("pid {} vpage {}: entry frame disagrees", pid, vpage));
                }
                if pte.write_enable && !rec.modified {
                    return Err(format!("pid {} vpage {}: writable but not modified", pid, vpage));
                }
                if rec.zero_pending && pte.write_enable {
                    return Err(format!("pid {} vpage {}: writable while zero is pending", pid, vpage));
                }
            }
        }

        for frame in self.frames.iter() {
            if resident_frames.contains(frame) {
                return Err(format!("frame {} both free and resident", frame));
            }
        }
        if self.frames.len() + resident_frames.len() != self.frames.total() as usize {
            return Err("frames leaked or double-counted".to_string());
        }
        for block in self.blocks.iter() {
            if live_blocks.contains(block) {
                return Err(format!("block {} both free and owned", block));
            }
        }
        if self.blocks.len() + live_blocks.len() != self.blocks.total() as usize {
            return Err("blocks leaked or double-counted".to_string());
        }

        let mut clock_keys: Vec<PageKey> = self.clock.iter().copied().collect();
        clock_keys.sort();
        resident_keys.sort();
        if clock_keys != resident_keys {
            return Err("clock queue disagrees with resident records".to_string());
        }
        Ok(())
    }
}

/// Point-in-time view of one page record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub frame: Frame,
    pub block: Block,
    pub resident: bool,
    pub modified: bool,
    pub referenced: bool,
    pub zero_pending: bool,
}
