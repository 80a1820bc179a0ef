//! Replacement (Second Chance)
//!
//! A single global FIFO of resident-page handles serves as the clock. When
//! no frame is free, the scan walks from the head: a referenced page loses
//! its reference bit and both hardware enable bits (so its next access
//! re-faults and re-earns the bit) and rotates to the tail; the first
//! unreferenced head is the victim. Each iteration clears one reference
//! bit, so after at most one full lap some head is unreferenced and the
//! scan terminates.
//!
//! Victims usually belong to processes other than the current one, which is
//! why the clock stores `(pid, vpage)` handles rather than references: the
//! scan resolves each handle against the registry to reach the owning
//! page table.

use std::collections::VecDeque;

use crate::vm::vm_page::{Frame, PageKey};
use crate::vm::vm_pager::Pager;
use crate::vm::vm_process::Pid;

// ============================================================================
// Pageout Statistics
// ============================================================================

/// Counters kept across all replacement activity.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageoutStats {
    /// Pages evicted from their frames.
    pub evictions: u64,
    /// Evictions that wrote the frame back to its disk block.
    pub write_backs: u64,
    /// Referenced pages rotated to the tail during scans.
    pub rotations: u64,
}

// ============================================================================
// Clock Queue
// ============================================================================

/// FIFO of handles to resident pages; the hand of the second-chance scan.
#[derive(Debug, Default)]
pub struct ClockQueue {
    queue: VecDeque<PageKey>,
}

impl ClockQueue {
    /// Empty clock.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Append a newly resident page at the tail.
    pub fn enqueue(&mut self, key: PageKey) {
        self.queue.push_back(key);
    }

    /// Take the handle at the head.
    pub fn dequeue(&mut self) -> Option<PageKey> {
        self.queue.pop_front()
    }

    /// Number of enqueued handles.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every handle owned by `pid`, preserving the order of the rest.
    /// Each head is popped exactly once and re-enqueued unless it belongs
    /// to the departing process.
    pub fn remove_owned_by(&mut self, pid: Pid) {
        for _ in 0..self.queue.len() {
            if let Some(key) = self.queue.pop_front() {
                if key.pid != pid {
                    self.queue.push_back(key);
                }
            }
        }
    }

    /// Iterate the handles from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &PageKey> {
        self.queue.iter()
    }
}

// ============================================================================
// Frame Reclamation
// ============================================================================

impl Pager {
    /// A frame for a fault to bind: the oldest free one, or the second
    /// chance victim's when the pool is dry.
    pub(crate) fn take_frame(&mut self) -> Frame {
        match self.frames.acquire() {
            Some(frame) => frame,
            None => self.evict_one(),
        }
    }

    /// Run the clock until an unreferenced head turns up, evict it, and
    /// return its frame.
    ///
    /// A dirty victim is written back to its block first, unless its zero
    /// fill is still pending: then the block holds garbage and the page's
    /// logical content never left the all-zero state, so the write is
    /// skipped.
    fn evict_one(&mut self) -> Frame {
        loop {
            let key = self
                .clock
                .dequeue()
                .expect("out of frames with nothing resident to evict");
            let proc = self
                .processes
                .get_mut(&key.pid)
                .expect("clock handle for unregistered process");
            let rec = proc
                .records
                .get_mut(&key.vpage)
                .expect("clock handle for missing record");

            if rec.referenced {
                rec.referenced = false;
                proc.pagetable.entry_mut(key.vpage).disable();
                self.clock.enqueue(key);
                self.pageout_stats.rotations += 1;
                continue;
            }

            let frame = rec.frame;
            let block = rec.block;
            let write_back = rec.modified && !rec.zero_pending;
            rec.modified = false;
            rec.referenced = false;
            rec.resident = false;
            proc.pagetable.entry_mut(key.vpage).disable();
            if write_back {
                self.machine.disk_write(block, frame);
                self.pageout_stats.write_backs += 1;
            }
            self.pageout_stats.evictions += 1;
            log::trace!(
                "evict: pid {} vpage {} frame {} write_back {}",
                key.pid,
                key.vpage,
                frame,
                write_back
            );
            return frame;
        }
    }
}
