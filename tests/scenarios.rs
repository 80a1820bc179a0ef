//! End-to-end scenarios driven the way a host would drive the pager: byte
//! accesses go through the table-consulting emulation, faulting on demand,
//! and every step leaves the pager's bookkeeping consistent.

use pager_r::vm::machine::SimMachine;
use pager_r::vm::vm_page::{ARENA_BASE, ARENA_PAGES, PAGE_SIZE};
use pager_r::{Pager, PagerError, Pid};

fn two_frame_pager() -> Pager {
    let mut p = Pager::with_sim(2, 4);
    p.create(Pid(1)).unwrap();
    p.switch_to(Pid(1)).unwrap();
    p
}

#[test]
fn extend_write_read_round_trip() {
    let mut p = two_frame_pager();
    let a = p.extend().unwrap();
    assert_eq!(a, ARENA_BASE);

    p.mem_write(a, b'X').unwrap();
    assert_eq!(p.mem_read(a).unwrap(), b'X');

    assert_eq!(p.free_frame_count(), 1);
    assert_eq!(p.free_block_count(), 3);
    assert_eq!(p.clock_len(), 1);
    p.check_consistency().unwrap();
}

#[test]
fn deferred_zero_read_never_touches_disk() {
    // Plant garbage in the block the first extend will reserve, to prove
    // the zero-fill path never reads it.
    let mut machine = SimMachine::new(2, 4);
    machine.poison_block(0, 0xee);
    let mut p = Pager::new(2, 4, Box::new(machine));
    p.create(Pid(1)).unwrap();
    p.switch_to(Pid(1)).unwrap();

    let a = p.extend().unwrap();
    assert_eq!(p.mem_read(a + 5).unwrap(), 0);
    assert_eq!(p.fault_stats().page_ins, 0);
    assert_eq!(p.pageout_stats().write_backs, 0);
    assert!(p.page_state(Pid(1), 0).unwrap().zero_pending);

    // The first write discharges the pending zero.
    p.mem_write(a, 1).unwrap();
    assert!(!p.page_state(Pid(1), 0).unwrap().zero_pending);
    p.check_consistency().unwrap();
}

#[test]
fn whole_page_reads_zero_after_read_fault() {
    let mut machine = SimMachine::new(2, 4);
    machine.poison_block(0, 0xa5);
    let mut p = Pager::new(2, 4, Box::new(machine));
    p.create(Pid(1)).unwrap();
    p.switch_to(Pid(1)).unwrap();

    let a = p.extend().unwrap();
    p.fault(a, false).unwrap();
    for off in 0..PAGE_SIZE as u64 {
        assert_eq!(p.mem_read(a + off).unwrap(), 0);
    }
    p.check_consistency().unwrap();
}

#[test]
fn third_write_evicts_with_write_back() {
    let mut p = two_frame_pager();
    let a = p.extend().unwrap();
    let b = p.extend().unwrap();
    let c = p.extend().unwrap();

    p.mem_write(a, 1).unwrap();
    p.mem_write(b, 2).unwrap();
    p.mem_write(c, 3).unwrap();

    let stats = p.pageout_stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.write_backs, 1);
    assert!(!p.page_state(Pid(1), 0).unwrap().resident);

    // Touching the evicted page reloads it from disk and evicts another.
    assert_eq!(p.mem_read(a).unwrap(), 1);
    assert!(p.page_state(Pid(1), 0).unwrap().resident);
    let b_resident = p.page_state(Pid(1), 1).unwrap().resident;
    let c_resident = p.page_state(Pid(1), 2).unwrap().resident;
    assert!(b_resident != c_resident);
    assert_eq!(p.free_frame_count(), 0);
    assert_eq!(p.clock_len(), 2);
    p.check_consistency().unwrap();
}

#[test]
fn second_chance_spares_referenced_page() {
    let mut p = two_frame_pager();
    let a = p.extend().unwrap();
    let b = p.extend().unwrap();
    let c = p.extend().unwrap();

    p.mem_write(a, 1).unwrap();
    p.mem_write(b, 2).unwrap();
    // Evicts `a` after one full rotation; `b` is left unreferenced while
    // `c` enters referenced.
    p.mem_write(c, 3).unwrap();
    assert!(!p.page_state(Pid(1), 0).unwrap().resident);

    // Reloading `a` must claim unreferenced `b` and spare referenced `c`.
    p.mem_write(a, 4).unwrap();
    assert!(!p.page_state(Pid(1), 1).unwrap().resident);
    assert!(p.page_state(Pid(1), 2).unwrap().resident);
    p.check_consistency().unwrap();
}

#[test]
fn working_set_does_not_thrash() {
    let mut p = two_frame_pager();
    let a = p.extend().unwrap();
    let b = p.extend().unwrap();
    p.mem_write(a, 1).unwrap();
    p.mem_write(b, 2).unwrap();

    let evictions = p.pageout_stats().evictions;
    for round in 0..50u8 {
        p.mem_write(a, round).unwrap();
        p.mem_write(b, round).unwrap();
    }
    assert_eq!(p.pageout_stats().evictions, evictions);
    p.check_consistency().unwrap();
}

#[test]
fn syslog_spans_two_pages() {
    let mut p = two_frame_pager();
    let _a = p.extend().unwrap();
    let b = p.extend().unwrap();

    let start = b - 5;
    let payload = b"0123456789";
    for (i, byte) in payload.iter().enumerate() {
        p.mem_write(start + i as u64, *byte).unwrap();
    }

    let msg = p.syslog(start, payload.len() as u64).unwrap();
    assert_eq!(msg, payload);
    assert_eq!(p.syslog_calls(), 1);
    p.check_consistency().unwrap();
}

#[test]
fn syslog_faults_in_evicted_pages() {
    let mut p = two_frame_pager();
    let a = p.extend().unwrap();
    let b = p.extend().unwrap();
    let c = p.extend().unwrap();
    p.mem_write(a, b'm').unwrap();
    // Push page 0 out of memory.
    p.mem_write(b, 1).unwrap();
    p.mem_write(c, 2).unwrap();
    assert!(!p.page_state(Pid(1), 0).unwrap().resident);

    let msg = p.syslog(a, 1).unwrap();
    assert_eq!(msg, b"m");
    p.check_consistency().unwrap();
}

#[test]
fn destroy_returns_all_resources() {
    let mut p = two_frame_pager();
    let a = p.extend().unwrap();
    let b = p.extend().unwrap();
    let c = p.extend().unwrap();
    p.mem_write(a, 1).unwrap();
    p.mem_write(b, 2).unwrap();
    p.mem_write(c, 3).unwrap();

    p.destroy().unwrap();
    assert_eq!(p.free_frame_count(), 2);
    assert_eq!(p.free_block_count(), 4);
    assert_eq!(p.clock_len(), 0);
    assert_eq!(p.current_pid(), None);

    // A freshly created process must see a fully cleared table and an
    // all-zero view of its pages even though storage was recycled.
    p.create(Pid(2)).unwrap();
    p.switch_to(Pid(2)).unwrap();
    let a2 = p.extend().unwrap();
    let pte = p.pte(Pid(2), 0).unwrap();
    assert!(!pte.read_enable && !pte.write_enable);
    assert_eq!(p.mem_read(a2).unwrap(), 0);
    assert_eq!(p.mem_read(a2 + PAGE_SIZE as u64 - 1).unwrap(), 0);
    p.check_consistency().unwrap();
}

#[test]
fn fault_on_unallocated_address_fails() {
    let mut p = two_frame_pager();
    assert_eq!(
        p.fault(ARENA_BASE, false),
        Err(PagerError::InvalidAddress { addr: ARENA_BASE })
    );
    // Nothing changed.
    assert_eq!(p.free_frame_count(), 2);
    assert_eq!(p.clock_len(), 0);
    p.check_consistency().unwrap();
}

#[test]
fn block_exhaustion_fails_extend() {
    let mut p = Pager::with_sim(2, 3);
    p.create(Pid(1)).unwrap();
    p.switch_to(Pid(1)).unwrap();
    for _ in 0..3 {
        p.extend().unwrap();
    }
    assert_eq!(p.extend(), Err(PagerError::OutOfBlocks));
    assert_eq!(p.free_block_count(), 0);
    assert_eq!(p.current_process().unwrap().next_vpage, 3);
    p.check_consistency().unwrap();
}

#[test]
fn arena_exhaustion_fails_extend() {
    // More blocks than arena pages; extends never touch the machine, so a
    // tiny simulated disk is enough.
    let mut p = Pager::new(1, ARENA_PAGES + 1, Box::new(SimMachine::new(1, 1)));
    p.create(Pid(1)).unwrap();
    p.switch_to(Pid(1)).unwrap();
    for _ in 0..ARENA_PAGES {
        p.extend().unwrap();
    }
    assert_eq!(p.extend(), Err(PagerError::ArenaFull));
    assert_eq!(p.free_block_count(), 1);
    assert_eq!(p.current_process().unwrap().next_vpage, ARENA_PAGES);
}

#[test]
fn two_processes_share_the_frame_pool() {
    let mut p = two_frame_pager();
    let a = p.extend().unwrap();
    p.mem_write(a, b'1').unwrap();

    p.create(Pid(2)).unwrap();
    p.switch_to(Pid(2)).unwrap();
    let b = p.extend().unwrap();
    let c = p.extend().unwrap();
    p.mem_write(b, b'2').unwrap();
    p.mem_write(c, b'3').unwrap();

    // Process 1's page was evicted to make room; switching back and
    // reading it must page it in with its data intact.
    p.switch_to(Pid(1)).unwrap();
    assert_eq!(p.mem_read(a).unwrap(), b'1');
    p.check_consistency().unwrap();

    // Destroying process 1 leaves process 2's pages untouched.
    p.destroy().unwrap();
    p.switch_to(Pid(2)).unwrap();
    assert_eq!(p.mem_read(c).unwrap(), b'3');
    p.check_consistency().unwrap();
}
