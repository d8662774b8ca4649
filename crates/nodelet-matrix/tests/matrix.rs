//! End-to-end behaviour of `DistributedMatrix` on a running scheduler.

use std::sync::Arc;

use nodelet_arena::{Machine, MachineConfig};
use nodelet_core::{Location, NodeletError, PartitionId, Resident};
use nodelet_matrix::{DistributedMatrix, MatrixConfig, BUILD_REGION, CREATE_REGION};
use nodelet_sched::{SchedConfig, Scheduler};
use nodelet_test_utils::{fixture_row, init_test_subscriber, RecordingHooks, EVEN_ROW, ODD_ROW};

fn scheduler(partitions: usize, capacity: usize) -> Scheduler {
    let machine = Machine::new(MachineConfig::new(partitions).with_capacity(capacity)).unwrap();
    Scheduler::new(&machine, SchedConfig::default()).unwrap()
}

#[test]
fn sixteen_rows_over_eight_partitions() {
    let _guard = init_test_subscriber();
    let s = scheduler(8, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 16).unwrap();

    assert_eq!(m.rows_per_partition(), 2);
    assert_eq!(m.row_address(2).unwrap(), Location::new(PartitionId(2), 0));
    assert_eq!(m.row_address(13).unwrap(), Location::new(PartitionId(5), 1));

    m.spawn_build(&mut ctx, 2, EVEN_ROW.to_vec()).unwrap();
    m.spawn_build(&mut ctx, 13, ODD_ROW.to_vec()).unwrap();
    ctx.join().unwrap();

    assert_eq!(m.row(&mut ctx, 2).unwrap(), EVEN_ROW.to_vec());
    assert_eq!(m.row_len(&mut ctx, 2).unwrap(), 8);
    assert_eq!(m.row(&mut ctx, 13).unwrap(), ODD_ROW.to_vec());
    assert_eq!(m.row_len(&mut ctx, 13).unwrap(), 7);
    assert_eq!(m.storage_partition(13).unwrap(), PartitionId(5));
}

#[test]
fn every_row_is_stored_on_its_owning_partition() {
    let s = scheduler(4, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 11).unwrap();
    for row in 0..11 {
        m.spawn_build(&mut ctx, row, fixture_row(row).to_vec()).unwrap();
    }
    ctx.join().unwrap();
    for row in 0..11 {
        let owner = PartitionId((row % 4) as u32);
        assert_eq!(m.owning_partition(row).unwrap(), owner);
        assert_eq!(m.storage_partition(row).unwrap(), owner);
    }
    // Growth was charged to owners only: partition 3 owns rows 3 and 7.
    let machine = s.machine();
    assert!(machine.heap(PartitionId(3)).allocations() > 0);
}

#[test]
fn header_is_identical_on_every_partition() {
    let s = scheduler(8, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 16).unwrap();
    let home = *m.header_replica(PartitionId::HOME).unwrap();
    assert_eq!(home.nrows, 16);
    assert_eq!(home.rows_per_partition, 2);
    for p in s.machine().partition_ids() {
        assert_eq!(m.header_replica(p), Some(&home));
    }
    assert!(m.is_header_coherent());

    // Reading the header from a remote partition never migrates.
    let before = s.migration_log().total_migrations();
    ctx.relocate_to(PartitionId(6));
    assert_eq!(m.header(&ctx).unwrap(), &home);
    assert_eq!(s.migration_log().total_migrations(), before + 1);
}

#[test]
fn every_slot_is_empty_after_create() {
    let s = scheduler(4, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 10).unwrap();
    for row in 0..10 {
        assert_eq!(m.row_len(&mut ctx, row).unwrap(), 0);
    }
}

#[test]
fn fan_out_allocates_ceil_slots_per_partition() {
    let s = scheduler(4, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 10).unwrap();
    assert_eq!(m.rows_per_partition(), 3);
    let mut reachable = 0;
    for p in s.machine().partition_ids() {
        assert_eq!(m.slots_on(p), 3);
        reachable += m.rows_on(p);
    }
    assert_eq!(reachable, 10);
    assert_eq!(m.header(&ctx).unwrap().padding_slots(), 2);
}

#[test]
fn appends_across_tasks_keep_order_when_serialised() {
    let s = scheduler(4, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 4).unwrap();
    for chunk in EVEN_ROW.chunks(3) {
        m.spawn_build(&mut ctx, 1, chunk.to_vec()).unwrap();
        ctx.join().unwrap();
    }
    assert_eq!(m.row(&mut ctx, 1).unwrap(), EVEN_ROW.to_vec());
}

#[test]
fn same_row_builders_on_the_owner_never_interleave() {
    let s = scheduler(2, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 2).unwrap();
    let first: Vec<_> = (0..50).map(|c| (c, 1)).collect();
    let second: Vec<_> = (0..50).map(|c| (c, 2)).collect();
    m.spawn_build(&mut ctx, 1, first.clone()).unwrap();
    m.spawn_build(&mut ctx, 1, second.clone()).unwrap();
    ctx.join().unwrap();
    let row = m.row(&mut ctx, 1).unwrap();
    assert_eq!(row.len(), 100);
    let (a, b) = row.split_at(50);
    assert!(
        (a == first.as_slice() && b == second.as_slice())
            || (a == second.as_slice() && b == first.as_slice())
    );
}

#[test]
fn out_of_range_rows_fail_fast() {
    let s = scheduler(4, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 5).unwrap();
    let err = NodeletError::IndexOutOfRange { index: 5, len: 5 };
    assert_eq!(m.owning_partition(5), Err(err.clone()));
    assert_eq!(m.append_entry(&mut ctx, 5, 0, 0), Err(err.clone()));
    assert_eq!(m.spawn_build(&mut ctx, 5, vec![(0, 0)]), Err(err));
    assert_eq!(ctx.outstanding(), 0);
}

#[test]
fn zero_rows_is_invalid() {
    let s = scheduler(4, 1 << 16);
    let mut ctx = s.root();
    assert!(matches!(
        DistributedMatrix::create(&mut ctx, 0),
        Err(NodeletError::InvalidArgument { .. })
    ));
}

#[test]
fn fan_out_failure_is_one_out_of_memory_and_leaks_nothing() {
    let capacity = 1 << 16;
    let s = scheduler(4, capacity);
    let machine = Arc::clone(s.machine());
    // Leave partition 3 too little room for its rows' reservations.
    let squeezed = capacity - 4096;
    machine.reserve_local(PartitionId(3), squeezed).unwrap();

    let mut ctx = s.root();
    let config = MatrixConfig::with_row_reserve(200);
    let err = DistributedMatrix::create_with(&mut ctx, 8, &config).unwrap_err();
    assert!(matches!(
        err,
        NodeletError::OutOfMemory {
            partition: PartitionId(3),
            ..
        }
    ));
    assert_eq!(machine.live_blocks(), 0);
    assert_eq!(machine.used_bytes(), squeezed);
    assert_eq!(ctx.outstanding(), 0);
}

#[test]
fn body_allocation_failure_returns_no_handle() {
    let s = scheduler(2, 64);
    let mut ctx = s.root();
    let err = DistributedMatrix::create(&mut ctx, 1000).unwrap_err();
    assert!(matches!(err, NodeletError::OutOfMemory { .. }));
    assert_eq!(s.machine().live_blocks(), 0);
    assert_eq!(s.machine().used_bytes(), 0);
}

#[test]
fn dropping_the_last_handle_releases_every_partition() {
    let s = scheduler(4, 1 << 16);
    let mut ctx = s.root();
    {
        let m = DistributedMatrix::create_with(&mut ctx, 12, &MatrixConfig::with_row_reserve(2))
            .unwrap();
        let builder = m.clone();
        builder.spawn_build(&mut ctx, 7, ODD_ROW.to_vec()).unwrap();
        ctx.join().unwrap();
        assert_eq!(s.machine().live_blocks(), 2);
        assert!(s.machine().heaps().iter().all(|h| h.used_bytes() > 0));
    }
    assert_eq!(s.machine().live_blocks(), 0);
    assert_eq!(s.machine().used_bytes(), 0);
}

#[test]
fn construction_is_wrapped_in_a_measurement_region() {
    let machine = Machine::new(MachineConfig::new(2).with_capacity(1 << 12)).unwrap();
    let hooks = Arc::new(RecordingHooks::new());
    let s = Scheduler::with_hooks(&machine, SchedConfig::default(), hooks.clone()).unwrap();
    let mut ctx = s.root();
    let _m = DistributedMatrix::create(&mut ctx, 4).unwrap();
    assert_eq!(
        hooks.events(),
        vec![format!("+{CREATE_REGION}"), format!("-{CREATE_REGION}")]
    );
}

#[test]
fn spawned_builds_are_wrapped_in_a_measurement_region() {
    let machine = Machine::new(MachineConfig::new(4).with_capacity(1 << 12)).unwrap();
    let hooks = Arc::new(RecordingHooks::new());
    let s = Scheduler::with_hooks(&machine, SchedConfig::default(), hooks.clone()).unwrap();
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 8).unwrap();
    m.spawn_build(&mut ctx, 6, EVEN_ROW.to_vec()).unwrap();
    ctx.join().unwrap();
    assert_eq!(
        hooks.events(),
        vec![
            format!("+{CREATE_REGION}"),
            format!("-{CREATE_REGION}"),
            format!("+{BUILD_REGION}"),
            format!("-{BUILD_REGION}"),
        ]
    );
}

#[test]
fn rows_reject_a_context_from_a_smaller_machine() {
    let s = scheduler(8, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 16).unwrap();

    let before = s.migration_log().total_migrations();
    let small = scheduler(2, 1 << 16);
    let mut foreign = small.root();
    let err = m.append_entry(&mut foreign, 13, 1, 1).unwrap_err();
    assert!(matches!(err, NodeletError::ForeignContext { .. }));
    assert!(m.spawn_build(&mut foreign, 13, ODD_ROW.to_vec()).is_err());
    assert_eq!(small.migration_log().total_migrations(), 0);
    assert_eq!(s.migration_log().total_migrations(), before);
    assert_eq!(m.row_len(&mut ctx, 13).unwrap(), 0);
}

#[test]
fn rows_reject_a_context_from_a_larger_machine() {
    let s = scheduler(2, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 4).unwrap();

    let large = scheduler(8, 1 << 16);
    let mut foreign = large.root();
    foreign.relocate_to(PartitionId(5));
    assert!(matches!(
        m.header(&foreign),
        Err(NodeletError::ForeignContext { .. })
    ));
    assert!(matches!(
        m.row(&mut foreign, 1),
        Err(NodeletError::ForeignContext { .. })
    ));
    assert_eq!(foreign.partition(), PartitionId(5));
}

#[test]
fn hinted_builds_avoid_the_outbound_migration() {
    let s = scheduler(8, 1 << 16);
    let mut ctx = s.root();
    let m = DistributedMatrix::create(&mut ctx, 16).unwrap();

    let before = s.migration_log().snapshot();
    m.spawn_build(&mut ctx, 13, ODD_ROW.to_vec()).unwrap();
    ctx.join().unwrap();
    let hinted = s.migration_log().snapshot().since(&before);

    let before = s.migration_log().snapshot();
    let unhinted = m.clone();
    ctx.spawn(move |task| unhinted.append_entries(task, 13, &ODD_ROW))
        .unwrap();
    ctx.join().unwrap();
    let plain = s.migration_log().snapshot().since(&before);

    assert_eq!(hinted.migrations(PartitionId(0), PartitionId(5)), 0);
    assert_eq!(plain.migrations(PartitionId(0), PartitionId(5)), 1);
    assert!(hinted.total_migrations() < plain.total_migrations());
}

#[cfg(not(miri))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn striping_covers_every_row_exactly_once(
            partitions in 1usize..9,
            nrows in 1usize..64,
        ) {
            let s = scheduler(partitions, 1 << 16);
            let mut ctx = s.root();
            let m = DistributedMatrix::create(&mut ctx, nrows).unwrap();
            prop_assert_eq!(m.rows_per_partition(), nrows.div_ceil(partitions));
            let mut seen = std::collections::HashSet::new();
            for row in 0..nrows {
                let loc = m.row_address(row).unwrap();
                prop_assert_eq!(loc.partition.index(), row % partitions);
                prop_assert!(loc.offset < m.rows_per_partition());
                prop_assert!(seen.insert(loc));
            }
            let reachable: usize = s.machine().partition_ids().map(|p| m.rows_on(p)).sum();
            prop_assert_eq!(reachable, nrows);
        }
    }
}
