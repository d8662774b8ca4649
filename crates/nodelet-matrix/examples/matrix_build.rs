//! Build one row in each of two 16-row matrices on an 8-partition machine.
//!
//! Row 2 of `A` gets the even fixture and row 13 of `B` the odd fixture.
//! Each builder is hinted toward its row's partition before it is spawned,
//! so it starts where its row lives, and runs inside a `matrix_build`
//! measurement region. The migration map printed at the end
//! shows one row per source partition, one column per destination.
//!
//! Run with `RUST_LOG=debug` to see construction and scheduling events.

use std::process::ExitCode;
use std::sync::Arc;

use nodelet_arena::{Machine, MachineConfig};
use nodelet_core::{NodeletError, TracingHooks};
use nodelet_matrix::DistributedMatrix;
use nodelet_sched::{SchedConfig, Scheduler};
use nodelet_test_utils::{init_subscriber, EVEN_ROW, ODD_ROW};

const PARTITIONS: usize = 8;
const NROWS: usize = 16;

fn run() -> Result<(), NodeletError> {
    let machine = Machine::new(MachineConfig::new(PARTITIONS))?;
    let hooks = Arc::new(TracingHooks::new());
    let sched = Scheduler::with_hooks(&machine, SchedConfig::default(), hooks)?;
    let mut ctx = sched.root();

    let a = DistributedMatrix::create(&mut ctx, NROWS)?;
    let b = DistributedMatrix::create(&mut ctx, NROWS)?;
    println!(
        "created A and B: {NROWS} rows, {} per partition",
        a.rows_per_partition()
    );

    sched.migration_log().reset();
    a.spawn_build(&mut ctx, 2, EVEN_ROW.to_vec())?;
    b.spawn_build(&mut ctx, 13, ODD_ROW.to_vec())?;
    ctx.join()?;
    let map = sched.migration_log().snapshot();

    for (name, m, row) in [("A", &a, 2), ("B", &b, 13)] {
        println!(
            "{name}[{row}] on partition {}: {:?}",
            m.storage_partition(row)?,
            m.row(&mut ctx, row)?
        );
    }
    println!("migration map (from \\ to):");
    print!("{map}");
    Ok(())
}

fn main() -> ExitCode {
    init_subscriber();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("matrix_build failed: {e}");
            ExitCode::FAILURE
        }
    }
}
