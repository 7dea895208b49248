//! Join operator benchmarks: radix hash join vs sort-merge join on an
//! equi-join workload.
//!
//! Workload parameters:
//!   - Build size: distinct keys times multiplicity on the build side
//!   - Probe size: rows on the probe side
//!   - Selectivity: fraction of probe keys with a match

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use granite_executor::{HashJoin, JoinMode, PredicateCondition, SortMergeJoin};
use granite_scheduler::Scheduler;
use granite_storage::{ColumnDefinition, Segment, Table, TableType, ValueSegment};
use granite_types::DataType;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const CHUNK_SIZE: usize = 65_536;

struct JoinWorkload {
    build: Arc<Table>,
    probe: Arc<Table>,
    label: String,
}

impl JoinWorkload {
    /// Deterministic workload: build keys 0..`build_keys` each repeated
    /// `multiplicity` times, probe keys hitting with `selectivity`.
    fn generate(build_keys: usize, multiplicity: usize, probe_rows: usize, selectivity: f64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(0x6a6f696e);

        let mut build_values: Vec<Option<i32>> = Vec::with_capacity(build_keys * multiplicity);
        for key in 0..build_keys as i32 {
            build_values.extend(std::iter::repeat(Some(key)).take(multiplicity));
        }
        build_values.shuffle(&mut rng);

        let matching = (probe_rows as f64 * selectivity) as usize;
        let mut probe_values: Vec<Option<i32>> = Vec::with_capacity(probe_rows);
        for _ in 0..matching {
            probe_values.push(Some(rng.gen_range(0..build_keys as i32)));
        }
        for _ in matching..probe_rows {
            probe_values.push(Some(build_keys as i32 + rng.gen_range(0..build_keys as i32)));
        }
        probe_values.shuffle(&mut rng);

        JoinWorkload {
            build: int_table(build_values),
            probe: int_table(probe_values),
            label: format!(
                "{}kx{}_probe{}k_sel{:.0}",
                build_keys / 1_000,
                multiplicity,
                probe_rows / 1_000,
                selectivity * 100.0
            ),
        }
    }
}

fn int_table(values: Vec<Option<i32>>) -> Arc<Table> {
    let mut table =
        Table::new(vec![ColumnDefinition::new("k", DataType::Int, true)], TableType::Value);
    for chunk in values.chunks(CHUNK_SIZE) {
        table.append_chunk(vec![Segment::Value(ValueSegment::int(chunk.to_vec()))]).unwrap();
    }
    Arc::new(table)
}

fn bench_hash_join(c: &mut Criterion) {
    let scheduler = Scheduler::new(Scheduler::default_worker_count());
    let mut group = c.benchmark_group("hash_join_inner");

    for workload in [
        JoinWorkload::generate(10_000, 1, 100_000, 0.5),
        JoinWorkload::generate(100_000, 4, 400_000, 0.9),
    ] {
        let rows = workload.build.row_count() + workload.probe.row_count();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(&workload.label),
            &workload,
            |b, workload| {
                b.iter(|| {
                    let join = HashJoin::new(
                        workload.build.clone(),
                        workload.probe.clone(),
                        JoinMode::Inner,
                        (0, 0),
                        PredicateCondition::Equals,
                        None,
                        vec![],
                    )
                    .unwrap();
                    black_box(join.execute(Some(&scheduler)).unwrap())
                });
            },
        );
    }
    group.finish();
}

fn bench_sort_merge_join(c: &mut Criterion) {
    let scheduler = Scheduler::new(Scheduler::default_worker_count());
    let mut group = c.benchmark_group("sort_merge_join_inner");

    for workload in [
        JoinWorkload::generate(10_000, 1, 100_000, 0.5),
        JoinWorkload::generate(100_000, 4, 400_000, 0.9),
    ] {
        let rows = workload.build.row_count() + workload.probe.row_count();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(&workload.label),
            &workload,
            |b, workload| {
                b.iter(|| {
                    let join = SortMergeJoin::new(
                        workload.build.clone(),
                        workload.probe.clone(),
                        JoinMode::Inner,
                        (0, 0),
                        PredicateCondition::Equals,
                    )
                    .unwrap();
                    black_box(join.execute(Some(&scheduler)).unwrap())
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_hash_join, bench_sort_merge_join);
criterion_main!(benches);
