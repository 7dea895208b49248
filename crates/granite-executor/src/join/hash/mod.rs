//! Parallel radix hash join.
//!
//! Execution outline (radix partitioning is skipped when `radix_bits` is
//! zero):
//!
//! ```text
//!          build side                        probe side
//!              |                                 |
//!      materialize chunks                materialize chunks
//!              |                                 |
//!      radix partition                    radix partition
//!              |                                 |
//!     build per-partition                        |
//!        hash tables                             |
//!              \_____________       ____________/
//!                            \     /
//!                     probe per partition
//! ```
//!
//! Both data paths run as one task graph behind a single barrier; probing
//! is a second task group behind the second barrier. The build side is the
//! smaller input unless the join mode dictates otherwise.

pub(crate) mod probe;

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use granite_scheduler::{wait_for_tasks, Scheduler, Task};
use granite_storage::{ColumnId, PosList, Table, NULL_ROW_ID};
use log::{debug, warn};

use crate::config::JoinConfig;
use crate::join::hash::probe::{
    probe_partition, probe_partition_semi_anti, HashTable, ProbeContext,
};
use crate::join::key::JoinKey;
use crate::join::materialize::{create_materialize_tasks, new_chunk_slots};
use crate::join::output::build_output_table;
use crate::join::radix::{calculate_radix_bits, create_partition_tasks, PartitionSpec};
use crate::join::{
    validate_join_columns, with_join_key_type, JoinMode, JoinPredicate, PredicateCondition,
};
use crate::ExecutorError;

/// Hash join operator. Requires an equality predicate; additional
/// predicates must be equalities and are AND-ed during probing.
pub struct HashJoin {
    left: Arc<Table>,
    right: Arc<Table>,
    mode: JoinMode,
    column_ids: (ColumnId, ColumnId),
    radix_bits: Option<u32>,
    additional_predicates: Vec<JoinPredicate>,
    config: JoinConfig,
}

impl HashJoin {
    pub fn new(
        left: Arc<Table>,
        right: Arc<Table>,
        mode: JoinMode,
        column_ids: (ColumnId, ColumnId),
        condition: PredicateCondition,
        radix_bits: Option<u32>,
        additional_predicates: Vec<JoinPredicate>,
    ) -> Result<HashJoin, ExecutorError> {
        if condition != PredicateCondition::Equals {
            return Err(ExecutorError::UnsupportedPredicate {
                operator: "hash join",
                condition,
                mode,
            });
        }
        if matches!(mode, JoinMode::Cross | JoinMode::Outer) {
            return Err(ExecutorError::UnsupportedJoinMode { operator: "hash join", mode });
        }
        validate_join_columns(&left, &right, column_ids)?;
        for predicate in &additional_predicates {
            if predicate.condition != PredicateCondition::Equals {
                return Err(ExecutorError::AdditionalPredicateUnsupported {
                    condition: predicate.condition,
                });
            }
            validate_join_columns(&left, &right, predicate.column_ids)?;
        }

        Ok(HashJoin {
            left,
            right,
            mode,
            column_ids,
            radix_bits,
            additional_predicates,
            config: JoinConfig::default(),
        })
    }

    pub fn with_config(mut self, config: JoinConfig) -> HashJoin {
        self.config = config;
        self
    }

    /// Run the join, returning a reference table with the concatenated
    /// (left, right) schema. Pass `None` to execute inline on this thread.
    pub fn execute(&self, scheduler: Option<&Arc<Scheduler>>) -> Result<Table, ExecutorError> {
        let data_type = validate_join_columns(&self.left, &self.right, self.column_ids)?;
        with_join_key_type!(data_type, K, { self.execute_typed::<K>(scheduler) })
    }

    fn execute_typed<T: JoinKey>(
        &self,
        scheduler: Option<&Arc<Scheduler>>,
    ) -> Result<Table, ExecutorError> {
        // Side selection: LEFT outer, semi and anti joins must probe with
        // the left input (it is the preserved / filtered side); RIGHT outer
        // must probe with the right input. Otherwise the smaller side is
        // built into hash tables.
        let inputs_swapped = matches!(self.mode, JoinMode::Left | JoinMode::Semi | JoinMode::Anti)
            || (self.mode == JoinMode::Inner && self.left.row_count() > self.right.row_count());

        let (build_table, probe_table) = if inputs_swapped {
            (self.right.clone(), self.left.clone())
        } else {
            (self.left.clone(), self.right.clone())
        };
        let (build_column, probe_column) = if inputs_swapped {
            (self.column_ids.1, self.column_ids.0)
        } else {
            self.column_ids
        };
        let predicates: Vec<JoinPredicate> = if inputs_swapped {
            self.additional_predicates.iter().map(JoinPredicate::flipped).collect()
        } else {
            self.additional_predicates.clone()
        };

        if build_table.row_count() > probe_table.row_count() {
            warn!(
                "hash join build side larger than probe side ({} > {} rows){}",
                build_table.row_count(),
                probe_table.row_count(),
                if inputs_swapped { " (input relations have been swapped)" } else { "" }
            );
        }

        // NULL join keys never match, but the probe rows carrying them are
        // emitted for outer joins and qualify for anti joins.
        let keep_nulls = matches!(self.mode, JoinMode::Left | JoinMode::Right | JoinMode::Anti);

        let radix_bits = self
            .config
            .radix_bits
            .or(self.radix_bits)
            .unwrap_or_else(|| {
                calculate_radix_bits::<T>(self.config.l2_cache_bytes, build_table.row_count())
            });
        let partition_count = 1usize << radix_bits;

        let prepare_timer = Instant::now();

        // Phase 1: materialize, partition and build both sides as one task
        // graph behind a single barrier.
        let build_slots = new_chunk_slots::<T>(build_table.chunk_count());
        let build_materialize = create_materialize_tasks::<T>(
            &build_table,
            build_column,
            false,
            Some(radix_bits),
            &build_slots,
            "build",
        );
        let build_phase = create_partition_tasks::<T>(
            build_slots,
            PartitionSpec::Radix { radix_bits },
            &build_materialize,
            "build",
        );

        let probe_slots = new_chunk_slots::<T>(probe_table.chunk_count());
        let probe_materialize = create_materialize_tasks::<T>(
            &probe_table,
            probe_column,
            keep_nulls,
            Some(radix_bits),
            &probe_slots,
            "probe",
        );
        let probe_phase = create_partition_tasks::<T>(
            probe_slots,
            PartitionSpec::Radix { radix_bits },
            &probe_materialize,
            "probe",
        );

        let hash_tables: Arc<Vec<OnceLock<HashTable<T>>>> =
            Arc::new((0..partition_count).map(|_| OnceLock::new()).collect());
        let build_barrier = build_phase.barrier_tasks();
        let build_hash_table_tasks: Vec<Arc<Task>> = (0..partition_count)
            .map(|partition| {
                let plan = build_phase.plan();
                let hash_tables = hash_tables.clone();
                let task = Task::new(format!("build hash table partition {}", partition), move || {
                    let plan = plan.get().expect("build partitions not ready");
                    // Safety: runs strictly after the build-side scatter.
                    let elements = unsafe { plan.partition_slice(partition) };
                    if elements.is_empty() {
                        return;
                    }
                    if hash_tables[partition].set(HashTable::build(elements)).is_err() {
                        panic!("hash table for partition {} built twice", partition);
                    }
                });
                for barrier_task in &build_barrier {
                    barrier_task.set_as_predecessor_of(&task);
                }
                task
            })
            .collect();

        let mut first_phase: Vec<Arc<Task>> = Vec::new();
        first_phase.extend(build_materialize);
        first_phase.extend(probe_materialize);
        first_phase.extend(build_phase.all_tasks());
        first_phase.extend(probe_phase.all_tasks());
        first_phase.extend(build_hash_table_tasks.iter().cloned());
        for task in &first_phase {
            task.schedule(scheduler);
        }
        wait_for_tasks(&first_phase);
        drop(build_hash_table_tasks);

        // The build container's values now live in the hash tables.
        let _ = build_phase.into_container();
        let probe_container = Arc::new(probe_phase.into_container());
        debug!(
            "hash join prepared {} partitions ({} build rows) in {:?}",
            partition_count,
            build_table.row_count(),
            prepare_timer.elapsed()
        );

        // Phase 2: probe each partition.
        let probe_timer = Instant::now();
        let pair_slots: Arc<Vec<OnceLock<(PosList, PosList)>>> =
            Arc::new((0..partition_count).map(|_| OnceLock::new()).collect());
        let probe_tasks: Vec<Arc<Task>> = (0..partition_count)
            .map(|partition| {
                let probe_container = probe_container.clone();
                let hash_tables = hash_tables.clone();
                let pair_slots = pair_slots.clone();
                let build_table = build_table.clone();
                let probe_table = probe_table.clone();
                let predicates = predicates.clone();
                let mode = self.mode;
                Task::new(format!("probe partition {}", partition), move || {
                    let context = ProbeContext {
                        build_table: &build_table,
                        probe_table: &probe_table,
                        predicates: &predicates,
                    };
                    let elements = probe_container.partition(partition);
                    let hash_table = hash_tables[partition].get();
                    let pair = match mode {
                        JoinMode::Semi => (
                            PosList::new(),
                            probe_partition_semi_anti(elements, hash_table, false, &context),
                        ),
                        JoinMode::Anti => (
                            PosList::new(),
                            probe_partition_semi_anti(elements, hash_table, true, &context),
                        ),
                        _ => probe_partition(
                            elements,
                            hash_table,
                            matches!(mode, JoinMode::Left | JoinMode::Right),
                            &context,
                        ),
                    };
                    if pair_slots[partition].set(pair).is_err() {
                        panic!("partition {} probed twice", partition);
                    }
                })
            })
            .collect();
        for task in &probe_tasks {
            task.schedule(scheduler);
        }
        wait_for_tasks(&probe_tasks);
        drop(probe_tasks);

        let probe_container = Arc::try_unwrap(probe_container)
            .unwrap_or_else(|_| panic!("probe container still shared after the probe barrier"));
        let pair_slots = Arc::try_unwrap(pair_slots)
            .unwrap_or_else(|_| panic!("probe results still shared after the probe barrier"));
        let mut pairs: Vec<(PosList, PosList)> = pair_slots
            .into_iter()
            .map(|slot| slot.into_inner().expect("partition not probed"))
            .collect();

        // Probe rows with NULL keys: outer joins emit them paired with
        // NULL_ROW_ID, anti joins emit them as non-matching rows.
        let null_rows = probe_container.null_rows;
        if !null_rows.is_empty() {
            match self.mode {
                JoinMode::Left | JoinMode::Right => {
                    pairs.push((vec![NULL_ROW_ID; null_rows.len()], null_rows));
                }
                JoinMode::Anti => pairs.push((PosList::new(), null_rows)),
                _ => {}
            }
        }
        debug!("hash join probed in {:?}", probe_timer.elapsed());

        // Restore the observable (left, right) column order.
        let oriented: Vec<(PosList, PosList)> = pairs
            .into_iter()
            .map(|(build_rows, probe_rows)| {
                if inputs_swapped {
                    (probe_rows, build_rows)
                } else {
                    (build_rows, probe_rows)
                }
            })
            .collect();

        build_output_table(&self.left, &self.right, self.mode, oriented)
    }
}
