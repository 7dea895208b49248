//! Sort-merge join.
//!
//! Both inputs are materialized and clustered: by the shared hash for
//! equality predicates (matching keys co-locate), by shared range splits
//! for ordering predicates (cluster *p* on the left overlaps cluster *p* on
//! the right, and clusters are globally ordered). Each cluster is sorted by
//! value, then merged with twin cursors over *runs* — maximal subsequences
//! of equal values. Unmatched-row tails for outer joins with ordering
//! predicates are swept after the merge from the sides' min/max boundaries.

pub(crate) mod cluster;

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use granite_scheduler::{wait_for_tasks, Scheduler, Task};
use granite_storage::{ColumnId, PosList, RowId, Table, NULL_ROW_ID};
use log::debug;

use crate::config::JoinConfig;
use crate::join::key::JoinKey;
use crate::join::materialize::{create_materialize_tasks, key_at, new_chunk_slots, MaterializedValue};
use crate::join::output::build_output_table;
use crate::join::radix::{create_partition_tasks, PartitionSpec, RadixContainer};
use crate::join::sort_merge::cluster::{
    create_sort_tasks, create_split_task, determine_cluster_count,
};
use crate::join::{
    validate_join_columns, with_join_key_type, JoinMode, PredicateCondition,
};
use crate::ExecutorError;

/// Sort-merge join operator. Supports equality and ordering predicates;
/// `!=` only for inner joins, semi/anti only with equality.
pub struct SortMergeJoin {
    left: Arc<Table>,
    right: Arc<Table>,
    mode: JoinMode,
    column_ids: (ColumnId, ColumnId),
    condition: PredicateCondition,
    config: JoinConfig,
}

impl SortMergeJoin {
    pub fn new(
        left: Arc<Table>,
        right: Arc<Table>,
        mode: JoinMode,
        column_ids: (ColumnId, ColumnId),
        condition: PredicateCondition,
    ) -> Result<SortMergeJoin, ExecutorError> {
        if mode == JoinMode::Cross {
            return Err(ExecutorError::UnsupportedJoinMode { operator: "sort-merge join", mode });
        }
        if matches!(mode, JoinMode::Semi | JoinMode::Anti)
            && condition != PredicateCondition::Equals
        {
            return Err(ExecutorError::UnsupportedPredicate {
                operator: "sort-merge join",
                condition,
                mode,
            });
        }
        if condition == PredicateCondition::NotEquals && mode != JoinMode::Inner {
            return Err(ExecutorError::UnsupportedPredicate {
                operator: "sort-merge join",
                condition,
                mode,
            });
        }
        validate_join_columns(&left, &right, column_ids)?;

        Ok(SortMergeJoin { left, right, mode, column_ids, condition, config: JoinConfig::default() })
    }

    pub fn with_config(mut self, config: JoinConfig) -> SortMergeJoin {
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
        let include_null_left = matches!(self.mode, JoinMode::Left | JoinMode::Outer);
        let include_null_right = matches!(self.mode, JoinMode::Right | JoinMode::Outer);
        let keep_nulls_left = include_null_left || self.mode == JoinMode::Anti;
        let equi = self.condition == PredicateCondition::Equals;

        let row_count_max = self.left.row_count().max(self.right.row_count());
        let cluster_count = self
            .config
            .cluster_count
            .unwrap_or_else(|| determine_cluster_count::<T>(self.config.l2_cache_bytes, row_count_max))
            .next_power_of_two();

        let cluster_timer = Instant::now();

        // Phase 1: materialize, cluster and sort both sides as one task
        // graph behind a single barrier.
        let left_slots = new_chunk_slots::<T>(self.left.chunk_count());
        let right_slots = new_chunk_slots::<T>(self.right.chunk_count());

        let radix_bits = cluster_count.trailing_zeros();
        let left_materialize = create_materialize_tasks::<T>(
            &self.left,
            self.column_ids.0,
            keep_nulls_left,
            equi.then_some(radix_bits),
            &left_slots,
            "left",
        );
        let right_materialize = create_materialize_tasks::<T>(
            &self.right,
            self.column_ids.1,
            include_null_right,
            equi.then_some(radix_bits),
            &right_slots,
            "right",
        );

        let mut split_task = None;
        let (left_spec, right_spec) = if equi {
            (PartitionSpec::Radix { radix_bits }, PartitionSpec::Radix { radix_bits })
        } else {
            // Ordering predicates need range clusters with split values
            // shared by both sides so cluster boundaries line up.
            let splits: Arc<OnceLock<Vec<T>>> = Arc::new(OnceLock::new());
            let mut predecessors = left_materialize.clone();
            predecessors.extend(right_materialize.iter().cloned());
            split_task = Some(create_split_task(
                &left_slots,
                &right_slots,
                cluster_count,
                &splits,
                &predecessors,
            ));
            (
                PartitionSpec::Range { cluster_count, splits: splits.clone() },
                PartitionSpec::Range { cluster_count, splits },
            )
        };

        let mut left_predecessors = left_materialize.clone();
        let mut right_predecessors = right_materialize.clone();
        if let Some(split_task) = &split_task {
            left_predecessors.push(split_task.clone());
            right_predecessors.push(split_task.clone());
        }
        let left_phase =
            create_partition_tasks::<T>(left_slots, left_spec, &left_predecessors, "left");
        let right_phase =
            create_partition_tasks::<T>(right_slots, right_spec, &right_predecessors, "right");

        let left_sort = create_sort_tasks::<T>(&left_phase, cluster_count, "left");
        let right_sort = create_sort_tasks::<T>(&right_phase, cluster_count, "right");

        let mut first_phase: Vec<Arc<Task>> = Vec::new();
        first_phase.extend(left_materialize);
        first_phase.extend(right_materialize);
        first_phase.extend(split_task);
        first_phase.extend(left_phase.all_tasks());
        first_phase.extend(right_phase.all_tasks());
        first_phase.extend(left_sort);
        first_phase.extend(right_sort);
        for task in &first_phase {
            task.schedule(scheduler);
        }
        wait_for_tasks(&first_phase);
        drop(first_phase);

        let left_clusters = Arc::new(left_phase.into_container());
        let right_clusters = Arc::new(right_phase.into_container());
        assert_eq!(
            left_clusters.partition_count(),
            right_clusters.partition_count(),
            "cluster count mismatch between join sides"
        );
        let resolved_clusters = left_clusters.partition_count();
        debug!(
            "sort-merge join clustered both sides into {} clusters in {:?}",
            resolved_clusters,
            cluster_timer.elapsed()
        );

        // Phase 2: merge each cluster.
        let merge_timer = Instant::now();
        let context = Arc::new(MergeContext {
            left: left_clusters.clone(),
            right: right_clusters.clone(),
            mode: self.mode,
            condition: self.condition,
            left_table: self.left.clone(),
            left_column: self.column_ids.0,
            end_left: end_of_table(&left_clusters),
            end_right: end_of_table(&right_clusters),
        });
        let pair_slots: Arc<Vec<OnceLock<(PosList, PosList)>>> =
            Arc::new((0..resolved_clusters).map(|_| OnceLock::new()).collect());

        let mut merge_tasks = Vec::with_capacity(resolved_clusters);
        for cluster in 0..resolved_clusters {
            // Empty clusters cannot produce inner or semi matches; anti and
            // outer modes still emit their unmatched rows.
            if matches!(self.mode, JoinMode::Inner | JoinMode::Semi)
                && equi
                && (left_clusters.partition(cluster).is_empty()
                    || right_clusters.partition(cluster).is_empty())
            {
                let _ = pair_slots[cluster].set((PosList::new(), PosList::new()));
                continue;
            }
            let context = context.clone();
            let pair_slots = pair_slots.clone();
            let task = Task::new(format!("merge cluster {}", cluster), move || {
                let pair = context.join_cluster(cluster);
                if pair_slots[cluster].set(pair).is_err() {
                    panic!("cluster {} merged twice", cluster);
                }
            });
            merge_tasks.push(task);
        }
        for task in &merge_tasks {
            task.schedule(scheduler);
        }
        wait_for_tasks(&merge_tasks);
        drop(merge_tasks);
        drop(context);

        let pair_slots = Arc::try_unwrap(pair_slots)
            .unwrap_or_else(|_| panic!("merge results still shared after the merge barrier"));
        let mut pairs: Vec<(PosList, PosList)> = pair_slots
            .into_iter()
            .map(|slot| slot.into_inner().expect("cluster not merged"))
            .collect();

        // Outer-join tails for ordering predicates: rows of the preserved
        // side provably outside the other side's value range. The equality
        // case emits its tails inside the merge loop.
        if !equi {
            if include_null_left {
                for row_id in left_outer_tail_rows(&left_clusters, &right_clusters, self.condition)
                {
                    pairs[0].0.push(row_id);
                    pairs[0].1.push(NULL_ROW_ID);
                }
            }
            if include_null_right {
                for row_id in right_outer_tail_rows(&left_clusters, &right_clusters, self.condition)
                {
                    pairs[0].0.push(NULL_ROW_ID);
                    pairs[0].1.push(row_id);
                }
            }
        }
        debug!("sort-merge join merged in {:?}", merge_timer.elapsed());

        // Rows with NULL join keys, preserved by outer modes (and by anti,
        // where a NULL key can never match).
        let mut null_pair = (PosList::new(), PosList::new());
        if self.mode == JoinMode::Anti {
            null_pair.0.extend(left_clusters.null_rows.iter().copied());
        } else if include_null_left {
            for &row_id in &left_clusters.null_rows {
                null_pair.0.push(row_id);
                null_pair.1.push(NULL_ROW_ID);
            }
        }
        if include_null_right {
            for &row_id in &right_clusters.null_rows {
                null_pair.0.push(NULL_ROW_ID);
                null_pair.1.push(row_id);
            }
        }
        if !null_pair.0.is_empty() || !null_pair.1.is_empty() {
            pairs.push(null_pair);
        }

        build_output_table(&self.left, &self.right, self.mode, pairs)
    }
}

/// Result of comparing the head values of two runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareResult {
    Less,
    Equal,
    Greater,
}

/// A position in a clustered, sorted side: cluster plus index therein
#[derive(Debug, Clone, Copy)]
struct TablePosition {
    cluster: usize,
    index: usize,
}

impl TablePosition {
    fn to(self, end: TablePosition) -> TableRange {
        TableRange { start: self, end }
    }
}

/// A range of rows on one sorted side, possibly spanning clusters
#[derive(Debug, Clone, Copy)]
struct TableRange {
    start: TablePosition,
    end: TablePosition,
}

impl TableRange {
    fn new(cluster: usize, start_index: usize, end_index: usize) -> TableRange {
        TableRange {
            start: TablePosition { cluster, index: start_index },
            end: TablePosition { cluster, index: end_index },
        }
    }

    fn for_every_row_id<T>(&self, container: &RadixContainer<T>, mut action: impl FnMut(RowId)) {
        for cluster in self.start.cluster..=self.end.cluster {
            let elements = container.partition(cluster);
            let start = if cluster == self.start.cluster { self.start.index } else { 0 };
            let end = if cluster == self.end.cluster { self.end.index } else { elements.len() };
            for element in &elements[start..end] {
                action(element.row_id);
            }
        }
    }
}

fn end_of_table<T>(container: &RadixContainer<T>) -> TablePosition {
    let last = container.partition_count() - 1;
    TablePosition { cluster: last, index: container.partition(last).len() }
}

/// Length of the run (maximal subsequence of one value) starting at
/// `start` in a sorted cluster
fn run_length<T: JoinKey>(cluster: &[MaterializedValue<T>], start: usize) -> usize {
    if start >= cluster.len() {
        return 0;
    }
    let value = &cluster[start].value;
    cluster[start..].partition_point(|element| element.value.total_cmp(value) != Ordering::Greater)
}

/// Shared state of the per-cluster merge tasks
struct MergeContext<T: JoinKey> {
    left: Arc<RadixContainer<T>>,
    right: Arc<RadixContainer<T>>,
    mode: JoinMode,
    condition: PredicateCondition,
    left_table: Arc<Table>,
    left_column: ColumnId,
    end_left: TablePosition,
    end_right: TablePosition,
}

impl<T: JoinKey> MergeContext<T> {
    /// Merge one cluster with twin run-cursors. Each iteration compares the
    /// head values of the current runs, emits per the predicate dispatch
    /// table, then advances the lower-valued run (both on equality).
    fn join_cluster(&self, cluster: usize) -> (PosList, PosList) {
        let mut output = (PosList::new(), PosList::new());
        let left_cluster = self.left.partition(cluster);
        let right_cluster = self.right.partition(cluster);
        let left_size = left_cluster.len();
        let right_size = right_cluster.len();

        let mut left_run_start = 0;
        let mut right_run_start = 0;
        let mut left_run_end = run_length(left_cluster, 0);
        let mut right_run_end = run_length(right_cluster, 0);

        while left_run_start < left_size && right_run_start < right_size {
            let left_value = &left_cluster[left_run_start].value;
            let right_value = &right_cluster[right_run_start].value;
            let compare_result = match left_value.total_cmp(right_value) {
                Ordering::Less => CompareResult::Less,
                Ordering::Equal => CompareResult::Equal,
                Ordering::Greater => CompareResult::Greater,
            };

            let left_run = TableRange::new(cluster, left_run_start, left_run_end);
            let right_run = TableRange::new(cluster, right_run_start, right_run_end);
            self.join_runs(left_run, right_run, compare_result, &mut output);

            if compare_result != CompareResult::Greater {
                left_run_start = left_run_end;
                left_run_end = left_run_start + run_length(left_cluster, left_run_start);
            }
            if compare_result != CompareResult::Less {
                right_run_start = right_run_end;
                right_run_end = right_run_start + run_length(right_cluster, right_run_start);
            }
        }

        // Sweep the unfinished side; relevant for outer joins and ordering
        // predicates.
        let left_rest = TableRange::new(cluster, left_run_start, left_size);
        let right_rest = TableRange::new(cluster, right_run_start, right_size);
        if left_run_start < left_size {
            self.join_runs(left_rest, right_rest, CompareResult::Less, &mut output);
        } else if right_run_start < right_size {
            self.join_runs(left_rest, right_rest, CompareResult::Greater, &mut output);
        }

        // Anti join: the merge produced semi matches; keep the cluster rows
        // that are not among them.
        if self.mode == JoinMode::Anti {
            output.0 = self.remove_matches(left_cluster, &output.0);
        }

        output
    }

    /// Emission dispatch by predicate × run comparison
    fn join_runs(
        &self,
        left_run: TableRange,
        right_run: TableRange,
        compare_result: CompareResult,
        output: &mut (PosList, PosList),
    ) {
        match self.condition {
            PredicateCondition::Equals => match compare_result {
                CompareResult::Equal => self.emit_all_combinations(output, left_run, right_run),
                CompareResult::Less => {
                    if matches!(self.mode, JoinMode::Left | JoinMode::Outer) {
                        self.emit_right_null_combinations(output, left_run);
                    }
                }
                CompareResult::Greater => {
                    if matches!(self.mode, JoinMode::Right | JoinMode::Outer) {
                        self.emit_left_null_combinations(output, right_run);
                    }
                }
            },
            PredicateCondition::NotEquals => match compare_result {
                CompareResult::Greater => {
                    self.emit_all_combinations(output, left_run.start.to(self.end_left), right_run);
                }
                CompareResult::Equal => {
                    self.emit_all_combinations(output, left_run.end.to(self.end_left), right_run);
                    self.emit_all_combinations(output, left_run, right_run.end.to(self.end_right));
                }
                CompareResult::Less => {
                    self.emit_all_combinations(output, left_run, right_run.start.to(self.end_right));
                }
            },
            PredicateCondition::GreaterThan => match compare_result {
                CompareResult::Greater => {
                    self.emit_all_combinations(output, left_run.start.to(self.end_left), right_run);
                }
                CompareResult::Equal => {
                    self.emit_all_combinations(output, left_run.end.to(self.end_left), right_run);
                }
                CompareResult::Less => {}
            },
            PredicateCondition::GreaterThanEquals => {
                if compare_result != CompareResult::Less {
                    self.emit_all_combinations(output, left_run.start.to(self.end_left), right_run);
                }
            }
            PredicateCondition::LessThan => match compare_result {
                CompareResult::Less => {
                    self.emit_all_combinations(output, left_run, right_run.start.to(self.end_right));
                }
                CompareResult::Equal => {
                    self.emit_all_combinations(output, left_run, right_run.end.to(self.end_right));
                }
                CompareResult::Greater => {}
            },
            PredicateCondition::LessThanEquals => {
                if compare_result != CompareResult::Greater {
                    self.emit_all_combinations(output, left_run, right_run.start.to(self.end_right));
                }
            }
        }
    }

    /// Cross product of the two ranges; semi and anti restrict emission to
    /// the left pos list (one entry per left row).
    fn emit_all_combinations(
        &self,
        output: &mut (PosList, PosList),
        left_range: TableRange,
        right_range: TableRange,
    ) {
        if matches!(self.mode, JoinMode::Semi | JoinMode::Anti) {
            left_range.for_every_row_id(&self.left, |left_row| output.0.push(left_row));
            return;
        }
        left_range.for_every_row_id(&self.left, |left_row| {
            right_range.for_every_row_id(&self.right, |right_row| {
                output.0.push(left_row);
                output.1.push(right_row);
            });
        });
    }

    /// Left rows paired with NULL on the right
    fn emit_right_null_combinations(&self, output: &mut (PosList, PosList), left_range: TableRange) {
        left_range.for_every_row_id(&self.left, |left_row| {
            output.0.push(left_row);
            output.1.push(NULL_ROW_ID);
        });
    }

    /// Right rows paired with NULL on the left
    fn emit_left_null_combinations(&self, output: &mut (PosList, PosList), right_range: TableRange) {
        right_range.for_every_row_id(&self.right, |right_row| {
            output.0.push(NULL_ROW_ID);
            output.1.push(right_row);
        });
    }

    /// Anti-merge: walk the sorted cluster and the sorted semi matches in
    /// lockstep, keeping rows without a match. Match values are re-read
    /// from the left input column since matches carry row ids, not values.
    fn remove_matches(&self, cluster: &[MaterializedValue<T>], matches: &PosList) -> PosList {
        if matches.is_empty() {
            return cluster.iter().map(|element| element.row_id).collect();
        }

        let mut result = PosList::with_capacity(cluster.len().saturating_sub(matches.len()));
        let mut match_index = 0;
        let mut input_index = 0;
        while input_index < cluster.len() {
            let input_value = &cluster[input_index].value;
            let match_value: T = key_at(&self.left_table, matches[match_index], self.left_column)
                .expect("semi matches never reference NULL keys");

            match input_value.total_cmp(&match_value) {
                Ordering::Equal => {
                    input_index += 1;
                    match_index += 1;
                    if match_index == matches.len() {
                        result.extend(cluster[input_index..].iter().map(|element| element.row_id));
                        break;
                    }
                }
                Ordering::Less => {
                    result.push(cluster[input_index].row_id);
                    input_index += 1;
                }
                Ordering::Greater => {
                    // Both walks are sorted; a larger input value means the
                    // remaining matches are exhausted for this cluster.
                    result.extend(cluster[input_index..].iter().map(|element| element.row_id));
                    break;
                }
            }
        }
        result
    }
}

fn container_min<T: JoinKey>(container: &RadixContainer<T>) -> Option<&T> {
    (0..container.partition_count())
        .find_map(|cluster| container.partition(cluster).first())
        .map(|element| &element.value)
}

fn container_max<T: JoinKey>(container: &RadixContainer<T>) -> Option<&T> {
    (0..container.partition_count())
        .rev()
        .find_map(|cluster| container.partition(cluster).last())
        .map(|element| &element.value)
}

/// First position whose value satisfies a monotone threshold predicate
fn first_position<T: JoinKey>(
    container: &RadixContainer<T>,
    satisfies: impl Fn(&T) -> bool,
) -> Option<TablePosition> {
    for cluster in 0..container.partition_count() {
        let elements = container.partition(cluster);
        if elements.last().map_or(true, |element| !satisfies(&element.value)) {
            continue;
        }
        let index = elements.partition_point(|element| !satisfies(&element.value));
        return Some(TablePosition { cluster, index });
    }
    None
}

fn collect_range<T: JoinKey>(container: &RadixContainer<T>, range: TableRange) -> Vec<RowId> {
    let mut rows = Vec::new();
    range.for_every_row_id(container, |row_id| rows.push(row_id));
    rows
}

/// Left rows provably without a join partner under an ordering predicate:
/// for `<` those at or above the right maximum, for `>` those at or below
/// the right minimum (and the closed variants accordingly). An empty right
/// side leaves every left row unmatched.
fn left_outer_tail_rows<T: JoinKey>(
    left: &RadixContainer<T>,
    right: &RadixContainer<T>,
    condition: PredicateCondition,
) -> Vec<RowId> {
    let begin = TablePosition { cluster: 0, index: 0 };
    let end = end_of_table(left);

    let range = match condition {
        PredicateCondition::LessThan | PredicateCondition::LessThanEquals => {
            let Some(right_max) = container_max(right) else {
                return collect_range(left, begin.to(end));
            };
            let unmatched_from = if condition == PredicateCondition::LessThan {
                first_position(left, |value| value.total_cmp(right_max) != Ordering::Less)
            } else {
                first_position(left, |value| value.total_cmp(right_max) == Ordering::Greater)
            };
            match unmatched_from {
                Some(from) => from.to(end),
                None => return Vec::new(),
            }
        }
        PredicateCondition::GreaterThan | PredicateCondition::GreaterThanEquals => {
            let Some(right_min) = container_min(right) else {
                return collect_range(left, begin.to(end));
            };
            let matched_from = if condition == PredicateCondition::GreaterThan {
                first_position(left, |value| value.total_cmp(right_min) == Ordering::Greater)
            } else {
                first_position(left, |value| value.total_cmp(right_min) != Ordering::Less)
            };
            begin.to(matched_from.unwrap_or(end))
        }
        PredicateCondition::Equals | PredicateCondition::NotEquals => {
            unreachable!("equality outer tails are emitted by the merge loop")
        }
    };
    collect_range(left, range)
}

/// Right rows provably without a join partner; mirror of
/// `left_outer_tail_rows`.
fn right_outer_tail_rows<T: JoinKey>(
    left: &RadixContainer<T>,
    right: &RadixContainer<T>,
    condition: PredicateCondition,
) -> Vec<RowId> {
    let begin = TablePosition { cluster: 0, index: 0 };
    let end = end_of_table(right);

    let range = match condition {
        PredicateCondition::LessThan | PredicateCondition::LessThanEquals => {
            let Some(left_min) = container_min(left) else {
                return collect_range(right, begin.to(end));
            };
            let matched_from = if condition == PredicateCondition::LessThan {
                first_position(right, |value| value.total_cmp(left_min) == Ordering::Greater)
            } else {
                first_position(right, |value| value.total_cmp(left_min) != Ordering::Less)
            };
            begin.to(matched_from.unwrap_or(end))
        }
        PredicateCondition::GreaterThan | PredicateCondition::GreaterThanEquals => {
            let Some(left_max) = container_max(left) else {
                return collect_range(right, begin.to(end));
            };
            let unmatched_from = if condition == PredicateCondition::GreaterThan {
                first_position(right, |value| value.total_cmp(left_max) != Ordering::Less)
            } else {
                first_position(right, |value| value.total_cmp(left_max) == Ordering::Greater)
            };
            match unmatched_from {
                Some(from) => from.to(end),
                None => return Vec::new(),
            }
        }
        PredicateCondition::Equals | PredicateCondition::NotEquals => {
            unreachable!("equality outer tails are emitted by the merge loop")
        }
    };
    collect_range(right, range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(clusters: Vec<Vec<i32>>) -> RadixContainer<i32> {
        let mut elements = Vec::new();
        let mut partition_offsets = vec![0];
        for (cluster, values) in clusters.iter().enumerate() {
            for (index, &value) in values.iter().enumerate() {
                elements.push(MaterializedValue {
                    value,
                    row_id: RowId::new(cluster as u32, index as u32),
                });
            }
            partition_offsets.push(elements.len());
        }
        RadixContainer { elements, partition_offsets, null_rows: Vec::new() }
    }

    #[test]
    fn test_run_length() {
        let cluster = container(vec![vec![1, 2, 2, 2, 5]]);
        let elements = cluster.partition(0);
        assert_eq!(run_length(elements, 0), 1);
        assert_eq!(run_length(elements, 1), 3);
        assert_eq!(run_length(elements, 4), 1);
        assert_eq!(run_length(elements, 5), 0);
    }

    #[test]
    fn test_range_spans_clusters() {
        let clusters = container(vec![vec![1, 2], vec![], vec![3]]);
        let range = TablePosition { cluster: 0, index: 1 }.to(end_of_table(&clusters));
        let rows = collect_range(&clusters, range);
        assert_eq!(rows, vec![RowId::new(0, 1), RowId::new(2, 0)]);
    }

    #[test]
    fn test_min_max_skip_empty_clusters() {
        let clusters = container(vec![vec![], vec![4, 7], vec![]]);
        assert_eq!(container_min(&clusters), Some(&4));
        assert_eq!(container_max(&clusters), Some(&7));
        assert_eq!(container_min(&container(vec![vec![]])), None);
    }

    #[test]
    fn test_left_tail_rows_less_than() {
        // l < r: left rows >= max(right) are unmatched.
        let left = container(vec![vec![1, 5, 8, 9]]);
        let right = container(vec![vec![2, 8]]);
        let rows = left_outer_tail_rows(&left, &right, PredicateCondition::LessThan);
        assert_eq!(rows, vec![RowId::new(0, 2), RowId::new(0, 3)]);
    }

    #[test]
    fn test_right_tail_rows_greater_equals() {
        // l >= r: right rows > max(left) are unmatched.
        let left = container(vec![vec![5]]);
        let right = container(vec![vec![1, 5, 9]]);
        let rows = right_outer_tail_rows(&left, &right, PredicateCondition::GreaterThanEquals);
        assert_eq!(rows, vec![RowId::new(0, 2)]);
    }

    #[test]
    fn test_tails_with_empty_other_side() {
        let left = container(vec![vec![1, 2]]);
        let right = container(vec![vec![]]);
        let rows = left_outer_tail_rows(&left, &right, PredicateCondition::GreaterThan);
        assert_eq!(rows.len(), 2);
    }
}
