use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use granite_scheduler::Task;

use crate::join::key::JoinKey;
use crate::join::materialize::{ChunkSlots, MaterializedValue};
use crate::join::radix::{PartitionPhase, PlanHolder};

/// Number of clusters for the sort-merge join.
///
/// Sized so one cluster's materialized values fit the L2 cache: the count
/// grows linearly with the larger input up to 16 clusters, then by the
/// square root of the excess (each cluster becomes an output chunk, and too
/// many small chunks burden downstream operators). Rounded to the nearest
/// power of two, minimum 1.
pub(crate) fn determine_cluster_count<T>(l2_cache_bytes: usize, row_count_max: usize) -> usize {
    const LINEAR_GROWTH_UPPER_BOUND: usize = 16;

    let values_per_cluster =
        (l2_cache_bytes / std::mem::size_of::<MaterializedValue<T>>()).max(1);
    let goal = row_count_max / values_per_cluster;

    let capped = goal.min(LINEAR_GROWTH_UPPER_BOUND)
        + ((goal.saturating_sub(LINEAR_GROWTH_UPPER_BOUND)) as f64).sqrt() as usize;

    if capped <= 1 {
        1
    } else {
        1usize << ((capped as f64).log2().round() as u32)
    }
}

/// Task computing the shared range-partition split values for ordering
/// predicates.
///
/// Samples the materialized values of both sides (so cluster *p* on the
/// left overlaps cluster *p* on the right), sorts the samples and picks
/// evenly spaced split points. Duplicate splits are dropped; if no usable
/// splits remain the clusterer degenerates to a single, globally sorted
/// cluster.
pub(crate) fn create_split_task<T: JoinKey>(
    left_slots: &ChunkSlots<T>,
    right_slots: &ChunkSlots<T>,
    cluster_count: usize,
    splits: &Arc<OnceLock<Vec<T>>>,
    predecessors: &[Arc<Task>],
) -> Arc<Task> {
    const SAMPLES_PER_CLUSTER: usize = 16;

    let left_slots = left_slots.clone();
    let right_slots = right_slots.clone();
    let splits = splits.clone();
    let task = Task::new("compute range split values", move || {
        let mut samples: Vec<T> = Vec::new();
        for slots in [&left_slots, &right_slots] {
            for slot in slots.iter() {
                let guard = slot.lock();
                let output = guard.as_ref().expect("chunk not materialized");
                if output.elements.is_empty() {
                    continue;
                }
                let step =
                    (output.elements.len() / (cluster_count * SAMPLES_PER_CLUSTER)).max(1);
                samples.extend(
                    output.elements.iter().step_by(step).map(|element| element.value.clone()),
                );
            }
        }
        samples.sort_by(|a, b| a.total_cmp(b));

        let mut split_values: Vec<T> = Vec::with_capacity(cluster_count.saturating_sub(1));
        for cluster in 1..cluster_count {
            if samples.is_empty() {
                break;
            }
            let candidate = samples[cluster * samples.len() / cluster_count].clone();
            if split_values
                .last()
                .is_some_and(|last| last.total_cmp(&candidate) != Ordering::Less)
            {
                continue;
            }
            split_values.push(candidate);
        }

        if splits.set(split_values).is_err() {
            panic!("range split values computed twice");
        }
    });
    for predecessor in predecessors {
        predecessor.set_as_predecessor_of(&task);
    }
    task
}

/// One sort task per cluster, ordering the cluster's values ascending.
///
/// Tasks for clusters beyond the resolved count (degenerate range splits)
/// are no-ops. The sort is stable, so equal values keep their row order.
pub(crate) fn create_sort_tasks<T: JoinKey>(
    phase: &PartitionPhase<T>,
    requested_cluster_count: usize,
    side: &'static str,
) -> Vec<Arc<Task>> {
    let barrier = phase.barrier_tasks();
    (0..requested_cluster_count)
        .map(|cluster| {
            let plan: PlanHolder<T> = phase.plan();
            let task = Task::new(format!("sort {} cluster {}", side, cluster), move || {
                let plan = plan.get().expect("clusters not ready");
                if cluster >= plan.partition_count() {
                    return;
                }
                // Safety: runs after the scatter barrier; each cluster is
                // sorted by exactly one task.
                let values = unsafe { plan.partition_slice_mut(cluster) };
                values.sort_by(|a, b| a.value.total_cmp(&b.value));
            });
            for barrier_task in &barrier {
                barrier_task.set_as_predecessor_of(&task);
            }
            task
        })
        .collect()
}
