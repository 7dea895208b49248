use std::cell::UnsafeCell;
use std::cmp::Ordering;
use std::mem::MaybeUninit;
use std::sync::{Arc, OnceLock};

use granite_scheduler::Task;
use granite_storage::RowId;
use parking_lot::Mutex;

use crate::join::key::JoinKey;
use crate::join::materialize::{ChunkOutput, ChunkSlots, MaterializedValue};

/// Partitioned materialized records: a flat element vector delimited by
/// `partition_offsets[P + 1]`, plus the NULL-key side list.
///
/// With `radix_bits = 0` (or a degenerate range split) the container is a
/// single partition identical to the materialized output.
pub(crate) struct RadixContainer<T> {
    pub elements: Vec<MaterializedValue<T>>,
    pub partition_offsets: Vec<usize>,
    pub null_rows: Vec<RowId>,
}

impl<T> RadixContainer<T> {
    pub fn partition_count(&self) -> usize {
        self.partition_offsets.len() - 1
    }

    pub fn partition(&self, partition: usize) -> &[MaterializedValue<T>] {
        &self.elements[self.partition_offsets[partition]..self.partition_offsets[partition + 1]]
    }
}

/// How the partition setup derives the partition function
pub(crate) enum PartitionSpec<T> {
    /// Address partitions by the low hash bits; histograms were computed
    /// during materialization.
    Radix { radix_bits: u32 },
    /// Range-partition by split values computed from samples of both sides
    /// (sort-merge with ordering predicates). Degenerate splits collapse to
    /// a single, globally sorted partition.
    Range { cluster_count: usize, splits: Arc<OnceLock<Vec<T>>> },
}

impl<T> PartitionSpec<T> {
    fn requested_partition_count(&self) -> usize {
        match self {
            PartitionSpec::Radix { radix_bits } => 1usize << radix_bits,
            PartitionSpec::Range { cluster_count, .. } => *cluster_count,
        }
    }
}

/// Scatter destination shared by the partition tasks.
///
/// Safety: the (chunk × partition) cursor ranges computed by the setup task
/// tile the buffer, so every cell is written by exactly one scatter task;
/// readers run strictly after all writers (task dependencies).
struct ScatterBuffer<T> {
    cells: Box<[UnsafeCell<MaybeUninit<MaterializedValue<T>>>]>,
}

unsafe impl<T: Send> Send for ScatterBuffer<T> {}
unsafe impl<T: Send> Sync for ScatterBuffer<T> {}

impl<T> ScatterBuffer<T> {
    fn with_len(len: usize) -> Self {
        let cells = (0..len).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect();
        ScatterBuffer { cells }
    }

    /// Safety: `index` must be claimed by exactly one writer, once.
    unsafe fn write(&self, index: usize, value: MaterializedValue<T>) {
        (*self.cells[index].get()).write(value);
    }

    /// Safety: the range must be fully written and all writers finished.
    unsafe fn slice(&self, start: usize, end: usize) -> &[MaterializedValue<T>] {
        std::slice::from_raw_parts(
            self.cells.as_ptr().add(start) as *const MaterializedValue<T>,
            end - start,
        )
    }

    /// Safety: as `slice`, plus no concurrent access to the range.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slice_mut(&self, start: usize, end: usize) -> &mut [MaterializedValue<T>] {
        std::slice::from_raw_parts_mut(
            self.cells.as_ptr().add(start) as *mut MaterializedValue<T>,
            end - start,
        )
    }

    /// Safety: every cell must have been written.
    unsafe fn into_elements(self) -> Vec<MaterializedValue<T>> {
        // UnsafeCell<MaybeUninit<V>> has the layout of V, and a fully
        // initialized buffer is a valid Vec<V>.
        let raw = Box::into_raw(self.cells) as *mut [MaterializedValue<T>];
        Box::from_raw(raw).into_vec()
    }
}

/// Per-chunk scatter input: the chunk's materialized elements and its write
/// cursor per partition.
struct ScatterChunk<T> {
    elements: Vec<MaterializedValue<T>>,
    cursors: Vec<usize>,
}

/// Shared state of one side's partition step, produced by the setup task
/// and consumed by the scatter tasks, downstream build/sort tasks, and
/// finally the driver.
pub(crate) struct ScatterPlan<T> {
    buffer: ScatterBuffer<T>,
    partition_offsets: Vec<usize>,
    partition_of: Box<dyn Fn(&T) -> usize + Send + Sync>,
    chunks: Vec<Mutex<Option<ScatterChunk<T>>>>,
    null_rows: Vec<RowId>,
}

pub(crate) type PlanHolder<T> = Arc<OnceLock<Arc<ScatterPlan<T>>>>;

impl<T> ScatterPlan<T> {
    pub fn partition_count(&self) -> usize {
        self.partition_offsets.len() - 1
    }

    /// Safety: callers must run strictly after every scatter task of this
    /// plan (enforced through task dependencies).
    pub(crate) unsafe fn partition_slice(&self, partition: usize) -> &[MaterializedValue<T>] {
        if partition >= self.partition_count() {
            return &[];
        }
        self.buffer
            .slice(self.partition_offsets[partition], self.partition_offsets[partition + 1])
    }

    /// Safety: as `partition_slice`, plus each partition may be borrowed
    /// mutably by at most one task.
    pub(crate) unsafe fn partition_slice_mut(
        &self,
        partition: usize,
    ) -> &mut [MaterializedValue<T>] {
        debug_assert!(partition < self.partition_count());
        self.buffer
            .slice_mut(self.partition_offsets[partition], self.partition_offsets[partition + 1])
    }

    /// Move one chunk's elements into their partitions' buffer regions
    fn scatter_chunk(&self, chunk_id: usize) {
        let Some(ScatterChunk { elements, mut cursors }) = self.chunks[chunk_id].lock().take()
        else {
            return;
        };
        for element in elements {
            let partition = (self.partition_of)(&element.value);
            let index = cursors[partition];
            cursors[partition] += 1;
            // Safety: cursor ranges are disjoint per (chunk, partition).
            unsafe { self.buffer.write(index, element) };
        }
    }
}

/// Tasks of one side's partition step: a setup task (prefix sums, buffer
/// allocation, partition function resolution) depending on the materialize
/// tasks, and per-chunk scatter tasks depending on the setup task.
pub(crate) struct PartitionPhase<T: JoinKey> {
    holder: PlanHolder<T>,
    pub setup_task: Arc<Task>,
    pub scatter_tasks: Vec<Arc<Task>>,
}

impl<T: JoinKey> PartitionPhase<T> {
    pub fn plan(&self) -> PlanHolder<T> {
        self.holder.clone()
    }

    /// The tasks downstream consumers must declare as predecessors
    pub fn barrier_tasks(&self) -> Vec<Arc<Task>> {
        let mut tasks = vec![self.setup_task.clone()];
        tasks.extend(self.scatter_tasks.iter().cloned());
        tasks
    }

    pub fn all_tasks(&self) -> Vec<Arc<Task>> {
        self.barrier_tasks()
    }

    /// Recover the partitioned container once every task of the phase (and
    /// every downstream holder of the plan) has finished.
    pub fn into_container(self) -> RadixContainer<T> {
        drop(self.setup_task);
        drop(self.scatter_tasks);
        let holder =
            Arc::try_unwrap(self.holder).unwrap_or_else(|_| panic!("partition plan still shared"));
        let plan = holder.into_inner().expect("partition setup task did not run");
        let plan =
            Arc::try_unwrap(plan).unwrap_or_else(|_| panic!("partition plan still shared"));
        let ScatterPlan { buffer, partition_offsets, null_rows, .. } = plan;
        // Safety: the barrier guarantees all scatter tasks wrote their
        // ranges, which tile the buffer.
        let elements = unsafe { buffer.into_elements() };
        RadixContainer { elements, partition_offsets, null_rows }
    }
}

/// Build the partition step for one side.
///
/// The setup task consumes the materialized chunk outputs, derives the
/// final partition count and function, computes exact write offsets from
/// the histograms (count → prefix sum), and allocates the flat buffer. With
/// a single partition it performs the trivial scatter itself; otherwise the
/// per-chunk scatter tasks redistribute in parallel.
pub(crate) fn create_partition_tasks<T: JoinKey>(
    slots: ChunkSlots<T>,
    spec: PartitionSpec<T>,
    predecessors: &[Arc<Task>],
    side: &'static str,
) -> PartitionPhase<T> {
    let holder: PlanHolder<T> = Arc::new(OnceLock::new());
    let chunk_count = slots.len();
    let requested = spec.requested_partition_count();

    let setup_task = {
        let holder = holder.clone();
        Task::new(format!("partition {} setup", side), move || {
            let outputs: Vec<ChunkOutput<T>> = slots
                .iter()
                .map(|slot| slot.lock().take().expect("chunk not materialized"))
                .collect();
            let plan = build_scatter_plan(outputs, &spec);
            let run_inline_scatter = spec.requested_partition_count() == 1;
            let plan = Arc::new(plan);
            if holder.set(plan.clone()).is_err() {
                panic!("partition setup ran twice");
            }
            if run_inline_scatter {
                for chunk_id in 0..plan.chunks.len() {
                    plan.scatter_chunk(chunk_id);
                }
            }
        })
    };
    for predecessor in predecessors {
        predecessor.set_as_predecessor_of(&setup_task);
    }

    let scatter_tasks: Vec<Arc<Task>> = if requested > 1 {
        (0..chunk_count)
            .map(|chunk_id| {
                let holder = holder.clone();
                let task = Task::new(format!("partition {} chunk {}", side, chunk_id), move || {
                    let plan = holder.get().expect("partition plan not ready");
                    plan.scatter_chunk(chunk_id);
                });
                setup_task.set_as_predecessor_of(&task);
                task
            })
            .collect()
    } else {
        Vec::new()
    };

    PartitionPhase { holder, setup_task, scatter_tasks }
}

fn build_scatter_plan<T: JoinKey>(outputs: Vec<ChunkOutput<T>>, spec: &PartitionSpec<T>) -> ScatterPlan<T> {
    let mut null_rows = Vec::new();
    let mut chunk_elements = Vec::with_capacity(outputs.len());
    let mut histograms = Vec::with_capacity(outputs.len());

    // Resolve the partition function and per-chunk histograms.
    let (partition_count, partition_of): (usize, Box<dyn Fn(&T) -> usize + Send + Sync>) =
        match spec {
            PartitionSpec::Radix { radix_bits } => {
                let bits = *radix_bits;
                (1usize << bits, Box::new(move |value: &T| T::radix_partition(value.hashed(), bits)))
            }
            PartitionSpec::Range { splits, .. } => {
                let splits = splits.get().expect("range split values not computed").clone();
                if splits.is_empty() {
                    (1, Box::new(|_: &T| 0))
                } else {
                    let count = splits.len() + 1;
                    (
                        count,
                        Box::new(move |value: &T| {
                            splits.partition_point(|split| {
                                split.total_cmp(value) != Ordering::Greater
                            })
                        }),
                    )
                }
            }
        };

    for mut output in outputs {
        null_rows.append(&mut output.null_rows);
        let histogram = if output.histogram.len() == partition_count {
            output.histogram
        } else {
            // Materialization did not know the partition function; count now.
            let mut histogram = vec![0usize; partition_count];
            for element in &output.elements {
                histogram[partition_of(&element.value)] += 1;
            }
            histogram
        };
        histograms.push(histogram);
        chunk_elements.push(output.elements);
    }

    // Prefix-sum the partition sizes into boundaries and derive each
    // (chunk, partition) write cursor.
    let mut partition_offsets = vec![0usize; partition_count + 1];
    for histogram in &histograms {
        for (partition, count) in histogram.iter().enumerate() {
            partition_offsets[partition + 1] += count;
        }
    }
    for partition in 0..partition_count {
        partition_offsets[partition + 1] += partition_offsets[partition];
    }

    let mut next_write = partition_offsets[..partition_count].to_vec();
    let chunks = chunk_elements
        .into_iter()
        .zip(&histograms)
        .map(|(elements, histogram)| {
            let cursors = next_write.clone();
            for (partition, count) in histogram.iter().enumerate() {
                next_write[partition] += count;
            }
            Mutex::new(Some(ScatterChunk { elements, cursors }))
        })
        .collect();

    let total = *partition_offsets.last().expect("offsets never empty");
    ScatterPlan {
        buffer: ScatterBuffer::with_len(total),
        partition_offsets,
        partition_of,
        chunks,
        null_rows,
    }
}

/// Number of low hash bits for radix partitioning, sized so one partition's
/// hash table fits the L2 cache.
///
/// Per entry we assume the raw key, one `RowId` in the value list plus one
/// of list bookkeeping, and a byte of map overhead; the map is assumed to
/// be filled to 0.8, and a safety factor of 2 keeps the table clear of the
/// full cache size.
pub(crate) fn calculate_radix_bits<T>(l2_cache_bytes: usize, build_row_count: usize) -> u32 {
    let entry_bytes = std::mem::size_of::<T>() + 2 * std::mem::size_of::<RowId>() + 1;
    let hash_map_bytes = (build_row_count * entry_bytes) as f64 / 0.8;
    let safety_factor = 2.0;
    let partition_count = (safety_factor * hash_map_bytes / l2_cache_bytes as f64).max(1.0);
    partition_count.log2().ceil() as u32
}
