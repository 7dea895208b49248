use std::sync::Arc;

use granite_scheduler::Task;
use granite_storage::{ColumnId, RowId, Segment, Table};
use parking_lot::Mutex;

use crate::join::key::JoinKey;

/// A projected join column entry: the key value and the position of its row
/// in the input table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MaterializedValue<T> {
    pub value: T,
    pub row_id: RowId,
}

/// Per-chunk output of the materialization phase
pub(crate) struct ChunkOutput<T> {
    pub elements: Vec<MaterializedValue<T>>,
    /// Elements per partition, present when the partition function is known
    /// during materialization (radix partitioning)
    pub histogram: Vec<usize>,
    /// Row ids with a NULL join key, tracked when `keep_nulls` is set
    pub null_rows: Vec<RowId>,
}

/// One slot per input chunk, filled by the chunk's materialize task and
/// consumed by the partition setup task.
pub(crate) type ChunkSlots<T> = Arc<Vec<Mutex<Option<ChunkOutput<T>>>>>;

pub(crate) fn new_chunk_slots<T>(chunk_count: usize) -> ChunkSlots<T> {
    Arc::new((0..chunk_count).map(|_| Mutex::new(None)).collect())
}

/// Create one task per input chunk projecting the join column into
/// `MaterializedValue` records.
///
/// NULL keys are discarded unless `keep_nulls` is set, in which case their
/// row ids go to the chunk's `null_rows` side list (NULL keys can never
/// satisfy a join predicate but outer and anti joins emit their rows).
/// When `radix_bits` is known the task also builds the per-partition
/// histogram in the same pass, so the partition step can compute exact
/// write offsets without reallocation.
pub(crate) fn create_materialize_tasks<T: JoinKey>(
    table: &Arc<Table>,
    column_id: ColumnId,
    keep_nulls: bool,
    radix_bits: Option<u32>,
    slots: &ChunkSlots<T>,
    side: &'static str,
) -> Vec<Arc<Task>> {
    (0..table.chunk_count())
        .map(|chunk_id| {
            let table = table.clone();
            let slots = slots.clone();
            Task::new(format!("materialize {} chunk {}", side, chunk_id), move || {
                let chunk_size = table.chunk(chunk_id).size();
                let mut elements = Vec::with_capacity(chunk_size);
                let mut null_rows = Vec::new();
                let partition_count = radix_bits.map_or(0, |bits| 1usize << bits);
                let mut histogram = vec![0usize; partition_count];

                for_each_key::<T>(&table, chunk_id, column_id, |offset, value| match value {
                    Some(value) => {
                        if let Some(bits) = radix_bits {
                            histogram[T::radix_partition(value.hashed(), bits)] += 1;
                        }
                        elements.push(MaterializedValue {
                            value: value.clone(),
                            row_id: RowId::new(chunk_id as u32, offset),
                        });
                    }
                    None => {
                        if keep_nulls {
                            null_rows.push(RowId::new(chunk_id as u32, offset));
                        }
                    }
                });

                let previous =
                    slots[chunk_id].lock().replace(ChunkOutput { elements, histogram, null_rows });
                debug_assert!(previous.is_none(), "chunk {} materialized twice", chunk_id);
            })
        })
        .collect()
}

/// Visit the join column of one chunk as typed values, `None` for NULL.
///
/// Reference segments are followed into their referenced (value) table;
/// `NULL_ROW_ID` entries in the pos list yield NULL.
pub(crate) fn for_each_key<T: JoinKey>(
    table: &Table,
    chunk_id: usize,
    column_id: ColumnId,
    mut visit: impl FnMut(u32, Option<&T>),
) {
    match table.chunk(chunk_id).segment(column_id) {
        Segment::Value(segment) => {
            let (values, nulls) =
                T::unpack(segment).expect("join column type validated at operator entry");
            for (offset, (value, is_null)) in values.iter().zip(nulls).enumerate() {
                visit(offset as u32, (!is_null).then_some(value));
            }
        }
        Segment::Reference(segment) => {
            let referenced = segment.referenced_table();
            let referenced_column = segment.referenced_column();
            for (offset, row_id) in segment.pos_list().iter().enumerate() {
                if row_id.is_null() {
                    visit(offset as u32, None);
                    continue;
                }
                match referenced.chunk(row_id.chunk_id as usize).segment(referenced_column) {
                    Segment::Value(value_segment) => {
                        let (values, nulls) = T::unpack(value_segment)
                            .expect("join column type validated at operator entry");
                        let at = row_id.chunk_offset as usize;
                        visit(offset as u32, (!nulls[at]).then_some(&values[at]));
                    }
                    Segment::Reference(_) => {
                        panic!("reference segment points into another reference segment")
                    }
                }
            }
        }
    }
}

/// Typed read of a single row's join column, `None` for NULL
pub(crate) fn key_at<T: JoinKey>(table: &Table, row_id: RowId, column_id: ColumnId) -> Option<T> {
    match table.chunk(row_id.chunk_id as usize).segment(column_id) {
        Segment::Value(segment) => {
            let (values, nulls) =
                T::unpack(segment).expect("join column type validated at operator entry");
            let at = row_id.chunk_offset as usize;
            (!nulls[at]).then(|| values[at].clone())
        }
        Segment::Reference(segment) => {
            let position = segment.pos_list()[row_id.chunk_offset as usize];
            if position.is_null() {
                return None;
            }
            key_at::<T>(segment.referenced_table(), position, segment.referenced_column())
        }
    }
}
