use std::collections::HashMap;
use std::sync::Arc;

use granite_storage::{
    ColumnDefinition, PosList, ReferenceSegment, Segment, Table, TableType, NULL_ROW_ID,
};

use crate::join::JoinMode;
use crate::ExecutorError;

/// Chunk-wise pos lists per column of a reference input table, deduplicated
/// so columns sharing the same pos lists share one entry (and later one
/// composed output pos list).
type PosListsByColumn = Vec<Arc<Vec<Arc<PosList>>>>;

/// Assemble the operator output: one reference-segment chunk per non-empty
/// pos-list pair, appended in partition order.
///
/// `pairs` is oriented (left, right) in pre-swap input order; operators map
/// their internal build/probe orientation back before calling. Semi and
/// anti joins emit only the left side.
pub(crate) fn build_output_table(
    left_table: &Arc<Table>,
    right_table: &Arc<Table>,
    mode: JoinMode,
    pairs: Vec<(PosList, PosList)>,
) -> Result<Table, ExecutorError> {
    let emit_right = !matches!(mode, JoinMode::Semi | JoinMode::Anti);

    // The preserved side of an outer join pads the other side with NULLs.
    let right_forces_nullable = matches!(mode, JoinMode::Right | JoinMode::Outer);
    let left_forces_nullable = matches!(mode, JoinMode::Left | JoinMode::Outer);

    let mut definitions: Vec<ColumnDefinition> = left_table
        .column_definitions()
        .iter()
        .cloned()
        .map(|mut definition| {
            definition.nullable |= right_forces_nullable;
            definition
        })
        .collect();
    if emit_right {
        definitions.extend(right_table.column_definitions().iter().cloned().map(
            |mut definition| {
                definition.nullable |= left_forces_nullable;
                definition
            },
        ));
    }

    let mut output = Table::new(definitions, TableType::Reference);

    let left_inputs = reference_inputs(left_table);
    let right_inputs = if emit_right { reference_inputs(right_table) } else { None };

    for (left_rows, right_rows) in pairs {
        if left_rows.is_empty() && right_rows.is_empty() {
            continue;
        }

        let mut segments = Vec::with_capacity(output.column_count());
        let mut composed_cache: HashMap<usize, Arc<PosList>> = HashMap::new();

        let left_rows = Arc::new(left_rows);
        write_output_segments(
            &mut segments,
            left_table,
            &left_inputs,
            &left_rows,
            &mut composed_cache,
        );
        if emit_right {
            let right_rows = Arc::new(right_rows);
            write_output_segments(
                &mut segments,
                right_table,
                &right_inputs,
                &right_rows,
                &mut composed_cache,
            );
        }

        output.append_chunk(segments)?;
    }

    Ok(output)
}

/// Collect and deduplicate the chunk-wise input pos lists of a reference
/// table, one entry per column. `None` for value tables.
fn reference_inputs(table: &Table) -> Option<PosListsByColumn> {
    if table.table_type() != TableType::Reference {
        return None;
    }

    let mut shared: HashMap<Vec<usize>, Arc<Vec<Arc<PosList>>>> = HashMap::new();
    let mut by_column = Vec::with_capacity(table.column_count());
    for column in 0..table.column_count() {
        let mut lists = Vec::with_capacity(table.chunk_count());
        let mut identity = Vec::with_capacity(table.chunk_count());
        for chunk_id in 0..table.chunk_count() {
            match table.chunk(chunk_id).segment(column) {
                Segment::Reference(segment) => {
                    identity.push(Arc::as_ptr(segment.pos_list()) as usize);
                    lists.push(segment.pos_list().clone());
                }
                Segment::Value(_) => {
                    unreachable!("reference tables contain only reference segments")
                }
            }
        }
        let entry = shared.entry(identity).or_insert_with(|| Arc::new(lists));
        by_column.push(entry.clone());
    }
    Some(by_column)
}

/// Emit one reference segment per column of `input_table`, all driven by
/// `rows`.
///
/// For reference inputs the pos list is composed with the input's own pos
/// lists first, so output segments always point into value tables
/// (reference-of-reference is forbidden). Columns sharing input pos lists
/// share the composed list through `composed_cache`. An empty-but-
/// referenced input is represented by a zero-row dummy table.
fn write_output_segments(
    segments: &mut Vec<Segment>,
    input_table: &Arc<Table>,
    input_pos_lists: &Option<PosListsByColumn>,
    rows: &Arc<PosList>,
    composed_cache: &mut HashMap<usize, Arc<PosList>>,
) {
    match input_pos_lists {
        None => {
            for column in 0..input_table.column_count() {
                segments.push(Segment::Reference(ReferenceSegment::new(
                    input_table.clone(),
                    column,
                    rows.clone(),
                )));
            }
        }
        Some(by_column) => {
            let dummy = (input_table.chunk_count() == 0).then(|| {
                Arc::new(Table::dummy(input_table.column_definitions().to_vec()))
            });
            for (column, chunk_lists) in by_column.iter().enumerate() {
                let composed = composed_cache
                    .entry(Arc::as_ptr(chunk_lists) as usize)
                    .or_insert_with(|| Arc::new(dereference_pos_list(rows, chunk_lists)))
                    .clone();
                match &dummy {
                    Some(dummy) => {
                        // The input has no chunks, so the referenced table
                        // cannot be recovered; all rows are NULL_ROW_ID and
                        // the dummy target only satisfies the schema.
                        segments.push(Segment::Reference(ReferenceSegment::new(
                            dummy.clone(),
                            column,
                            composed,
                        )));
                    }
                    None => {
                        let (referenced_table, referenced_column) =
                            match input_table.chunk(0).segment(column) {
                                Segment::Reference(segment) => {
                                    (segment.referenced_table().clone(), segment.referenced_column())
                                }
                                Segment::Value(_) => unreachable!(
                                    "reference tables contain only reference segments"
                                ),
                            };
                        segments.push(Segment::Reference(ReferenceSegment::new(
                            referenced_table,
                            referenced_column,
                            composed,
                        )));
                    }
                }
            }
        }
    }
}

/// Compose an output pos list with a reference input's own pos lists,
/// yielding positions in the referenced base table. NULLs propagate.
fn dereference_pos_list(rows: &PosList, chunk_lists: &[Arc<PosList>]) -> PosList {
    rows.iter()
        .map(|row| {
            if row.is_null() {
                NULL_ROW_ID
            } else {
                chunk_lists[row.chunk_id as usize][row.chunk_offset as usize]
            }
        })
        .collect()
}
