#![allow(dead_code)]

use std::sync::Arc;

use granite_storage::{
    ColumnDefinition, PosList, ReferenceSegment, RowId, Segment, Table, TableType, ValueSegment,
};
use granite_types::{DataType, Value};

/// Single int column table, one chunk per inner vector
pub fn int_table(column: &str, chunks: Vec<Vec<Option<i32>>>) -> Arc<Table> {
    let mut table = Table::new(
        vec![ColumnDefinition::new(column, DataType::Int, true)],
        TableType::Value,
    );
    for chunk in chunks {
        table.append_chunk(vec![Segment::Value(ValueSegment::int(chunk))]).unwrap();
    }
    Arc::new(table)
}

/// Two int columns, one chunk per inner vector
pub fn int_table2(
    columns: (&str, &str),
    chunks: Vec<Vec<(Option<i32>, Option<i32>)>>,
) -> Arc<Table> {
    let mut table = Table::new(
        vec![
            ColumnDefinition::new(columns.0, DataType::Int, true),
            ColumnDefinition::new(columns.1, DataType::Int, true),
        ],
        TableType::Value,
    );
    for chunk in chunks {
        let (first, second): (Vec<_>, Vec<_>) = chunk.into_iter().unzip();
        table
            .append_chunk(vec![
                Segment::Value(ValueSegment::int(first)),
                Segment::Value(ValueSegment::int(second)),
            ])
            .unwrap();
    }
    Arc::new(table)
}

/// Single text column table
pub fn text_table(column: &str, chunks: Vec<Vec<Option<&str>>>) -> Arc<Table> {
    let mut table = Table::new(
        vec![ColumnDefinition::new(column, DataType::Text, true)],
        TableType::Value,
    );
    for chunk in chunks {
        let values = chunk.into_iter().map(|v| v.map(str::to_string)).collect();
        table.append_chunk(vec![Segment::Value(ValueSegment::text(values))]).unwrap();
    }
    Arc::new(table)
}

/// A reference table viewing the given rows of a value table
pub fn reference_table(base: &Arc<Table>, rows: PosList) -> Arc<Table> {
    let pos_list = Arc::new(rows);
    let mut table = Table::new(base.column_definitions().to_vec(), TableType::Reference);
    let segments = (0..base.column_count())
        .map(|column| {
            Segment::Reference(ReferenceSegment::new(base.clone(), column, pos_list.clone()))
        })
        .collect();
    table.append_chunk(segments).unwrap();
    Arc::new(table)
}

/// Every row of a table as values, in row order
pub fn all_rows(table: &Table) -> Vec<Vec<Value>> {
    let mut rows = Vec::with_capacity(table.row_count());
    for chunk_id in 0..table.chunk_count() {
        for offset in 0..table.chunk(chunk_id).size() {
            let row_id = RowId::new(chunk_id as u32, offset as u32);
            rows.push((0..table.column_count()).map(|c| table.value_at(row_id, c)).collect());
        }
    }
    rows
}

fn as_int(value: &Value) -> Option<i32> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Null => None,
        other => panic!("expected an int value, got {}", other),
    }
}

/// Output of a two-int-column join as a sorted multiset of pairs
pub fn int_pairs(table: &Table) -> Vec<(Option<i32>, Option<i32>)> {
    assert_eq!(table.column_count(), 2);
    let mut pairs: Vec<_> =
        all_rows(table).iter().map(|row| (as_int(&row[0]), as_int(&row[1]))).collect();
    pairs.sort();
    pairs
}

/// Output of a single-column (semi/anti) join as a sorted multiset
pub fn int_values(table: &Table) -> Vec<Option<i32>> {
    assert_eq!(table.column_count(), 1);
    let mut values: Vec<_> = all_rows(table).iter().map(|row| as_int(&row[0])).collect();
    values.sort();
    values
}
