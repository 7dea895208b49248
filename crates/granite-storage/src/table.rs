use granite_types::{DataType, Value};

use crate::{Chunk, RowId, Segment, StorageError};

/// Column index within a table
pub type ColumnId = usize;

/// Whether a table owns its data or references another table's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableType {
    Value,
    Reference,
}

/// Name, type and nullability of one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        ColumnDefinition { name: name.into(), data_type, nullable }
    }
}

/// An ordered sequence of chunks sharing one column schema.
///
/// Row count is the sum of chunk sizes. Tables of type `Reference` contain
/// only reference segments; tables of type `Value` only value segments.
#[derive(Debug, Clone)]
pub struct Table {
    column_definitions: Vec<ColumnDefinition>,
    chunks: Vec<Chunk>,
    table_type: TableType,
}

impl Table {
    pub fn new(column_definitions: Vec<ColumnDefinition>, table_type: TableType) -> Self {
        Table { column_definitions, chunks: Vec::new(), table_type }
    }

    /// Zero-row table with the given schema. Used as the target of
    /// reference segments whose input side is empty but referenced.
    pub fn dummy(column_definitions: Vec<ColumnDefinition>) -> Self {
        Table::new(column_definitions, TableType::Value)
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(|c| c.size()).sum()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_definitions.len()
    }

    pub fn column_definitions(&self) -> &[ColumnDefinition] {
        &self.column_definitions
    }

    pub fn column_data_type(&self, column: ColumnId) -> DataType {
        self.column_definitions[column].data_type
    }

    pub fn chunk(&self, chunk_id: usize) -> &Chunk {
        &self.chunks[chunk_id]
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Append one new chunk built from the given segments.
    ///
    /// Validates column count, equal segment lengths, value-segment data
    /// types against the schema, and the segment variant against the table
    /// type.
    pub fn append_chunk(&mut self, segments: Vec<Segment>) -> Result<(), StorageError> {
        if segments.len() != self.column_count() {
            return Err(StorageError::ColumnCountMismatch {
                expected: self.column_count(),
                actual: segments.len(),
            });
        }
        let expected_len = segments.first().map_or(0, |s| s.len());
        for (column, segment) in segments.iter().enumerate() {
            if segment.len() != expected_len {
                return Err(StorageError::SegmentLengthMismatch {
                    expected: expected_len,
                    actual: segment.len(),
                });
            }
            match (self.table_type, segment) {
                (TableType::Value, Segment::Reference(_)) => {
                    return Err(StorageError::TableTypeMismatch {
                        expected: "value".to_string(),
                        actual: "reference".to_string(),
                    });
                }
                (TableType::Reference, Segment::Value(_)) => {
                    return Err(StorageError::TableTypeMismatch {
                        expected: "reference".to_string(),
                        actual: "value".to_string(),
                    });
                }
                _ => {}
            }
            let expected_type = self.column_definitions[column].data_type;
            if segment.data_type() != expected_type {
                return Err(StorageError::TypeMismatch {
                    column,
                    expected: expected_type.to_string(),
                    actual: segment.data_type().to_string(),
                });
            }
        }
        self.chunks.push(Chunk::new(segments));
        Ok(())
    }

    /// Value of the row at `row_id` in the given column, dereferencing
    /// reference segments. `NULL_ROW_ID` yields NULL.
    pub fn value_at(&self, row_id: RowId, column: ColumnId) -> Value {
        if row_id.is_null() {
            return Value::Null;
        }
        self.chunk(row_id.chunk_id as usize)
            .segment(column)
            .value(row_id.chunk_offset as usize)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use granite_types::DataType;

    use super::*;
    use crate::{ReferenceSegment, ValueSegment, NULL_ROW_ID};

    fn int_table(chunks: Vec<Vec<Option<i32>>>) -> Table {
        let mut table =
            Table::new(vec![ColumnDefinition::new("a", DataType::Int, true)], TableType::Value);
        for chunk in chunks {
            table.append_chunk(vec![Segment::Value(ValueSegment::int(chunk))]).unwrap();
        }
        table
    }

    #[test]
    fn test_row_count_across_chunks() {
        let table = int_table(vec![vec![Some(1), Some(2)], vec![Some(3)]]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.chunk_count(), 2);
        assert_eq!(table.column_count(), 1);
    }

    #[test]
    fn test_append_chunk_column_count_mismatch() {
        let mut table = int_table(vec![]);
        let result = table.append_chunk(vec![]);
        assert_eq!(result, Err(StorageError::ColumnCountMismatch { expected: 1, actual: 0 }));
    }

    #[test]
    fn test_append_chunk_type_mismatch() {
        let mut table = int_table(vec![]);
        let result =
            table.append_chunk(vec![Segment::Value(ValueSegment::long(vec![Some(1)]))]);
        assert!(matches!(result, Err(StorageError::TypeMismatch { .. })));
    }

    #[test]
    fn test_append_chunk_rejects_reference_in_value_table() {
        let base = Arc::new(int_table(vec![vec![Some(1)]]));
        let mut table = int_table(vec![]);
        let segment = ReferenceSegment::new(base, 0, Arc::new(vec![RowId::new(0, 0)]));
        let result = table.append_chunk(vec![Segment::Reference(segment)]);
        assert!(matches!(result, Err(StorageError::TableTypeMismatch { .. })));
    }

    #[test]
    fn test_value_at() {
        let table = int_table(vec![vec![Some(1), None], vec![Some(3)]]);
        assert_eq!(table.value_at(RowId::new(0, 0), 0), Value::Int(1));
        assert_eq!(table.value_at(RowId::new(0, 1), 0), Value::Null);
        assert_eq!(table.value_at(RowId::new(1, 0), 0), Value::Int(3));
        assert_eq!(table.value_at(NULL_ROW_ID, 0), Value::Null);
    }

    #[test]
    fn test_dummy_table_is_empty() {
        let dummy = Table::dummy(vec![ColumnDefinition::new("a", DataType::Int, true)]);
        assert_eq!(dummy.row_count(), 0);
        assert_eq!(dummy.chunk_count(), 0);
    }
}
