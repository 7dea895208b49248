#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ColumnCountMismatch { expected: usize, actual: usize },
    ColumnIndexOutOfBounds { index: usize },
    SegmentLengthMismatch { expected: usize, actual: usize },
    TypeMismatch { column: usize, expected: String, actual: String },
    TableTypeMismatch { expected: String, actual: String },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::ColumnCountMismatch { expected, actual } => {
                write!(f, "Column count mismatch: expected {}, got {}", expected, actual)
            }
            StorageError::ColumnIndexOutOfBounds { index } => {
                write!(f, "Column index {} out of bounds", index)
            }
            StorageError::SegmentLengthMismatch { expected, actual } => {
                write!(f, "Segment length mismatch: expected {}, got {}", expected, actual)
            }
            StorageError::TypeMismatch { column, expected, actual } => {
                write!(
                    f,
                    "Type mismatch in column {}: expected {}, got {}",
                    column, expected, actual
                )
            }
            StorageError::TableTypeMismatch { expected, actual } => {
                write!(f, "Table type mismatch: expected {} segments, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for StorageError {}
