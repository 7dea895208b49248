use granite_storage::{ColumnId, StorageError};
use granite_types::DataType;

use crate::join::{JoinMode, PredicateCondition};

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// The operator does not implement the requested join mode
    UnsupportedJoinMode { operator: &'static str, mode: JoinMode },
    /// The operator does not support the predicate, or not with this mode
    UnsupportedPredicate {
        operator: &'static str,
        condition: PredicateCondition,
        mode: JoinMode,
    },
    /// Join columns must share one data type
    ColumnTypeMismatch { left: DataType, right: DataType },
    ColumnIndexOutOfBounds { column: ColumnId, column_count: usize },
    /// Hash join additional predicates must be equality predicates
    AdditionalPredicateUnsupported { condition: PredicateCondition },
    Storage(StorageError),
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorError::UnsupportedJoinMode { operator, mode } => {
                write!(f, "{} does not support {} joins", operator, mode)
            }
            ExecutorError::UnsupportedPredicate { operator, condition, mode } => {
                write!(
                    f,
                    "{} does not support the '{}' predicate with {} joins",
                    operator, condition, mode
                )
            }
            ExecutorError::ColumnTypeMismatch { left, right } => {
                write!(
                    f,
                    "join column types do not match: left is {}, right is {}",
                    left, right
                )
            }
            ExecutorError::ColumnIndexOutOfBounds { column, column_count } => {
                write!(
                    f,
                    "column id {} out of range for a table with {} columns",
                    column, column_count
                )
            }
            ExecutorError::AdditionalPredicateUnsupported { condition } => {
                write!(
                    f,
                    "additional join predicates must use equality, got '{}'",
                    condition
                )
            }
            ExecutorError::Storage(err) => write!(f, "storage error: {}", err),
        }
    }
}

impl std::error::Error for ExecutorError {}

impl From<StorageError> for ExecutorError {
    fn from(err: StorageError) -> Self {
        ExecutorError::Storage(err)
    }
}
