//! Shared join vocabulary: modes, predicate conditions, additional
//! predicates, and the per-type dispatch used by both operators.

pub mod hash;
pub mod sort_merge;

pub(crate) mod key;
pub(crate) mod materialize;
pub(crate) mod output;
pub(crate) mod radix;

use granite_storage::{ColumnId, Table};
use granite_types::DataType;

use crate::ExecutorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    Inner,
    Left,
    Right,
    Outer,
    Semi,
    Anti,
    Cross,
}

impl std::fmt::Display for JoinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinMode::Inner => "inner",
            JoinMode::Left => "left outer",
            JoinMode::Right => "right outer",
            JoinMode::Outer => "full outer",
            JoinMode::Semi => "semi",
            JoinMode::Anti => "anti",
            JoinMode::Cross => "cross",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateCondition {
    Equals,
    NotEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
}

impl PredicateCondition {
    /// Condition seen from swapped operands: `a < b` is `b > a`.
    /// Equality and inequality are symmetric.
    pub fn flipped(self) -> PredicateCondition {
        match self {
            PredicateCondition::Equals => PredicateCondition::Equals,
            PredicateCondition::NotEquals => PredicateCondition::NotEquals,
            PredicateCondition::LessThan => PredicateCondition::GreaterThan,
            PredicateCondition::LessThanEquals => PredicateCondition::GreaterThanEquals,
            PredicateCondition::GreaterThan => PredicateCondition::LessThan,
            PredicateCondition::GreaterThanEquals => PredicateCondition::LessThanEquals,
        }
    }
}

impl std::fmt::Display for PredicateCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            PredicateCondition::Equals => "=",
            PredicateCondition::NotEquals => "!=",
            PredicateCondition::LessThan => "<",
            PredicateCondition::LessThanEquals => "<=",
            PredicateCondition::GreaterThan => ">",
            PredicateCondition::GreaterThanEquals => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// An additional join predicate, combined with the primary predicate by
/// logical AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPredicate {
    /// (left column, right column) in input order
    pub column_ids: (ColumnId, ColumnId),
    pub condition: PredicateCondition,
}

impl JoinPredicate {
    pub fn new(column_ids: (ColumnId, ColumnId), condition: PredicateCondition) -> Self {
        JoinPredicate { column_ids, condition }
    }

    /// The same predicate seen from swapped inputs
    pub fn flipped(&self) -> JoinPredicate {
        JoinPredicate {
            column_ids: (self.column_ids.1, self.column_ids.0),
            condition: self.condition.flipped(),
        }
    }
}

/// Validate the join column pair shared by both operators: ids in range,
/// matching data types on both sides.
pub(crate) fn validate_join_columns(
    left: &Table,
    right: &Table,
    column_ids: (ColumnId, ColumnId),
) -> Result<DataType, ExecutorError> {
    if column_ids.0 >= left.column_count() {
        return Err(ExecutorError::ColumnIndexOutOfBounds {
            column: column_ids.0,
            column_count: left.column_count(),
        });
    }
    if column_ids.1 >= right.column_count() {
        return Err(ExecutorError::ColumnIndexOutOfBounds {
            column: column_ids.1,
            column_count: right.column_count(),
        });
    }
    let left_type = left.column_data_type(column_ids.0);
    let right_type = right.column_data_type(column_ids.1);
    if left_type != right_type {
        return Err(ExecutorError::ColumnTypeMismatch { left: left_type, right: right_type });
    }
    Ok(left_type)
}

/// Dispatch a generic join body on the resolved column data type. Expands
/// to one monomorphic instantiation per supported type.
macro_rules! with_join_key_type {
    ($data_type:expr, $T:ident, $body:block) => {
        match $data_type {
            granite_types::DataType::Int => {
                type $T = i32;
                $body
            }
            granite_types::DataType::Long => {
                type $T = i64;
                $body
            }
            granite_types::DataType::Float => {
                type $T = f32;
                $body
            }
            granite_types::DataType::Double => {
                type $T = f64;
                $body
            }
            granite_types::DataType::Text => {
                type $T = String;
                $body
            }
        }
    };
}

pub(crate) use with_join_key_type;
