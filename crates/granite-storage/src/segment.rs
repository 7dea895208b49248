use std::sync::Arc;

use granite_types::{DataType, Value};

use crate::{PosList, Table};

/// Typed column data with a parallel null-flag vector.
///
/// Each variant stores a vector of values and a same-length vector marking
/// NULL positions. Null positions hold a placeholder value; readers must
/// consult the null flags. This layout keeps value vectors contiguous for
/// the monomorphic join code paths.
#[derive(Debug, Clone)]
pub enum ValueSegment {
    Int { values: Vec<i32>, nulls: Vec<bool> },
    Long { values: Vec<i64>, nulls: Vec<bool> },
    Float { values: Vec<f32>, nulls: Vec<bool> },
    Double { values: Vec<f64>, nulls: Vec<bool> },
    Text { values: Vec<String>, nulls: Vec<bool> },
}

macro_rules! value_segment_ctor {
    ($name:ident, $ty:ty, $variant:ident, $placeholder:expr) => {
        /// Build a segment from optional values; `None` becomes NULL.
        pub fn $name(values: Vec<Option<$ty>>) -> ValueSegment {
            let mut out = Vec::with_capacity(values.len());
            let mut nulls = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Some(v) => {
                        out.push(v);
                        nulls.push(false);
                    }
                    None => {
                        out.push($placeholder);
                        nulls.push(true);
                    }
                }
            }
            ValueSegment::$variant { values: out, nulls }
        }
    };
}

impl ValueSegment {
    value_segment_ctor!(int, i32, Int, 0);
    value_segment_ctor!(long, i64, Long, 0);
    value_segment_ctor!(float, f32, Float, 0.0);
    value_segment_ctor!(double, f64, Double, 0.0);
    value_segment_ctor!(text, String, Text, String::new());

    pub fn len(&self) -> usize {
        match self {
            ValueSegment::Int { nulls, .. }
            | ValueSegment::Long { nulls, .. }
            | ValueSegment::Float { nulls, .. }
            | ValueSegment::Double { nulls, .. }
            | ValueSegment::Text { nulls, .. } => nulls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ValueSegment::Int { .. } => DataType::Int,
            ValueSegment::Long { .. } => DataType::Long,
            ValueSegment::Float { .. } => DataType::Float,
            ValueSegment::Double { .. } => DataType::Double,
            ValueSegment::Text { .. } => DataType::Text,
        }
    }

    pub fn is_null(&self, index: usize) -> bool {
        match self {
            ValueSegment::Int { nulls, .. }
            | ValueSegment::Long { nulls, .. }
            | ValueSegment::Float { nulls, .. }
            | ValueSegment::Double { nulls, .. }
            | ValueSegment::Text { nulls, .. } => nulls[index],
        }
    }

    /// Value at the given position, NULL-aware
    pub fn value(&self, index: usize) -> Value {
        if self.is_null(index) {
            return Value::Null;
        }
        match self {
            ValueSegment::Int { values, .. } => Value::Int(values[index]),
            ValueSegment::Long { values, .. } => Value::Long(values[index]),
            ValueSegment::Float { values, .. } => Value::Float(values[index]),
            ValueSegment::Double { values, .. } => Value::Double(values[index]),
            ValueSegment::Text { values, .. } => Value::Text(values[index].clone()),
        }
    }

    // Typed slice accessors for monomorphic execution paths. Return `None`
    // on a type mismatch so callers can surface a proper error.

    pub fn as_int(&self) -> Option<(&[i32], &[bool])> {
        match self {
            ValueSegment::Int { values, nulls } => Some((values, nulls)),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<(&[i64], &[bool])> {
        match self {
            ValueSegment::Long { values, nulls } => Some((values, nulls)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<(&[f32], &[bool])> {
        match self {
            ValueSegment::Float { values, nulls } => Some((values, nulls)),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<(&[f64], &[bool])> {
        match self {
            ValueSegment::Double { values, nulls } => Some((values, nulls)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<(&[String], &[bool])> {
        match self {
            ValueSegment::Text { values, nulls } => Some((values, nulls)),
            _ => None,
        }
    }
}

/// A view into one column of another table, driven by a shared pos list.
///
/// The referenced table must be a value table; reference-of-reference is
/// forbidden and prevented by the operators' output assembly.
#[derive(Debug, Clone)]
pub struct ReferenceSegment {
    referenced_table: Arc<Table>,
    referenced_column: usize,
    pos_list: Arc<PosList>,
}

impl ReferenceSegment {
    pub fn new(referenced_table: Arc<Table>, referenced_column: usize, pos_list: Arc<PosList>) -> Self {
        ReferenceSegment { referenced_table, referenced_column, pos_list }
    }

    pub fn len(&self) -> usize {
        self.pos_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos_list.is_empty()
    }

    pub fn referenced_table(&self) -> &Arc<Table> {
        &self.referenced_table
    }

    pub fn referenced_column(&self) -> usize {
        self.referenced_column
    }

    pub fn pos_list(&self) -> &Arc<PosList> {
        &self.pos_list
    }

    pub fn data_type(&self) -> DataType {
        self.referenced_table.column_data_type(self.referenced_column)
    }

    /// Value at the given position, following the pos list.
    /// `NULL_ROW_ID` entries yield NULL.
    pub fn value(&self, index: usize) -> Value {
        let row_id = self.pos_list[index];
        if row_id.is_null() {
            return Value::Null;
        }
        self.referenced_table.value_at(row_id, self.referenced_column)
    }
}

/// A chunk-local column slice: either owning values or referencing another
/// table.
#[derive(Debug, Clone)]
pub enum Segment {
    Value(ValueSegment),
    Reference(ReferenceSegment),
}

impl Segment {
    pub fn len(&self) -> usize {
        match self {
            Segment::Value(s) => s.len(),
            Segment::Reference(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Segment::Value(s) => s.data_type(),
            Segment::Reference(s) => s.data_type(),
        }
    }

    pub fn value(&self, index: usize) -> Value {
        match self {
            Segment::Value(s) => s.value(index),
            Segment::Reference(s) => s.value(index),
        }
    }

    /// Iterate the segment as `(value, is_null, offset)` triples
    pub fn iter(&self) -> impl Iterator<Item = (Value, bool, u32)> + '_ {
        (0..self.len()).map(move |i| {
            let value = self.value(i);
            let is_null = value.is_null();
            (value, is_null, i as u32)
        })
    }
}
