/// LiveView Column Implementation
///
/// A Column is an array-like random-access data container indexed by row.
/// Each Column has a type specifying the type of every value stored; the
/// storage backend is chosen per table from its `StorageHint`.

use crate::config::StorageHint;
use crate::engine::ResourceId;
use crate::error::{Error, Result};
use crate::sequence::{ArraySequence, Sequence, TieredVectorSequence};
use std::fmt::Debug;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Bool,
    Float,
    Double,
    String,
    Binary,
    /// Milliseconds since the Unix epoch.
    Timestamp,
    /// A nested table per row.
    Table,
    /// Any scalar value.
    Mixed,
}

impl ColumnType {
    /// Column types the engine can sort on.
    pub fn is_sortable(self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Bool | ColumnType::Timestamp)
    }

    pub(crate) fn default_value(self) -> ColumnValue {
        match self {
            ColumnType::Int => ColumnValue::Int(0),
            ColumnType::Bool => ColumnValue::Bool(false),
            ColumnType::Float => ColumnValue::Float(0.0),
            ColumnType::Double => ColumnValue::Double(0.0),
            ColumnType::String => ColumnValue::String(String::new()),
            ColumnType::Binary => ColumnValue::Binary(Vec::new()),
            ColumnType::Timestamp => ColumnValue::Timestamp(0),
            ColumnType::Table | ColumnType::Mixed => ColumnValue::Null,
        }
    }
}

/// Column value enum to support multiple types
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int(i64),
    Bool(bool),
    Float(f32),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(i64),
    /// Reference to the nested table stored in a `Table` column cell.
    Subtable(ResourceId),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ColumnValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ColumnValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ColumnValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ColumnValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            ColumnValue::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            ColumnValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value used by aggregates.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Int(n) | ColumnValue::Timestamp(n) => Some(*n as f64),
            ColumnValue::Float(f) => Some(*f as f64),
            ColumnValue::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Short type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Int(_) => "Int",
            ColumnValue::Bool(_) => "Bool",
            ColumnValue::Float(_) => "Float",
            ColumnValue::Double(_) => "Double",
            ColumnValue::String(_) => "String",
            ColumnValue::Binary(_) => "Binary",
            ColumnValue::Timestamp(_) => "Timestamp",
            ColumnValue::Subtable(_) => "Subtable",
            ColumnValue::Null => "Null",
        }
    }

    /// True if the value may be stored in a column of the given type.
    /// Null is handled separately by nullability.
    pub fn fits(&self, column_type: ColumnType) -> bool {
        matches!(
            (self, column_type),
            (ColumnValue::Int(_), ColumnType::Int)
                | (ColumnValue::Bool(_), ColumnType::Bool)
                | (ColumnValue::Float(_), ColumnType::Float)
                | (ColumnValue::Double(_), ColumnType::Double)
                | (ColumnValue::String(_), ColumnType::String)
                | (ColumnValue::Binary(_), ColumnType::Binary)
                | (ColumnValue::Timestamp(_), ColumnType::Timestamp)
                | (ColumnValue::Subtable(_), ColumnType::Table)
        ) || (column_type == ColumnType::Mixed && !matches!(self, ColumnValue::Subtable(_)))
    }
}

/// A typed column over a `Sequence` backend.
pub struct Column {
    name: String,
    column_type: ColumnType,
    nullable: bool,
    sequence: Box<dyn Sequence<ColumnValue>>,
}

impl Column {
    pub fn new(name: String, column_type: ColumnType, nullable: bool, hint: StorageHint) -> Self {
        let sequence: Box<dyn Sequence<ColumnValue>> = if hint.use_tiered_vector() {
            Box::new(TieredVectorSequence::new())
        } else {
            Box::new(ArraySequence::new())
        };

        Column {
            name,
            column_type,
            nullable,
            sequence,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub(crate) fn check(&self, value: &ColumnValue) -> Result<()> {
        if value.is_null() {
            // Mixed and subtable cells use Null as their empty state.
            if self.nullable || matches!(self.column_type, ColumnType::Mixed | ColumnType::Table) {
                return Ok(());
            }
            return Err(Error::NotNullable(self.name.clone()));
        }
        if value.fits(self.column_type) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: self.column_type,
                found: value.type_name().to_string(),
            })
        }
    }

    pub fn get(&self, index: usize) -> Result<&ColumnValue> {
        self.sequence
            .get(index)
            .ok_or_else(|| Error::out_of_range(index, self.len()))
    }

    pub fn set(&mut self, index: usize, value: ColumnValue) -> Result<ColumnValue> {
        self.check(&value)?;
        let old = self.get(index)?.clone();
        self.sequence.set(index, value)?;
        Ok(old)
    }

    pub fn insert(&mut self, index: usize, value: ColumnValue) -> Result<()> {
        self.check(&value)?;
        self.sequence.insert(index, value)
    }

    pub fn push(&mut self, value: ColumnValue) -> Result<()> {
        self.check(&value)?;
        self.sequence.push(value);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<ColumnValue> {
        self.sequence.remove(index)
    }

    pub fn clear(&mut self) {
        self.sequence.clear();
    }

    /// Value written for a row added without an explicit value.
    pub fn default_value(&self) -> ColumnValue {
        if self.nullable {
            ColumnValue::Null
        } else {
            self.column_type.default_value()
        }
    }
}

impl Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Column {{ name: '{}', type: {:?}, nullable: {}, len: {} }}",
            self.name,
            self.column_type,
            self.nullable,
            self.len()
        )
    }
}
