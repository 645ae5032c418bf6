//! Core in-memory table types.
//!
//! A [`DataSet`] is column-major: each [`Column`] owns a typed vector of
//! [`Value`]s, and every column has the same length. Missing cells are
//! represented as [`Value::Null`] regardless of the column type.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int64,
    Float64,
    Bool,
    Utf8,
}

impl DataType {
    /// Whether statistics such as median and mean apply to this type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int64 => write!(f, "int64"),
            DataType::Float64 => write!(f, "float64"),
            DataType::Bool => write!(f, "bool"),
            DataType::Utf8 => write!(f, "utf8"),
        }
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Utf8(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type this value belongs to, or `None` for a missing cell.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::Bool(_) => Some(DataType::Bool),
            Value::Utf8(_) => Some(DataType::Utf8),
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Bool(_) => "bool",
            Value::Utf8(_) => "utf8",
        }
    }

    /// Hashable identity of the cell, used for duplicate detection.
    pub(crate) fn key(&self) -> CellKey<'_> {
        match self {
            Value::Null => CellKey::Null,
            Value::Int64(v) => CellKey::Int(*v),
            // -0.0 and 0.0 compare equal, so they must hash equal too
            Value::Float64(v) if *v == 0.0 => CellKey::Float(0.0f64.to_bits()),
            Value::Float64(v) => CellKey::Float(v.to_bits()),
            Value::Bool(v) => CellKey::Bool(*v),
            Value::Utf8(v) => CellKey::Text(v.as_str()),
        }
    }

    /// Total order between two non-null values of the same type.
    pub(crate) fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.total_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Utf8(a), Value::Utf8(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (a, b) => a.type_name().cmp(b.type_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Utf8(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CellKey<'a> {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(&'a str),
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data_type: DataType,
    values: Vec<Value>,
}

impl Column {
    /// Creates a column, checking that every non-null value matches `data_type`.
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        values: Vec<Value>,
    ) -> Result<Self, DatasetError> {
        let name = name.into();
        if let Some(bad) = values
            .iter()
            .find(|v| v.data_type().is_some_and(|t| t != data_type))
        {
            return Err(DatasetError::TypeMismatch {
                column: name,
                expected: data_type.to_string(),
                actual: bad.type_name().to_string(),
            });
        }
        Ok(Self {
            name,
            data_type,
            values,
        })
    }

    pub fn int64(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self::from_options(name, DataType::Int64, values, Value::Int64)
    }

    pub fn float64(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::from_options(name, DataType::Float64, values, Value::Float64)
    }

    pub fn bool(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Self::from_options(name, DataType::Bool, values, Value::Bool)
    }

    pub fn utf8(name: impl Into<String>, values: Vec<Option<&str>>) -> Self {
        Self::from_options(name, DataType::Utf8, values, |s: &str| {
            Value::Utf8(s.to_string())
        })
    }

    fn from_options<T>(
        name: impl Into<String>,
        data_type: DataType,
        values: Vec<Option<T>>,
        wrap: impl Fn(T) -> Value,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            values: values
                .into_iter()
                .map(|v| v.map(&wrap).unwrap_or(Value::Null))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub(crate) fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Builds a column whose values are already known to match `data_type`.
    pub(crate) fn from_parts(name: String, data_type: DataType, values: Vec<Value>) -> Self {
        Self {
            name,
            data_type,
            values,
        }
    }

    pub(crate) fn into_parts(self) -> (String, DataType, Vec<Value>) {
        (self.name, self.data_type, self.values)
    }
}

/// An in-memory table of rows by named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    columns: Vec<Column>,
    row_count: usize,
}

impl DataSet {
    /// Builds a dataset from columns of equal length and unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let row_count = columns.first().map(Column::len).unwrap_or(0);
        Self::with_row_count(columns, row_count)
    }

    /// Like [`DataSet::new`], but keeps an explicit row count so a table
    /// with every column dropped still reports its height.
    pub(crate) fn with_row_count(
        columns: Vec<Column>,
        row_count: usize,
    ) -> Result<Self, DatasetError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(DatasetError::DuplicateColumn(column.name().to_string()));
            }
            if column.len() != row_count {
                return Err(DatasetError::LengthMismatch {
                    column: column.name().to_string(),
                    expected: row_count,
                    actual: column.len(),
                });
            }
        }
        Ok(Self { columns, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Cells of row `index`, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values()[index]).collect())
    }

    /// Missing-value count per column, in column order.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name().to_string(), c.missing_count()))
            .collect()
    }

    /// Number of rows identical to some earlier row.
    pub fn duplicate_row_count(&self) -> usize {
        self.duplicate_mask().iter().filter(|d| **d).count()
    }

    /// For each row, whether it repeats an earlier row.
    pub(crate) fn duplicate_mask(&self) -> Vec<bool> {
        let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(self.row_count);
        (0..self.row_count)
            .map(|i| {
                let key: Vec<CellKey<'_>> =
                    self.columns.iter().map(|c| c.values()[i].key()).collect();
                !seen.insert(key)
            })
            .collect()
    }

    pub(crate) fn column_index(&self, name: &str) -> Result<usize, DatasetError> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| DatasetError::ColumnNotFound(name.to_string()))
    }

    /// Reassembles a dataset from columns already known to be consistent.
    pub(crate) fn from_parts(columns: Vec<Column>, row_count: usize) -> Self {
        Self { columns, row_count }
    }

    pub(crate) fn into_columns(self) -> (Vec<Column>, usize) {
        (self.columns, self.row_count)
    }
}
