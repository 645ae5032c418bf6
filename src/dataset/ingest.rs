//! CSV ingestion with per-column type inference.
//!
//! Parsing and inference go through arrow's CSV reader. Inferred integer,
//! float and boolean columns keep their type; everything else (dates,
//! timestamps, free text) is read as text. Empty cells become
//! [`Value::Null`], and a column with no values at all becomes a `float64`
//! column of nulls.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType as ArrowType, Field, Schema};

use super::types::{Column, DataSet, DataType, Value};
use crate::error::DatasetError;

/// Reads and parses the CSV file at `path`.
pub async fn load_csv(path: &Path) -> Result<DataSet, DatasetError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DatasetError::SourceNotFound(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    parse_csv(&bytes).map_err(|e| match e {
        DatasetError::Csv(err) => DatasetError::Malformed {
            path: path.display().to_string(),
            message: err.to_string(),
        },
        other => other,
    })
}

/// Parses CSV text with a header row into a [`DataSet`].
pub fn parse_csv(bytes: &[u8]) -> Result<DataSet, DatasetError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DatasetError::NoColumns);
    }

    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(bytes), None)?;
    if inferred.fields().is_empty() {
        return Err(DatasetError::NoColumns);
    }

    let mut types = Vec::with_capacity(inferred.fields().len());
    let mut fields = Vec::with_capacity(inferred.fields().len());
    for field in inferred.fields() {
        let (read_as, data_type) = match field.data_type() {
            ArrowType::Int64 => (ArrowType::Int64, DataType::Int64),
            ArrowType::Float64 => (ArrowType::Float64, DataType::Float64),
            ArrowType::Boolean => (ArrowType::Boolean, DataType::Bool),
            ArrowType::Null => (ArrowType::Utf8, DataType::Float64),
            _ => (ArrowType::Utf8, DataType::Utf8),
        };
        fields.push(Field::new(field.name(), read_as, true));
        types.push(data_type);
    }

    let schema = Arc::new(Schema::new(fields));
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(Cursor::new(bytes))?;

    let mut values: Vec<Vec<Value>> = vec![Vec::new(); types.len()];
    for batch in reader {
        let batch = batch?;
        for (index, array) in batch.columns().iter().enumerate() {
            append_values(array, schema.field(index).name(), &mut values[index])?;
        }
    }

    let columns = schema
        .fields()
        .iter()
        .zip(types)
        .zip(values)
        .map(|((field, data_type), values)| {
            // all-null text reads still carry no values, so the retype is safe
            let values = if data_type == DataType::Float64 && field.data_type() == &ArrowType::Utf8 {
                vec![Value::Null; values.len()]
            } else {
                values
            };
            Column::new(field.name().clone(), data_type, values)
        })
        .collect::<Result<Vec<_>, _>>()?;

    DataSet::new(columns)
}

fn append_values(array: &ArrayRef, name: &str, out: &mut Vec<Value>) -> Result<(), DatasetError> {
    match array.data_type() {
        ArrowType::Int64 => {
            let array = downcast::<Int64Array>(array, name)?;
            out.extend(array.iter().map(|v| v.map(Value::Int64).unwrap_or(Value::Null)));
        }
        ArrowType::Float64 => {
            let array = downcast::<Float64Array>(array, name)?;
            out.extend(array.iter().map(|v| match v {
                Some(f) if !f.is_nan() => Value::Float64(f),
                _ => Value::Null,
            }));
        }
        ArrowType::Boolean => {
            let array = downcast::<BooleanArray>(array, name)?;
            out.extend(array.iter().map(|v| v.map(Value::Bool).unwrap_or(Value::Null)));
        }
        ArrowType::Utf8 => {
            let array = downcast::<StringArray>(array, name)?;
            out.extend(array.iter().map(|v| match v {
                Some(s) if !s.is_empty() => Value::Utf8(s.to_string()),
                _ => Value::Null,
            }));
        }
        other => {
            return Err(DatasetError::TypeMismatch {
                column: name.to_string(),
                expected: "int64, float64, bool or utf8".to_string(),
                actual: other.to_string(),
            })
        }
    }
    Ok(())
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T, DatasetError> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| DatasetError::TypeMismatch {
            column: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            actual: array.data_type().to_string(),
        })
}
