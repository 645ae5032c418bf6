//! Table transformations and column statistics.
//!
//! Transformations consume the dataset and return a new one. Nothing here
//! mutates a table that another owner can still observe.

use std::collections::HashMap;

use super::types::{CellKey, Column, DataSet, DataType, Value};
use crate::error::DatasetError;

impl DataSet {
    /// Replaces missing cells in `column` with `fill`.
    ///
    /// An integer column filled with a fractional or out-of-range number is
    /// widened to `float64`; a float column accepts integer fills.
    pub fn fill_missing(self, column: &str, fill: &Value) -> Result<Self, DatasetError> {
        let index = self.column_index(column)?;
        let (mut columns, rows) = self.into_columns();
        let (name, data_type, values) = columns.remove(index).into_parts();

        let (data_type, fill, values) = match (data_type, fill) {
            (_, Value::Null) => {
                return Err(DatasetError::TypeMismatch {
                    column: name,
                    expected: data_type.to_string(),
                    actual: "null".to_string(),
                })
            }
            (DataType::Int64, Value::Float64(f)) if !fits_i64(*f) => {
                let widened = values
                    .into_iter()
                    .map(|v| match v {
                        Value::Int64(i) => Value::Float64(i as f64),
                        other => other,
                    })
                    .collect();
                (DataType::Float64, Value::Float64(*f), widened)
            }
            (DataType::Int64, Value::Float64(f)) => {
                (DataType::Int64, Value::Int64(*f as i64), values)
            }
            (DataType::Float64, Value::Int64(i)) => {
                (DataType::Float64, Value::Float64(*i as f64), values)
            }
            (t, v) if v.data_type() == Some(t) => (t, v.clone(), values),
            (t, v) => {
                return Err(DatasetError::TypeMismatch {
                    column: name,
                    expected: t.to_string(),
                    actual: v.type_name().to_string(),
                })
            }
        };

        let values = values
            .into_iter()
            .map(|v| if v.is_null() { fill.clone() } else { v })
            .collect();
        columns.insert(index, Column::new(name, data_type, values)?);
        Self::with_row_count(columns, rows)
    }

    /// Removes `column`, failing if it does not exist.
    pub fn drop_column(self, column: &str) -> Result<Self, DatasetError> {
        let index = self.column_index(column)?;
        let (mut columns, rows) = self.into_columns();
        columns.remove(index);
        Self::with_row_count(columns, rows)
    }

    /// Removes `column` when present; otherwise returns the table unchanged.
    pub fn drop_column_if_exists(self, column: &str) -> Self {
        match self.column_index(column) {
            Ok(index) => {
                let (mut columns, rows) = self.into_columns();
                columns.remove(index);
                Self::from_parts(columns, rows)
            }
            Err(_) => self,
        }
    }

    /// Drops every row that repeats an earlier row, keeping first occurrences.
    pub fn drop_duplicates(self) -> Self {
        let keep: Vec<bool> = self.duplicate_mask().into_iter().map(|d| !d).collect();
        self.retain_rows(&keep)
    }

    /// Drops rows with a missing value in `column`, or in any column when
    /// `column` is `None`.
    pub fn drop_missing(self, column: Option<&str>) -> Result<Self, DatasetError> {
        let keep: Vec<bool> = match column {
            Some(name) => {
                let index = self.column_index(name)?;
                self.columns()[index]
                    .values()
                    .iter()
                    .map(|v| !v.is_null())
                    .collect()
            }
            None => (0..self.row_count())
                .map(|i| self.columns().iter().all(|c| !c.values()[i].is_null()))
                .collect(),
        };
        Ok(self.retain_rows(&keep))
    }

    /// Renames `from` to `to`, preserving column position.
    pub fn rename_column(self, from: &str, to: &str) -> Result<Self, DatasetError> {
        let index = self.column_index(from)?;
        if from != to && self.has_column(to) {
            return Err(DatasetError::DuplicateColumn(to.to_string()));
        }
        let (mut columns, rows) = self.into_columns();
        columns[index].rename(to);
        Self::with_row_count(columns, rows)
    }

    /// Median of the non-missing values of a numeric column.
    pub fn median(&self, column: &str) -> Result<f64, DatasetError> {
        let mut values = self.numeric_values(column, "median")?;
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Ok((values[mid - 1] + values[mid]) / 2.0)
        } else {
            Ok(values[mid])
        }
    }

    /// Arithmetic mean of the non-missing values of a numeric column.
    pub fn mean(&self, column: &str) -> Result<f64, DatasetError> {
        let values = self.numeric_values(column, "mean")?;
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Most frequent non-missing value; ties resolve to the smallest value.
    pub fn mode(&self, column: &str) -> Result<Value, DatasetError> {
        let col = &self.columns()[self.column_index(column)?];
        let mut counts: HashMap<CellKey<'_>, (usize, &Value)> = HashMap::new();
        for value in col.values().iter().filter(|v| !v.is_null()) {
            counts.entry(value.key()).or_insert((0, value)).0 += 1;
        }
        counts
            .into_values()
            .max_by(|(ca, va), (cb, vb)| ca.cmp(cb).then_with(|| vb.compare(va)))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| DatasetError::EmptyStatistic {
                column: column.to_string(),
                statistic: "mode".to_string(),
            })
    }

    fn numeric_values(&self, column: &str, statistic: &str) -> Result<Vec<f64>, DatasetError> {
        let col = &self.columns()[self.column_index(column)?];
        if !col.data_type().is_numeric() {
            return Err(DatasetError::TypeMismatch {
                column: column.to_string(),
                expected: "numeric".to_string(),
                actual: col.data_type().to_string(),
            });
        }
        let values: Vec<f64> = col.values().iter().filter_map(Value::as_f64).collect();
        if values.is_empty() {
            return Err(DatasetError::EmptyStatistic {
                column: column.to_string(),
                statistic: statistic.to_string(),
            });
        }
        Ok(values)
    }

    fn retain_rows(self, keep: &[bool]) -> Self {
        let row_count = keep.iter().filter(|k| **k).count();
        let (columns, _) = self.into_columns();
        let columns = columns
            .into_iter()
            .map(|column| {
                let (name, data_type, values) = column.into_parts();
                let values = values
                    .into_iter()
                    .zip(keep)
                    .filter_map(|(v, k)| k.then_some(v))
                    .collect();
                Column::from_parts(name, data_type, values)
            })
            .collect();
        Self::from_parts(columns, row_count)
    }
}

/// Whether `f` converts to `i64` without losing its value.
fn fits_i64(f: f64) -> bool {
    // i64::MAX rounds up to 2^63, which is itself out of range
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passengers() -> DataSet {
        DataSet::new(vec![
            Column::int64("PassengerId", vec![Some(1), Some(2), Some(2), Some(3)]),
            Column::int64("Age", vec![None, Some(30), Some(30), Some(21)]),
            Column::utf8("Cabin", vec![None, Some("C85"), Some("C85"), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_median_even_and_odd() {
        let ds = passengers();
        // non-missing ages: 30, 30, 21
        assert_eq!(ds.median("Age").unwrap(), 30.0);

        let ds = DataSet::new(vec![Column::float64(
            "x",
            vec![Some(4.0), Some(1.0), Some(3.0), Some(2.0)],
        )])
        .unwrap();
        assert_eq!(ds.median("x").unwrap(), 2.5);
    }

    #[test]
    fn test_median_rejects_text_and_empty() {
        let ds = passengers();
        assert!(matches!(
            ds.median("Cabin"),
            Err(DatasetError::TypeMismatch { .. })
        ));

        let empty = DataSet::new(vec![Column::float64("x", vec![None, None])]).unwrap();
        assert!(matches!(
            empty.median("x"),
            Err(DatasetError::EmptyStatistic { .. })
        ));
    }

    #[test]
    fn test_mean_and_mode() {
        let ds = passengers();
        assert_eq!(ds.mean("Age").unwrap(), 27.0);
        assert_eq!(ds.mode("Age").unwrap(), Value::Int64(30));
        assert_eq!(ds.mode("Cabin").unwrap(), Value::Utf8("C85".to_string()));

        let tie = DataSet::new(vec![Column::utf8("c", vec![Some("b"), Some("a")])]).unwrap();
        assert_eq!(tie.mode("c").unwrap(), Value::Utf8("a".to_string()));
    }

    #[test]
    fn test_fill_missing_widens_int_column() {
        let ds = DataSet::new(vec![Column::int64("Age", vec![None, Some(20), Some(21)])]).unwrap();
        let median = ds.median("Age").unwrap();
        let filled = ds.fill_missing("Age", &Value::Float64(median)).unwrap();
        let age = filled.column("Age").unwrap();
        assert_eq!(age.data_type(), DataType::Float64);
        assert_eq!(
            age.values(),
            &[Value::Float64(20.5), Value::Float64(20.0), Value::Float64(21.0)]
        );
    }

    #[test]
    fn test_fill_missing_keeps_int_for_integral_fill() {
        let filled = passengers()
            .fill_missing("Age", &Value::Float64(30.0))
            .unwrap();
        let age = filled.column("Age").unwrap();
        assert_eq!(age.data_type(), DataType::Int64);
        assert_eq!(age.missing_count(), 0);
        assert_eq!(age.values()[0], Value::Int64(30));
    }

    #[test]
    fn test_fill_missing_widens_for_out_of_range_fill() {
        for fill in [1e20, -1e20, 9_223_372_036_854_775_808.0] {
            let filled = passengers().fill_missing("Age", &Value::Float64(fill)).unwrap();
            let age = filled.column("Age").unwrap();
            assert_eq!(age.data_type(), DataType::Float64);
            assert_eq!(age.values()[0], Value::Float64(fill));
            assert_eq!(age.values()[1], Value::Float64(30.0));
        }

        let filled = passengers()
            .fill_missing("Age", &Value::Float64(-9_223_372_036_854_775_808.0))
            .unwrap();
        let age = filled.column("Age").unwrap();
        assert_eq!(age.data_type(), DataType::Int64);
        assert_eq!(age.values()[0], Value::Int64(i64::MIN));
    }

    #[test]
    fn test_fill_missing_type_mismatch() {
        let result = passengers().fill_missing("Cabin", &Value::Int64(1));
        assert!(matches!(result, Err(DatasetError::TypeMismatch { .. })));

        let result = passengers().fill_missing("Age", &Value::Null);
        assert!(matches!(result, Err(DatasetError::TypeMismatch { .. })));
    }

    #[test]
    fn test_drop_column_variants() {
        let ds = passengers().drop_column("Cabin").unwrap();
        assert_eq!(ds.column_names(), vec!["PassengerId", "Age"]);

        assert!(matches!(
            ds.clone().drop_column("Cabin"),
            Err(DatasetError::ColumnNotFound(_))
        ));
        let unchanged = ds.clone().drop_column_if_exists("Cabin");
        assert_eq!(unchanged, ds);
    }

    #[test]
    fn test_drop_all_columns_keeps_row_count() {
        let ds = passengers()
            .drop_column("PassengerId")
            .unwrap()
            .drop_column("Age")
            .unwrap()
            .drop_column("Cabin")
            .unwrap();
        assert_eq!(ds.shape(), (4, 0));
    }

    #[test]
    fn test_drop_duplicates_keeps_first() {
        let ds = passengers().drop_duplicates();
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.duplicate_row_count(), 0);
        assert_eq!(
            ds.column("PassengerId").unwrap().values(),
            &[Value::Int64(1), Value::Int64(2), Value::Int64(3)]
        );
    }

    #[test]
    fn test_drop_missing() {
        let ds = passengers().drop_missing(Some("Age")).unwrap();
        assert_eq!(ds.row_count(), 3);

        let ds = passengers().drop_missing(None).unwrap();
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn test_rename_column() {
        let ds = passengers().rename_column("Age", "age_years").unwrap();
        assert_eq!(ds.column_names(), vec!["PassengerId", "age_years", "Cabin"]);

        let result = passengers().rename_column("Age", "Cabin");
        assert!(matches!(result, Err(DatasetError::DuplicateColumn(_))));
    }
}
