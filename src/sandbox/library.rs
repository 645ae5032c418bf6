//! Table methods available to cleaning procedures.
//!
//! Each method is reachable both as `df.method(args)` and as
//! `table.method(df, args)`. Methods never mutate their receiver.

use std::rc::Rc;

use crate::dataset::{DataSet, Value};
use crate::error::{DatasetError, ScriptError};

use super::interpreter::ScriptValue;

/// Every method a table answers to.
pub const TABLE_METHODS: &[&str] = &[
    "fill_missing",
    "median",
    "mean",
    "mode",
    "drop_column",
    "drop_column_if_exists",
    "drop_columns",
    "drop_duplicates",
    "drop_missing",
    "rename_column",
    "has_column",
    "row_count",
    "column_count",
    "missing_count",
];

pub(crate) fn call_method(
    table: Rc<DataSet>,
    method: &str,
    args: Vec<ScriptValue>,
    line: usize,
) -> Result<ScriptValue, ScriptError> {
    let args = Args {
        method,
        values: args,
        line,
    };
    let fail = |err: DatasetError| ScriptError::runtime(line, err.to_string());

    let value = match method {
        "fill_missing" => {
            args.arity(2, 2)?;
            let fill = args.cell(1)?;
            let result = owned(table).fill_missing(args.str(0)?, &fill).map_err(fail)?;
            ScriptValue::table(result)
        }
        "median" => {
            args.arity(1, 1)?;
            ScriptValue::Float(table.median(args.str(0)?).map_err(fail)?)
        }
        "mean" => {
            args.arity(1, 1)?;
            ScriptValue::Float(table.mean(args.str(0)?).map_err(fail)?)
        }
        "mode" => {
            args.arity(1, 1)?;
            ScriptValue::from(table.mode(args.str(0)?).map_err(fail)?)
        }
        "drop_column" => {
            args.arity(1, 1)?;
            ScriptValue::table(owned(table).drop_column(args.str(0)?).map_err(fail)?)
        }
        "drop_column_if_exists" => {
            args.arity(1, 1)?;
            ScriptValue::table(owned(table).drop_column_if_exists(args.str(0)?))
        }
        "drop_columns" => {
            args.arity(1, 1)?;
            let names = args.str_list(0)?;
            let result = names
                .into_iter()
                .try_fold(owned(table), |acc, name| acc.drop_column(name))
                .map_err(fail)?;
            ScriptValue::table(result)
        }
        "drop_duplicates" => {
            args.arity(0, 0)?;
            ScriptValue::table(owned(table).drop_duplicates())
        }
        "drop_missing" => {
            args.arity(0, 1)?;
            let column = if args.values.is_empty() {
                None
            } else {
                Some(args.str(0)?)
            };
            ScriptValue::table(owned(table).drop_missing(column).map_err(fail)?)
        }
        "rename_column" => {
            args.arity(2, 2)?;
            let result = owned(table)
                .rename_column(args.str(0)?, args.str(1)?)
                .map_err(fail)?;
            ScriptValue::table(result)
        }
        "has_column" => {
            args.arity(1, 1)?;
            ScriptValue::Bool(table.has_column(args.str(0)?))
        }
        "row_count" => {
            args.arity(0, 0)?;
            ScriptValue::Int(table.row_count() as i64)
        }
        "column_count" => {
            args.arity(0, 0)?;
            ScriptValue::Int(table.column_count() as i64)
        }
        "missing_count" => {
            args.arity(1, 1)?;
            let name = args.str(0)?;
            let column = table
                .column(name)
                .ok_or_else(|| fail(DatasetError::ColumnNotFound(name.to_string())))?;
            ScriptValue::Int(column.missing_count() as i64)
        }
        _ => {
            return Err(ScriptError::runtime(
                line,
                format!("table has no method '{}'", method),
            ))
        }
    };
    Ok(value)
}

/// Takes the table out of its handle, copying only if it is still shared.
fn owned(table: Rc<DataSet>) -> DataSet {
    Rc::unwrap_or_clone(table)
}

struct Args<'a> {
    method: &'a str,
    values: Vec<ScriptValue>,
    line: usize,
}

impl Args<'_> {
    fn arity(&self, min: usize, max: usize) -> Result<(), ScriptError> {
        let n = self.values.len();
        if n >= min && n <= max {
            return Ok(());
        }
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        Err(ScriptError::runtime(
            self.line,
            format!(
                "{}() takes {} argument(s), got {}",
                self.method, expected, n
            ),
        ))
    }

    fn str(&self, index: usize) -> Result<&str, ScriptError> {
        match self.values.get(index) {
            Some(ScriptValue::Str(s)) => Ok(s),
            other => Err(self.type_error(index, "string", other)),
        }
    }

    fn str_list(&self, index: usize) -> Result<Vec<&str>, ScriptError> {
        match self.values.get(index) {
            Some(ScriptValue::List(items)) => items
                .iter()
                .map(|item| match item {
                    ScriptValue::Str(s) => Ok(s.as_str()),
                    other => Err(self.type_error(index, "list of strings", Some(other))),
                })
                .collect(),
            other => Err(self.type_error(index, "list of strings", other)),
        }
    }

    fn cell(&self, index: usize) -> Result<Value, ScriptError> {
        match self.values.get(index) {
            Some(ScriptValue::Int(v)) => Ok(Value::Int64(*v)),
            Some(ScriptValue::Float(v)) => Ok(Value::Float64(*v)),
            Some(ScriptValue::Bool(v)) => Ok(Value::Bool(*v)),
            Some(ScriptValue::Str(v)) => Ok(Value::Utf8(v.clone())),
            Some(ScriptValue::Null) => Ok(Value::Null),
            other => Err(self.type_error(index, "scalar value", other)),
        }
    }

    fn type_error(&self, index: usize, expected: &str, got: Option<&ScriptValue>) -> ScriptError {
        ScriptError::runtime(
            self.line,
            format!(
                "argument {} of {}() must be a {}, got {}",
                index + 1,
                self.method,
                expected,
                got.map(ScriptValue::type_name).unwrap_or("nothing")
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn table() -> Rc<DataSet> {
        Rc::new(
            DataSet::new(vec![
                Column::int64("Id", vec![Some(1), Some(2), Some(2)]),
                Column::float64("Age", vec![None, Some(30.0), Some(30.0)]),
                Column::utf8("Cabin", vec![Some("B5"), None, None]),
            ])
            .unwrap(),
        )
    }

    fn s(v: &str) -> ScriptValue {
        ScriptValue::Str(v.to_string())
    }

    fn expect_table(value: ScriptValue) -> Rc<DataSet> {
        match value {
            ScriptValue::Table(t) => t,
            other => panic!("expected table, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_queries() {
        let t = table();
        assert!(matches!(
            call_method(t.clone(), "median", vec![s("Age")], 1).unwrap(),
            ScriptValue::Float(m) if m == 30.0
        ));
        assert!(matches!(
            call_method(t.clone(), "has_column", vec![s("Cabin")], 1).unwrap(),
            ScriptValue::Bool(true)
        ));
        assert!(matches!(
            call_method(t.clone(), "row_count", vec![], 1).unwrap(),
            ScriptValue::Int(3)
        ));
        assert!(matches!(
            call_method(t.clone(), "missing_count", vec![s("Cabin")], 1).unwrap(),
            ScriptValue::Int(2)
        ));
        assert!(matches!(
            call_method(t, "mode", vec![s("Id")], 1).unwrap(),
            ScriptValue::Int(2)
        ));
    }

    #[test]
    fn test_transforms_leave_shared_receiver_untouched() {
        let t = table();
        let dropped = expect_table(
            call_method(t.clone(), "drop_columns", vec![ScriptValue::List(vec![s("Cabin"), s("Id")])], 1)
                .unwrap(),
        );
        assert_eq!(dropped.column_names(), vec!["Age"]);
        assert_eq!(t.column_count(), 3);

        let deduped = expect_table(call_method(t.clone(), "drop_duplicates", vec![], 1).unwrap());
        assert_eq!(deduped.row_count(), 2);
        assert_eq!(t.row_count(), 3);
    }

    #[test]
    fn test_fill_and_drop_missing() {
        let filled = expect_table(
            call_method(table(), "fill_missing", vec![s("Age"), ScriptValue::Int(7)], 1).unwrap(),
        );
        assert_eq!(filled.column("Age").unwrap().missing_count(), 0);

        let kept = expect_table(call_method(table(), "drop_missing", vec![s("Cabin")], 1).unwrap());
        assert_eq!(kept.row_count(), 1);
        let none = expect_table(call_method(table(), "drop_missing", vec![], 1).unwrap());
        assert_eq!(none.row_count(), 0);
    }

    #[test]
    fn test_errors_carry_line() {
        let err = call_method(table(), "dropna", vec![], 4).unwrap_err();
        assert_eq!(
            err,
            ScriptError::runtime(4, "table has no method 'dropna'")
        );

        let err = call_method(table(), "median", vec![], 2).unwrap_err();
        assert!(err.to_string().contains("median() takes 1 argument(s), got 0"));

        let err = call_method(table(), "median", vec![ScriptValue::Int(1)], 2).unwrap_err();
        assert!(err.to_string().contains("must be a string, got integer"));

        let err = call_method(table(), "drop_column", vec![s("Fare")], 3).unwrap_err();
        assert!(matches!(err, ScriptError::Runtime { line: 3, .. }));
    }

    #[test]
    fn test_every_listed_method_is_dispatched() {
        for method in TABLE_METHODS {
            let err = call_method(table(), method, vec![ScriptValue::Null; 5], 1).unwrap_err();
            assert!(
                !err.to_string().contains("has no method"),
                "{} is listed but not dispatched",
                method
            );
        }
    }
}
