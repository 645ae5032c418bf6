//! Tree-walking interpreter over a capability-scoped binding table.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use crate::dataset::{DataSet, Value};
use crate::error::ScriptError;

use super::library::call_method;
use super::parser::{Expr, Literal, Statement, StatementKind};

/// A runtime value.
#[derive(Debug, Clone)]
pub(crate) enum ScriptValue {
    Table(Rc<DataSet>),
    /// The table library binding.
    Library,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<ScriptValue>),
}

impl ScriptValue {
    pub(crate) fn table(dataset: DataSet) -> Self {
        ScriptValue::Table(Rc::new(dataset))
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Table(_) => "table",
            ScriptValue::Library => "library",
            ScriptValue::Str(_) => "string",
            ScriptValue::Int(_) => "integer",
            ScriptValue::Float(_) => "float",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Null => "null",
            ScriptValue::List(_) => "list",
        }
    }
}

impl From<Value> for ScriptValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ScriptValue::Null,
            Value::Int64(v) => ScriptValue::Int(v),
            Value::Float64(v) => ScriptValue::Float(v),
            Value::Bool(v) => ScriptValue::Bool(v),
            Value::Utf8(v) => ScriptValue::Str(v),
        }
    }
}

/// Runs parsed statements against a set of bindings.
///
/// The only names a procedure can reach are the ones bound before [`run`]
/// and the ones it assigns itself.
///
/// [`run`]: Interpreter::run
pub(crate) struct Interpreter {
    bindings: HashMap<String, ScriptValue>,
    library: String,
    deadline: Option<(Instant, u64)>,
}

impl Interpreter {
    /// An interpreter exposing the table library under `library`.
    pub(crate) fn new(library: &str) -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(library.to_string(), ScriptValue::Library);
        Self {
            bindings,
            library: library.to_string(),
            deadline: None,
        }
    }

    /// Abort with [`ScriptError::Timeout`] once `deadline` passes.
    pub(crate) fn with_deadline(mut self, deadline: Instant, millis: u64) -> Self {
        self.deadline = Some((deadline, millis));
        self
    }

    pub(crate) fn bind(&mut self, name: &str, value: ScriptValue) {
        self.bindings.insert(name.to_string(), value);
    }

    /// Removes and returns a binding.
    pub(crate) fn take(&mut self, name: &str) -> Option<ScriptValue> {
        self.bindings.remove(name)
    }

    pub(crate) fn run(&mut self, program: &[Statement]) -> Result<(), ScriptError> {
        for statement in program {
            self.check_deadline()?;
            match &statement.kind {
                StatementKind::Assign { name, value } => {
                    if *name == self.library {
                        return Err(ScriptError::runtime(
                            statement.line,
                            format!("'{}' cannot be reassigned", name),
                        ));
                    }
                    let value = self.eval(value, statement.line)?;
                    self.bindings.insert(name.clone(), value);
                }
                StatementKind::Expr(expr) => {
                    self.eval(expr, statement.line)?;
                }
            }
        }
        Ok(())
    }

    fn check_deadline(&self) -> Result<(), ScriptError> {
        match self.deadline {
            Some((deadline, millis)) if Instant::now() >= deadline => {
                Err(ScriptError::Timeout { millis })
            }
            _ => Ok(()),
        }
    }

    fn eval(&self, expr: &Expr, line: usize) -> Result<ScriptValue, ScriptError> {
        match expr {
            Expr::Name(name) => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| ScriptError::runtime(line, format!("unknown name '{}'", name))),
            Expr::Literal(literal) => Ok(match literal {
                Literal::Str(v) => ScriptValue::Str(v.clone()),
                Literal::Int(v) => ScriptValue::Int(*v),
                Literal::Float(v) => ScriptValue::Float(*v),
                Literal::Bool(v) => ScriptValue::Bool(*v),
                Literal::Null => ScriptValue::Null,
            }),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item, line))
                .collect::<Result<Vec<_>, _>>()
                .map(ScriptValue::List),
            Expr::Call {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver, line)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, line))
                    .collect::<Result<Vec<_>, _>>()?;
                self.check_deadline()?;
                self.call(receiver, method, args, line)
            }
        }
    }

    fn call(
        &self,
        receiver: ScriptValue,
        method: &str,
        mut args: Vec<ScriptValue>,
        line: usize,
    ) -> Result<ScriptValue, ScriptError> {
        match receiver {
            ScriptValue::Table(table) => call_method(table, method, args, line),
            ScriptValue::Library => {
                if args.is_empty() {
                    return Err(ScriptError::runtime(
                        line,
                        format!("{}.{}() expects a table as its first argument", self.library, method),
                    ));
                }
                match args.remove(0) {
                    ScriptValue::Table(table) => call_method(table, method, args, line),
                    other => Err(ScriptError::runtime(
                        line,
                        format!(
                            "{}.{}() expects a table as its first argument, got {}",
                            self.library,
                            method,
                            other.type_name()
                        ),
                    )),
                }
            }
            other => Err(ScriptError::runtime(
                line,
                format!("{} has no method '{}'", other.type_name(), method),
            )),
        }
    }
}
