//! Entry point for running untrusted cleaning procedures.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::dataset::DataSet;
use crate::error::ScriptError;

use super::interpreter::{Interpreter, ScriptValue};
use super::parser::parse;

/// Limits and binding names for [`SandboxExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Name the dataset is bound to, and read back from.
    pub result_binding: String,
    /// Name the table library is bound to.
    pub library_binding: String,
    pub max_statements: usize,
    pub max_source_bytes: usize,
    /// Deepest allowed expression nesting.
    pub max_depth: usize,
    pub timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            result_binding: "df".to_string(),
            library_binding: "table".to_string(),
            max_statements: 1000,
            max_source_bytes: 64 * 1024,
            max_depth: 64,
            timeout: Duration::from_secs(10),
        }
    }
}

impl SandboxConfig {
    pub fn with_max_statements(mut self, max_statements: usize) -> Self {
        self.max_statements = max_statements;
        self
    }

    pub fn with_max_source_bytes(mut self, max_source_bytes: usize) -> Self {
        self.max_source_bytes = max_source_bytes;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs cleaning procedures against an owned copy of a dataset.
///
/// A procedure sees exactly two names: the dataset (`df` by default) and
/// the table library (`table`). There is nothing else to call, so it has
/// no way to touch files, the network or other processes.
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Runs `source` with `dataset` bound as the result binding and returns
    /// that binding's final value.
    ///
    /// Blocks the calling thread. Use [`execute_bounded`] from async code.
    ///
    /// [`execute_bounded`]: SandboxExecutor::execute_bounded
    pub fn execute(&self, source: &str, dataset: DataSet) -> Result<DataSet, ScriptError> {
        let config = &self.config;
        if source.len() > config.max_source_bytes {
            return Err(ScriptError::TooLarge {
                size: source.len(),
                limit: config.max_source_bytes,
            });
        }

        let program = parse(source, config.max_depth)?;
        if program.len() > config.max_statements {
            return Err(ScriptError::StatementLimit {
                limit: config.max_statements,
            });
        }
        debug!(statements = program.len(), "Parsed cleaning procedure");

        let mut interpreter = Interpreter::new(&config.library_binding);
        // an unrepresentable deadline leaves the interpreter unbounded
        if let Some(deadline) = Instant::now().checked_add(config.timeout) {
            interpreter = interpreter.with_deadline(deadline, timeout_millis(config.timeout));
        }
        interpreter.bind(&config.result_binding, ScriptValue::table(dataset));
        interpreter.run(&program)?;

        match interpreter.take(&config.result_binding) {
            Some(ScriptValue::Table(table)) => Ok(std::rc::Rc::unwrap_or_clone(table)),
            other => Err(ScriptError::ResultNotTable {
                name: config.result_binding.clone(),
                actual: other
                    .as_ref()
                    .map(ScriptValue::type_name)
                    .unwrap_or("nothing")
                    .to_string(),
            }),
        }
    }

    /// Runs [`execute`] on a blocking worker thread under the configured
    /// timeout.
    ///
    /// A panic on the worker becomes [`ScriptError::Aborted`].
    ///
    /// [`execute`]: SandboxExecutor::execute
    pub async fn execute_bounded(
        &self,
        source: String,
        dataset: DataSet,
    ) -> Result<DataSet, ScriptError> {
        let executor = self.clone();
        let timeout = self.config.timeout;
        let handle = tokio::task::spawn_blocking(move || executor.execute(&source, dataset));

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ScriptError::Aborted(join_error.to_string())),
            Err(_) => Err(ScriptError::Timeout {
                millis: timeout_millis(timeout),
            }),
        }
    }
}

fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, Value};

    fn passengers() -> DataSet {
        DataSet::new(vec![
            Column::int64("PassengerId", vec![Some(1), Some(2), Some(2)]),
            Column::float64("Age", vec![None, Some(38.0), Some(38.0)]),
            Column::utf8("Cabin", vec![None, Some("C85"), Some("C85")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_execute_cleaning_procedure() {
        let source = "\
df = df.fill_missing('Age', df.median('Age'))
df = df.drop_column_if_exists('Cabin')
df = df.drop_duplicates()
";
        let cleaned = SandboxExecutor::default().execute(source, passengers()).unwrap();
        assert_eq!(cleaned.shape(), (2, 2));
        assert_eq!(cleaned.column("Age").unwrap().missing_count(), 0);
        assert_eq!(cleaned.column("Age").unwrap().values()[0], Value::Float64(38.0));
        assert!(!cleaned.has_column("Cabin"));
        assert_eq!(cleaned.duplicate_row_count(), 0);
    }

    #[test]
    fn test_empty_procedure_is_identity() {
        let cleaned = SandboxExecutor::default().execute("", passengers()).unwrap();
        assert_eq!(cleaned, passengers());
    }

    #[test]
    fn test_result_must_be_table() {
        let err = SandboxExecutor::default()
            .execute("df = df.row_count()", passengers())
            .unwrap_err();
        assert_eq!(
            err,
            ScriptError::ResultNotTable {
                name: "df".to_string(),
                actual: "integer".to_string(),
            }
        );
    }

    #[test]
    fn test_size_limit() {
        let executor = SandboxExecutor::new(SandboxConfig::default().with_max_source_bytes(8));
        let err = executor
            .execute("df = df.drop_duplicates()", passengers())
            .unwrap_err();
        assert!(matches!(err, ScriptError::TooLarge { limit: 8, .. }));
    }

    #[test]
    fn test_statement_limit() {
        let executor = SandboxExecutor::new(SandboxConfig::default().with_max_statements(2));
        let err = executor.execute("a = 1\nb = 2\nc = 3", passengers()).unwrap_err();
        assert_eq!(err, ScriptError::StatementLimit { limit: 2 });
    }

    #[test]
    fn test_zero_timeout() {
        let executor = SandboxExecutor::new(SandboxConfig::default().with_timeout(Duration::ZERO));
        let err = executor.execute("df = df.drop_duplicates()", passengers()).unwrap_err();
        assert_eq!(err, ScriptError::Timeout { millis: 0 });
    }

    #[test]
    fn test_python_source_is_rejected() {
        let source = "import pandas as pd\ndf = df.dropna()";
        let err = SandboxExecutor::default().execute(source, passengers()).unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_execute_bounded() {
        let executor = SandboxExecutor::default();
        let cleaned = executor
            .execute_bounded("df = df.drop_duplicates()".to_string(), passengers())
            .await
            .unwrap();
        assert_eq!(cleaned.row_count(), 2);
    }

    #[tokio::test]
    async fn test_execute_bounded_timeout() {
        let executor = SandboxExecutor::new(SandboxConfig::default().with_timeout(Duration::ZERO));
        let err = executor
            .execute_bounded("df = df.drop_duplicates()".to_string(), passengers())
            .await
            .unwrap_err();
        assert_eq!(err, ScriptError::Timeout { millis: 0 });
    }

    #[tokio::test]
    async fn test_deep_nesting_is_rejected() {
        let executor = SandboxExecutor::default();
        for source in [
            format!("x = {}1{}", "(".repeat(32_000), ")".repeat(32_000)),
            format!("x = {}", "[".repeat(32_000)),
        ] {
            assert!(source.len() <= executor.config().max_source_bytes);
            let err = executor
                .execute_bounded(source, passengers())
                .await
                .unwrap_err();
            assert!(
                matches!(err, ScriptError::Syntax { ref message, .. } if message.starts_with("nesting too deep")),
                "{}",
                err
            );
        }
    }

    #[test]
    fn test_max_depth_is_configurable() {
        let source = "df = df.drop_column_if_exists('Cabin').drop_duplicates()";
        assert!(SandboxExecutor::default().execute(source, passengers()).is_ok());

        let shallow = SandboxExecutor::new(SandboxConfig::default().with_max_depth(2));
        assert!(matches!(
            shallow.execute(source, passengers()),
            Err(ScriptError::Syntax { .. })
        ));
    }
}
