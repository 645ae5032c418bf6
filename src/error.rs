//! Error types for datawash operations.
//!
//! Defines the error types shared across subsystems:
//! - Dataset loading and table manipulation
//! - LLM API interactions
//! - Cleaning script parsing and interpretation
//!
//! Subsystem-local errors (configuration, storage, synthesis, pipeline wiring)
//! live next to the code that raises them.

use thiserror::Error;

/// Errors that can occur while loading or manipulating a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset source not found: {0}")]
    SourceNotFound(String),

    #[error("Malformed dataset source '{path}': {message}")]
    Malformed { path: String, message: String },

    #[error("Dataset has no columns")]
    NoColumns,

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch in column '{column}': expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("Column '{column}' has no non-missing values to compute {statistic}")]
    EmptyStatistic { column: String, statistic: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] arrow::error::ArrowError),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API base URL: LLM_API_BASE (or AZURE_ENDPOINT) environment variable not set")]
    MissingApiBase,

    #[error("Missing API version: Azure endpoints require LLM_API_VERSION (or API_VERSION)")]
    MissingApiVersion,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM response contained no content")]
    EmptyResponse,
}

/// Errors raised while parsing or interpreting a cleaning script.
///
/// Every variant is recoverable from the pipeline's point of view: the apply
/// stage turns it into a fallback outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScriptError {
    #[error("Procedure is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Runtime error at line {line}: {message}")]
    Runtime { line: usize, message: String },

    #[error("Procedure exceeded the limit of {limit} statements")]
    StatementLimit { limit: usize },

    #[error("Binding '{name}' holds a {actual}, expected a table")]
    ResultNotTable { name: String, actual: String },

    #[error("Procedure timed out after {millis} ms")]
    Timeout { millis: u64 },

    #[error("Procedure worker aborted: {0}")]
    Aborted(String),
}

impl ScriptError {
    pub(crate) fn runtime(line: usize, message: impl Into<String>) -> Self {
        Self::Runtime {
            line,
            message: message.into(),
        }
    }
}
