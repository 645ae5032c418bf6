//! datawash: model-guided cleaning for tabular datasets.
//!
//! This library loads a CSV dataset, reports its quality issues, obtains a
//! cleaning procedure from a language model (or from fixed rules), runs the
//! procedure in a sandbox and stores raw and clean snapshots in SQLite.

pub mod cli;
pub mod dataset;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod quality;
pub mod sandbox;
pub mod storage;
pub mod synthesis;

// Re-export commonly used error types
pub use error::{DatasetError, LlmError, ScriptError};
