//! In-memory tabular data.
//!
//! This module provides the [`DataSet`] threaded through the pipeline:
//!
//! - **Types**: typed columns with nullable cells
//! - **Ingest**: CSV loading with per-column type inference
//! - **Ops**: cleaning transformations (fill, drop, dedupe, rename) and
//!   column statistics (median, mean, mode)
//!
//! # Example
//!
//! ```rust,ignore
//! use datawash::dataset::{load_csv, Value};
//!
//! let ds = load_csv(Path::new("passengers.csv")).await?;
//! let median = ds.median("Age")?;
//! let cleaned = ds
//!     .fill_missing("Age", &Value::Float64(median))?
//!     .drop_column_if_exists("Cabin")
//!     .drop_duplicates();
//! ```

pub mod ingest;
pub mod ops;
pub mod types;

pub use ingest::{load_csv, parse_csv};
pub use types::{Column, DataSet, DataType, Value};
