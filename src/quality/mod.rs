//! Data-quality profiling.
//!
//! This module computes the [`IssueReport`] that the synthesis stage hands to
//! the model: missing values per column, fully duplicated rows, and the
//! table's shape.

mod report;

pub use report::IssueReport;
