//! Sandboxed execution of cleaning procedures.
//!
//! Procedures are written in a small line-oriented language and run by an
//! interpreter rather than a host-language `eval`. The language offers
//! assignments, literals and method calls on tables, and nothing else.
//!
//! ```text
//! # fill ages, drop cabins, dedupe
//! median_age = df.median("Age")
//! df = df.fill_missing("Age", median_age)
//! df = table.drop_column_if_exists(df, "Cabin").drop_duplicates()
//! ```
//!
//! See [`library::TABLE_METHODS`] for the methods a table answers to.

mod executor;
mod interpreter;
mod lexer;
pub mod library;
mod parser;

pub use executor::{SandboxConfig, SandboxExecutor};
