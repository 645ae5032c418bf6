//! SQLite persistence for dataset snapshots.
//!
//! # Usage
//!
//! ```rust,ignore
//! use datawash::storage::SnapshotStore;
//!
//! let store = SnapshotStore::open(Path::new("pipeline.db")).await?;
//! store.write_table("dataset_raw", &dataset).await?;
//! assert_eq!(store.row_count("dataset_raw").await?, dataset.row_count() as u64);
//! ```

pub mod snapshot;

pub use snapshot::{SnapshotStore, StorageError};
