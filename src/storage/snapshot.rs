//! SQLite snapshots of datasets.
//!
//! Each snapshot is a plain table whose columns mirror the dataset's, in
//! order, with no index column. Writing a table replaces any previous table
//! of the same name inside a single transaction.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::dataset::{Column, DataSet, DataType, Value};
use crate::error::DatasetError;

/// Errors that can occur while persisting or reading snapshots.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Cannot store table '{0}' with no columns")]
    NoColumns(String),

    #[error("Unsupported column type '{declared}' in table '{table}'")]
    UnsupportedType { table: String, declared: String },

    #[error("Stored table is not a valid dataset: {0}")]
    Dataset(#[from] DatasetError),
}

/// Durable store for raw and cleaned dataset snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    /// Opens (creating if needed) the SQLite database at `path`.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        tracing::info!(path = %path.display(), "Snapshot store opened");
        Ok(Self { pool })
    }

    /// A private in-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self, StorageError> {
        // every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;
        Ok(Self { pool })
    }

    /// Replaces table `name` with the contents of `dataset`.
    ///
    /// Returns the number of rows written.
    pub async fn write_table(&self, name: &str, dataset: &DataSet) -> Result<u64, StorageError> {
        if dataset.column_count() == 0 {
            return Err(StorageError::NoColumns(name.to_string()));
        }

        let table = quote_ident(name);
        let column_defs = dataset
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(c.name()), declared_type(c.data_type())))
            .collect::<Vec<_>>()
            .join(", ");
        let column_names = dataset
            .columns()
            .iter()
            .map(|c| quote_ident(c.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; dataset.column_count()].join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table, column_names, placeholders
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE {} ({})", table, column_defs))
            .execute(&mut *tx)
            .await?;

        for row in 0..dataset.row_count() {
            let mut query = sqlx::query(&insert_sql);
            for column in dataset.columns() {
                query = match &column.values()[row] {
                    Value::Null => query.bind(None::<String>),
                    Value::Int64(v) => query.bind(*v),
                    Value::Float64(v) => query.bind(*v),
                    Value::Bool(v) => query.bind(*v),
                    Value::Utf8(v) => query.bind(v.as_str()),
                };
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;

        let rows = dataset.row_count() as u64;
        tracing::debug!(table = name, rows = rows, columns = dataset.column_count(), "Table written");
        Ok(rows)
    }

    /// Names of all user tables, sorted.
    pub async fn list_tables(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(StorageError::from))
            .collect()
    }

    /// Number of rows in table `name`.
    pub async fn row_count(&self, name: &str) -> Result<u64, StorageError> {
        self.ensure_exists(name).await?;
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", quote_ident(name)))
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("n")?;
        Ok(count as u64)
    }

    /// Reads table `name` back into a dataset, typed by its declared column types.
    pub async fn read_table(&self, name: &str) -> Result<DataSet, StorageError> {
        let table = quote_ident(name);
        let schema = sqlx::query(&format!("PRAGMA table_info({})", table))
            .fetch_all(&self.pool)
            .await?;
        if schema.is_empty() {
            return Err(StorageError::TableNotFound(name.to_string()));
        }

        let mut fields = Vec::with_capacity(schema.len());
        for row in &schema {
            let column: String = row.try_get("name")?;
            let declared: String = row.try_get("type")?;
            let data_type = parse_declared_type(&declared).ok_or_else(|| {
                StorageError::UnsupportedType {
                    table: name.to_string(),
                    declared: declared.clone(),
                }
            })?;
            fields.push((column, data_type));
        }

        let rows = sqlx::query(&format!("SELECT * FROM {}", table))
            .fetch_all(&self.pool)
            .await?;

        let mut values: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); fields.len()];
        for row in &rows {
            for (index, (_, data_type)) in fields.iter().enumerate() {
                let value = match data_type {
                    DataType::Int64 => row.try_get::<Option<i64>, _>(index)?.map(Value::Int64),
                    DataType::Float64 => row.try_get::<Option<f64>, _>(index)?.map(Value::Float64),
                    DataType::Bool => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
                    DataType::Utf8 => row.try_get::<Option<String>, _>(index)?.map(Value::Utf8),
                };
                values[index].push(value.unwrap_or(Value::Null));
            }
        }

        let columns = fields
            .into_iter()
            .zip(values)
            .map(|((column, data_type), values)| Column::new(column, data_type, values))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DataSet::new(columns)?)
    }

    /// Closes all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_exists(&self, name: &str) -> Result<(), StorageError> {
        let found = sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(StorageError::TableNotFound(name.to_string())),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn declared_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int64 => "INTEGER",
        DataType::Float64 => "REAL",
        DataType::Bool => "BOOLEAN",
        DataType::Utf8 => "TEXT",
    }
}

fn parse_declared_type(declared: &str) -> Option<DataType> {
    match declared.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT" | "BIGINT" => Some(DataType::Int64),
        "REAL" | "FLOAT" | "DOUBLE" => Some(DataType::Float64),
        "BOOLEAN" | "BOOL" => Some(DataType::Bool),
        "TEXT" | "VARCHAR" | "" => Some(DataType::Utf8),
        _ => None,
    }
}
