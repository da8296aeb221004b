//! Embedded in-memory backend.
//!
//! [`MemoryDatabase`] holds tables, rows, and foreign keys and answers the
//! MySQL-flavoured SQL the engine issues. It backs the command-line tool's
//! fixture mode and every test in the workspace.
//!
//! # Example
//!
//! ```rust
//! use relmap_client::memory::{MemoryColumn, MemoryDatabase, MemoryTable};
//! use relmap_client::Connection;
//! use relmap_common::types::Value;
//!
//! let db = MemoryDatabase::new("shop");
//! db.create_table(
//!     MemoryTable::new("users")
//!         .with_column(MemoryColumn::new("id", "int").primary_key())
//!         .with_column(MemoryColumn::new("name", "varchar(64)")),
//! )
//! .unwrap();
//! db.insert("users", vec![Value::from(1), Value::from("Ann")]).unwrap();
//!
//! let mut conn = db.connect();
//! let rows = conn
//!     .query("SELECT * FROM `users` WHERE `id` = ?", &[Value::from(1)])
//!     .unwrap();
//! assert_eq!(rows.len(), 1);
//! ```

mod executor;
mod fixture;
mod parser;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use relmap_common::config::ConnectionConfig;
use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::{Row, Value};

use crate::connection::{Connection, ConnectionState, Connector};

pub use fixture::{Fixture, FixtureTable};

/// Page size used to estimate storage lengths.
const PAGE_SIZE: u64 = 16 * 1024;

/// Version string reported by `VERSION()` unless overridden.
pub const DEFAULT_VERSION: &str = "8.0.36-relmap-memory";

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemoryColumn {
    /// Column name.
    pub name: String,
    /// Declared SQL type.
    #[serde(rename = "type")]
    pub declared_type: String,
    /// Whether NULL is accepted.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
}

fn default_nullable() -> bool {
    true
}

impl MemoryColumn {
    /// Creates a nullable column.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            primary_key: false,
        }
    }

    /// Rejects NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Adds the column to the primary key. Key columns are NOT NULL.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// A foreign key from one column to a column of another table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemoryForeignKey {
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub references: String,
    /// Referenced column.
    #[serde(default = "default_referenced_column")]
    pub referenced_column: String,
}

fn default_referenced_column() -> String {
    "id".to_string()
}

/// A table: definition plus rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    /// Table name.
    pub name: String,
    /// Columns in definition order.
    pub columns: Vec<MemoryColumn>,
    /// Outgoing foreign keys.
    pub foreign_keys: Vec<MemoryForeignKey>,
    /// Rows in insertion order.
    pub rows: Vec<Row>,
    /// Reported index length in bytes.
    pub index_length: u64,
}

impl MemoryTable {
    /// Creates an empty table with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            rows: Vec::new(),
            index_length: 0,
        }
    }

    /// Appends a column.
    pub fn with_column(mut self, column: MemoryColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a foreign key from `column` to `references.referenced_column`.
    pub fn with_foreign_key(
        mut self,
        column: impl Into<String>,
        references: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(MemoryForeignKey {
            column: column.into(),
            references: references.into(),
            referenced_column: referenced_column.into(),
        });
        self
    }

    /// Sets the reported index length.
    pub fn with_index_length(mut self, bytes: u64) -> Self {
        self.index_length = bytes;
        self
    }

    /// Estimated data length: whole pages, at least one.
    pub fn data_length(&self) -> u64 {
        let bytes: u64 = self
            .rows
            .iter()
            .flat_map(|row| row.iter())
            .map(value_size)
            .sum();
        bytes.div_ceil(PAGE_SIZE).max(1) * PAGE_SIZE
    }

    fn validate(&self) -> RelmapResult<()> {
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.to_lowercase()) {
                return Err(RelmapError::query(format!(
                    "Duplicate column name '{}'",
                    col.name
                )));
            }
        }
        for fk in &self.foreign_keys {
            if !self.columns.iter().any(|c| c.name == fk.column) {
                return Err(RelmapError::query(format!(
                    "Key column '{}' doesn't exist in table '{}'",
                    fk.column, self.name
                )));
            }
        }
        Ok(())
    }

    fn check_row(&self, row: &Row) -> RelmapResult<()> {
        if row.len() != self.columns.len() {
            return Err(RelmapError::query(format!(
                "Column count doesn't match value count for table '{}': expected {}, got {}",
                self.name,
                self.columns.len(),
                row.len()
            )));
        }
        for (col, value) in self.columns.iter().zip(row) {
            if value.is_null() && !col.nullable {
                return Err(RelmapError::query(format!(
                    "Column '{}' cannot be null",
                    col.name
                )));
            }
        }
        Ok(())
    }
}

fn value_size(value: &Value) -> u64 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Integer(_) | Value::Float(_) => 8,
        Value::String(s) => s.len() as u64,
        Value::Bytes(b) => b.len() as u64,
    }
}

/// Shared database state.
#[derive(Debug)]
pub(crate) struct DatabaseState {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) tables: BTreeMap<String, MemoryTable>,
}

impl DatabaseState {
    pub(crate) fn table(&self, name: &str) -> RelmapResult<&MemoryTable> {
        self.tables.get(name).ok_or_else(|| {
            RelmapError::query(format!("Table '{}.{}' doesn't exist", self.name, name))
        })
    }
}

/// An in-memory database.
///
/// Cloning is cheap; clones share the same tables.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    inner: Arc<RwLock<DatabaseState>>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DatabaseState {
                name: name.into(),
                version: DEFAULT_VERSION.to_string(),
                tables: BTreeMap::new(),
            })),
        }
    }

    /// Sets the version string reported by `VERSION()`.
    pub fn with_version(self, version: impl Into<String>) -> Self {
        self.inner.write().version = version.into();
        self
    }

    /// Returns the database name.
    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }

    /// Returns the version string.
    pub fn version(&self) -> String {
        self.inner.read().version.clone()
    }

    /// Creates a table. Rows already present on `table` are validated.
    pub fn create_table(&self, table: MemoryTable) -> RelmapResult<()> {
        table.validate()?;
        for row in &table.rows {
            table.check_row(row)?;
        }

        let mut state = self.inner.write();
        if state.tables.contains_key(&table.name) {
            return Err(RelmapError::query(format!(
                "Table '{}' already exists",
                table.name
            )));
        }
        debug!(table = %table.name, columns = table.columns.len(), "created memory table");
        state.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Drops a table.
    pub fn drop_table(&self, name: &str) -> RelmapResult<()> {
        let mut state = self.inner.write();
        state.table(name)?;
        state.tables.remove(name);
        Ok(())
    }

    /// Appends a row to `table`.
    pub fn insert(&self, table: &str, row: Row) -> RelmapResult<()> {
        let mut state = self.inner.write();
        state.table(table)?.check_row(&row)?;
        if let Some(t) = state.tables.get_mut(table) {
            t.rows.push(row);
        }
        Ok(())
    }

    /// Lists table names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        self.inner.read().tables.keys().cloned().collect()
    }

    /// Returns the number of rows in `table`.
    pub fn row_count(&self, table: &str) -> RelmapResult<usize> {
        Ok(self.inner.read().table(table)?.rows.len())
    }

    /// Opens a connection without going through a [`Connector`].
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            db: self.clone(),
            state: ConnectionState::Connected,
        }
    }

    /// Returns a connector that opens connections to this database.
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector { db: self.clone() }
    }

    fn run(&self, sql: &str, params: &[Value]) -> RelmapResult<Vec<Row>> {
        let request = parser::parse(sql)?;
        let state = self.inner.read();
        executor::execute(&state, &request, params)
    }
}

/// Opens [`MemoryConnection`]s after validating connection parameters.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    db: MemoryDatabase,
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &ConnectionConfig) -> RelmapResult<Box<dyn Connection>> {
        config.validate()?;

        let name = self.db.name();
        if config.database != name {
            return Err(RelmapError::Validation {
                message: format!("unknown database '{}'", config.database),
            });
        }

        debug!(host = %config.host, user = %config.user, database = %name, "opened memory connection");
        Ok(Box::new(self.db.connect()))
    }
}

/// A connection to a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
    state: ConnectionState,
}

impl Connection for MemoryConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> RelmapResult<Vec<Row>> {
        if self.state != ConnectionState::Connected {
            return Err(RelmapError::NotConnected);
        }
        debug!(sql, params = params.len(), "memory query");
        self.db.run(sql, params)
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn disconnect(&mut self) -> RelmapResult<()> {
        if self.state != ConnectionState::Connected {
            return Err(RelmapError::NotConnected);
        }
        self.state = ConnectionState::Closed;
        Ok(())
    }
}
