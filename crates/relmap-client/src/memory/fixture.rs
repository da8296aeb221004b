//! TOML fixtures for the memory backend.
//!
//! ```toml
//! name = "shop"
//!
//! [[tables]]
//! name = "users"
//! columns = [
//!     { name = "id", type = "int", primary_key = true },
//!     { name = "name", type = "varchar(64)" },
//! ]
//! rows = [{ id = 1, name = "Ann" }]
//! ```
//!
//! A column missing from a row is NULL.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::Value;

use super::{MemoryColumn, MemoryDatabase, MemoryForeignKey, MemoryTable};

/// A parsed fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    /// Database name.
    pub name: String,
    /// Optional `VERSION()` override.
    #[serde(default)]
    pub version: Option<String>,
    /// Tables, created in file order.
    #[serde(default)]
    pub tables: Vec<FixtureTable>,
}

/// One `[[tables]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureTable {
    /// Table name.
    pub name: String,
    /// Columns in definition order.
    pub columns: Vec<MemoryColumn>,
    /// Outgoing foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<MemoryForeignKey>,
    /// Rows keyed by column name.
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, Value>>,
    /// Reported index length in bytes.
    #[serde(default)]
    pub index_length: u64,
}

impl FixtureTable {
    fn into_table(self) -> RelmapResult<MemoryTable> {
        let mut rows = Vec::with_capacity(self.rows.len());
        for (i, mut cells) in self.rows.into_iter().enumerate() {
            let row = self
                .columns
                .iter()
                .map(|col| cells.remove(&col.name).unwrap_or(Value::Null))
                .collect();
            if let Some(extra) = cells.keys().next() {
                return Err(RelmapError::Config {
                    message: format!(
                        "row {} of table '{}' names unknown column '{}'",
                        i + 1,
                        self.name,
                        extra
                    ),
                });
            }
            rows.push(row);
        }

        Ok(MemoryTable {
            name: self.name,
            columns: self.columns,
            foreign_keys: self.foreign_keys,
            rows,
            index_length: self.index_length,
        })
    }
}

impl Fixture {
    /// Parses a fixture from TOML text.
    pub fn from_toml(content: &str) -> RelmapResult<Self> {
        toml::from_str(content).map_err(|e| RelmapError::Config {
            message: format!("invalid fixture: {}", e),
        })
    }

    /// Builds a database holding the fixture's tables.
    pub fn build(self) -> RelmapResult<MemoryDatabase> {
        let mut db = MemoryDatabase::new(self.name);
        if let Some(version) = self.version {
            db = db.with_version(version);
        }
        for table in self.tables {
            db.create_table(table.into_table()?)?;
        }
        Ok(db)
    }
}

impl MemoryDatabase {
    /// Loads a database from a TOML fixture file.
    pub fn from_fixture(path: &Path) -> RelmapResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_fixture_str(&content)
    }

    /// Loads a database from TOML fixture text.
    pub fn from_fixture_str(content: &str) -> RelmapResult<Self> {
        Fixture::from_toml(content)?.build()
    }
}
