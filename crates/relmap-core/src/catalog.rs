//! Table and column metadata read from the backing store.
//!
//! Nothing is cached: every call re-queries the store, so schema changes
//! between calls are always visible.

use tracing::debug;

use relmap_client::{quote_identifier, Connection};
use relmap_common::constants::bytes_to_megabytes;
use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::{ForeignKeyEdge, Row, TableDescriptor, Value};

const TABLE_LENGTHS: &str = "SELECT DATA_LENGTH, INDEX_LENGTH FROM information_schema.TABLES \
                             WHERE TABLE_SCHEMA = ?";

const FOREIGN_KEY_COLUMNS: &str = "SELECT TABLE_NAME, COLUMN_NAME, \
                                   REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME \
                                   FROM information_schema.KEY_COLUMN_USAGE";

/// Metadata queries over one connection.
pub struct SchemaCatalog<'c> {
    conn: &'c mut dyn Connection,
}

impl<'c> SchemaCatalog<'c> {
    /// Wraps a connection.
    pub fn new(conn: &'c mut dyn Connection) -> Self {
        Self { conn }
    }

    /// Runs a statement on the underlying connection.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> RelmapResult<Vec<Row>> {
        debug!(sql, params = params.len(), "catalog query");
        self.conn.query(sql, params)
    }

    fn single_value(&mut self, sql: &str) -> RelmapResult<Value> {
        self.query(sql, &[])?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| RelmapError::NoData {
                what: sql.to_string(),
            })
    }

    /// Returns the name of the current database.
    pub fn database_name(&mut self) -> RelmapResult<String> {
        match self.single_value("SELECT DATABASE()")? {
            Value::Null => Err(RelmapError::NoData {
                what: "current database".to_string(),
            }),
            value => Ok(value.to_string()),
        }
    }

    /// Returns `Name: <database>, Version: <version>`.
    pub fn engine_info(&mut self) -> RelmapResult<String> {
        let name = self.database_name()?;
        let version = self.single_value("SELECT VERSION()")?;
        Ok(format!("Name: {}, Version: {}", name, version))
    }

    /// Returns the names of the tables in the current database.
    pub fn table_names(&mut self) -> RelmapResult<Vec<String>> {
        self.query("SHOW TABLES", &[])?
            .into_iter()
            .map(|row| match row.into_iter().next() {
                Some(Value::String(name)) => Ok(name),
                other => Err(RelmapError::query(format!(
                    "unexpected SHOW TABLES row: {:?}",
                    other
                ))),
            })
            .collect()
    }

    /// Returns true if `table` exists.
    pub fn has_table(&mut self, table: &str) -> RelmapResult<bool> {
        Ok(self.table_names()?.iter().any(|t| t == table))
    }

    /// Describes `table`.
    ///
    /// Fails with `UnknownTable` if the current database has no such table.
    pub fn describe(&mut self, table: &str) -> RelmapResult<TableDescriptor> {
        if !self.has_table(table)? {
            return Err(RelmapError::UnknownTable {
                table: table.to_string(),
            });
        }
        let columns = self.conn.describe(table)?;
        debug!(table, columns = columns.len(), "described table");
        Ok(TableDescriptor::new(table, columns))
    }

    /// Describes every table, in `table_names` order.
    pub fn describe_all(&mut self) -> RelmapResult<Vec<TableDescriptor>> {
        let names = self.table_names()?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = self.conn.describe(&name)?;
            tables.push(TableDescriptor::new(name, columns));
        }
        Ok(tables)
    }

    /// Returns the size of the current database in megabytes.
    ///
    /// Fails with `NoData` if the store reports no tables.
    pub fn database_size(&mut self) -> RelmapResult<f64> {
        let schema = self.database_name()?;
        let rows = self.query(TABLE_LENGTHS, &[Value::from(schema.as_str())])?;
        sum_lengths(&rows).ok_or_else(|| RelmapError::NoData {
            what: format!("size of database '{}'", schema),
        })
    }

    /// Returns the size of `table` in megabytes.
    ///
    /// Fails with `NoData` if the store reports no row for the table.
    pub fn table_size(&mut self, table: &str) -> RelmapResult<f64> {
        let schema = self.database_name()?;
        let sql = format!("{} AND TABLE_NAME = ?", TABLE_LENGTHS);
        let rows = self.query(&sql, &[Value::from(schema.as_str()), Value::from(table)])?;
        sum_lengths(&rows).ok_or_else(|| RelmapError::NoData {
            what: format!("size of table '{}'", table),
        })
    }

    /// Returns the foreign keys declared on `table` that point into the
    /// current database.
    pub fn references_from(&mut self, table: &str) -> RelmapResult<Vec<ForeignKeyEdge>> {
        let schema = self.database_name()?;
        let sql = format!(
            "{} WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND REFERENCED_TABLE_SCHEMA = ?",
            FOREIGN_KEY_COLUMNS
        );
        let params = [
            Value::from(schema.as_str()),
            Value::from(table),
            Value::from(schema.as_str()),
        ];
        let rows = self.query(&sql, &params)?;
        rows.into_iter().map(edge_from_row).collect()
    }

    /// Returns the foreign keys of other tables that point at `table`.
    pub fn references_to(&mut self, table: &str) -> RelmapResult<Vec<ForeignKeyEdge>> {
        let schema = self.database_name()?;
        let sql = format!(
            "{} WHERE TABLE_SCHEMA = ? AND REFERENCED_TABLE_SCHEMA = ? AND REFERENCED_TABLE_NAME = ?",
            FOREIGN_KEY_COLUMNS
        );
        let params = [
            Value::from(schema.as_str()),
            Value::from(schema.as_str()),
            Value::from(table),
        ];
        let rows = self.query(&sql, &params)?;
        rows.into_iter().map(edge_from_row).collect()
    }

    /// Selects rows of `table` matching `filter`, a conjunction of
    /// `(column, value)` pairs. A NULL value matches NULL cells.
    pub fn select_where(
        &mut self,
        table: &str,
        filter: &[(&str, &Value)],
    ) -> RelmapResult<Vec<Row>> {
        let mut sql = format!("SELECT * FROM {}", quote_identifier(table));
        let mut params = Vec::with_capacity(filter.len());
        for (i, (column, value)) in filter.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&quote_identifier(column));
            if value.is_null() {
                sql.push_str(" IS NULL");
            } else {
                sql.push_str(" = ?");
                params.push((*value).clone());
            }
        }
        self.query(&sql, &params)
    }

    /// Selects rows of `table` whose `column` lies in `[low, high]`, in
    /// ascending `column` order.
    pub fn select_range(
        &mut self,
        table: &str,
        column: &str,
        low: Value,
        high: Value,
    ) -> RelmapResult<Vec<Row>> {
        let column = quote_identifier(column);
        let sql = format!(
            "SELECT * FROM {} WHERE {} BETWEEN ? AND ? ORDER BY {} ASC",
            quote_identifier(table),
            column,
            column
        );
        self.query(&sql, &[low, high])
    }
}

fn sum_lengths(rows: &[Row]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let bytes: f64 = rows
        .iter()
        .flat_map(|row| row.iter().take(2))
        .filter_map(Value::as_f64)
        .sum();
    Some(bytes_to_megabytes(bytes))
}

fn edge_from_row(row: Row) -> RelmapResult<ForeignKeyEdge> {
    let cells: Vec<String> = row
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s),
            other => Err(RelmapError::query(format!(
                "unexpected KEY_COLUMN_USAGE value: {:?}",
                other
            ))),
        })
        .collect::<RelmapResult<_>>()?;

    match <[String; 4]>::try_from(cells) {
        Ok([from_table, from_column, to_table, to_column]) => Ok(ForeignKeyEdge::new(
            from_table,
            from_column,
            to_table,
            to_column,
        )),
        Err(cells) => Err(RelmapError::query(format!(
            "expected 4 KEY_COLUMN_USAGE columns, got {}",
            cells.len()
        ))),
    }
}
