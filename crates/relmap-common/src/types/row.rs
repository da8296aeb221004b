//! Rows as returned by the backend and as exposed to callers.

use serde::{Deserialize, Serialize};

use super::{TableDescriptor, Value};
use crate::error::{RelmapError, RelmapResult};

/// A bare row in column order.
pub type Row = Vec<Value>;

/// One schema-annotated cell of a [`TypedRow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedField {
    /// Column name.
    pub name: String,
    /// Declared SQL type of the column.
    pub declared_type: String,
    /// Cell value.
    pub value: Value,
}

/// A row annotated with its column names and declared types.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypedRow {
    /// Cells in column order.
    pub fields: Vec<TypedField>,
}

impl TypedRow {
    /// Pairs a bare row with the table it came from.
    ///
    /// Fails with a query error if the row is not exactly as wide as the
    /// table.
    pub fn from_row(table: &TableDescriptor, row: Row) -> RelmapResult<Self> {
        if row.len() != table.columns.len() {
            return Err(RelmapError::query(format!(
                "row of '{}' has {} values but the table has {} columns",
                table.name,
                row.len(),
                table.columns.len()
            )));
        }
        let fields = table
            .columns
            .iter()
            .zip(row)
            .map(|(col, value)| TypedField {
                name: col.name.clone(),
                declared_type: col.declared_type.clone(),
                value,
            })
            .collect();
        Ok(Self { fields })
    }

    /// Returns the value of the named column.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the bare values in order.
    pub fn values(&self) -> Row {
        self.fields.iter().map(|f| f.value.clone()).collect()
    }

    /// Iterates over `(name, type, value)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.declared_type.as_str(), &f.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnDescriptor;

    fn table() -> TableDescriptor {
        TableDescriptor::new(
            "t",
            vec![
                ColumnDescriptor::new(0, "id", "int"),
                ColumnDescriptor::new(1, "name", "text"),
            ],
        )
    }

    #[test]
    fn test_from_row_pairs_columns() {
        let row = TypedRow::from_row(&table(), vec![Value::Integer(1), Value::Null]).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::Integer(1)));
        assert_eq!(row.get("name"), Some(&Value::Null));
        assert_eq!(row.iter().next().map(|(n, t, _)| (n, t)), Some(("id", "int")));
    }

    #[test]
    fn test_from_row_rejects_width_mismatch() {
        let short = TypedRow::from_row(&table(), vec![Value::Integer(1)]);
        assert!(matches!(short, Err(RelmapError::Query { .. })));

        let wide = TypedRow::from_row(
            &table(),
            vec![Value::Integer(1), Value::from("a"), Value::from("b")],
        );
        let err = wide.unwrap_err();
        assert!(err.to_string().contains("has 3 values but the table has 2 columns"));
    }
}
