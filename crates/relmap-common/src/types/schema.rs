//! Table and column descriptors read from the backing catalog.

use serde::{Deserialize, Serialize};

use crate::constants::IDENTIFIER_COLUMN;

/// One column of a table, as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Zero-based position in catalog order.
    pub ordinal: usize,
    /// Column name.
    pub name: String,
    /// Declared SQL type, verbatim (e.g. `varchar(255)`).
    pub declared_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl ColumnDescriptor {
    /// Creates a nullable, non-key column.
    pub fn new(ordinal: usize, name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            primary_key: false,
        }
    }

    /// Sets nullability.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Marks the column as part of the primary key.
    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Returns the `(ordinal, name, type)` triple exposed by the query surface.
    pub fn as_triple(&self) -> (usize, String, String) {
        (self.ordinal, self.name.clone(), self.declared_type.clone())
    }
}

/// A table and its ordered columns.
///
/// Descriptors are snapshots: they are read fresh on every call and never
/// cached, since the schema may change between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Columns in catalog order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Checks if the table has a column named `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the identifier column.
    ///
    /// The column named `id` wins; otherwise a single-column primary key is
    /// used. Composite keys have no identifier.
    pub fn identifier_column(&self) -> Option<&ColumnDescriptor> {
        if let Some(col) = self
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(IDENTIFIER_COLUMN))
        {
            return Some(col);
        }

        let mut keys = self.columns.iter().filter(|c| c.primary_key);
        match (keys.next(), keys.next()) {
            (Some(col), None) => Some(col),
            _ => None,
        }
    }

    /// Checks that ordinals run `0..len` without gaps.
    pub fn has_dense_ordinals(&self) -> bool {
        self.columns
            .iter()
            .enumerate()
            .all(|(i, c)| c.ordinal == i)
    }
}

/// A directed foreign-key reference between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    /// Referencing table.
    pub from_table: String,
    /// Referencing column.
    pub from_column: String,
    /// Referenced table.
    pub to_table: String,
    /// Referenced column.
    pub to_column: String,
}

impl ForeignKeyEdge {
    /// Creates an edge.
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }

    /// Returns the table on the other end of the edge from `table`.
    pub fn neighbour_of(&self, table: &str) -> Option<&str> {
        if self.from_table == table {
            Some(&self.to_table)
        } else if self.to_table == table {
            Some(&self.from_table)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::new(0, "user_id", "int").with_primary_key(true),
                ColumnDescriptor::new(1, "name", "varchar(64)"),
            ],
        )
    }

    #[test]
    fn test_identifier_falls_back_to_primary_key() {
        let table = users();
        assert_eq!(table.identifier_column().map(|c| c.name.as_str()), Some("user_id"));
    }

    #[test]
    fn test_identifier_prefers_id() {
        let table = TableDescriptor::new(
            "t",
            vec![
                ColumnDescriptor::new(0, "code", "int").with_primary_key(true),
                ColumnDescriptor::new(1, "ID", "int"),
            ],
        );
        assert_eq!(table.identifier_column().map(|c| c.name.as_str()), Some("ID"));
    }

    #[test]
    fn test_composite_key_has_no_identifier() {
        let table = TableDescriptor::new(
            "link",
            vec![
                ColumnDescriptor::new(0, "a", "int").with_primary_key(true),
                ColumnDescriptor::new(1, "b", "int").with_primary_key(true),
            ],
        );
        assert!(table.identifier_column().is_none());
    }

    #[test]
    fn test_dense_ordinals() {
        assert!(users().has_dense_ordinals());
        let gap = TableDescriptor::new("g", vec![ColumnDescriptor::new(1, "x", "int")]);
        assert!(!gap.has_dense_ordinals());
    }

    #[test]
    fn test_neighbour_of() {
        let edge = ForeignKeyEdge::new("orders", "user_id", "users", "id");
        assert_eq!(edge.neighbour_of("orders"), Some("users"));
        assert_eq!(edge.neighbour_of("users"), Some("orders"));
        assert_eq!(edge.neighbour_of("items"), None);
    }
}
