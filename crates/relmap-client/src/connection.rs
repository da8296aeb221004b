//! Connection capability.
//!
//! The engine never talks to a database driver directly. It holds a boxed
//! [`Connection`] obtained from a [`Connector`] and speaks MySQL-flavoured
//! SQL through it, with every value passed as a positional `?` parameter.

use std::fmt;

use relmap_common::config::ConnectionConfig;
use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::{ColumnDescriptor, Row, Value};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected and ready.
    Connected,
    /// Connection closed.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// An open session with the backing store.
///
/// Implementations are used from one thread at a time; callers sharing a
/// connection must serialize access themselves.
pub trait Connection: Send {
    /// Runs a statement and returns its rows in backend order.
    ///
    /// `params` bind the statement's `?` placeholders left to right.
    fn query(&mut self, sql: &str, params: &[Value]) -> RelmapResult<Vec<Row>>;

    /// Returns the columns of `table` in catalog order.
    ///
    /// The default implementation issues `DESCRIBE` and reads the MySQL
    /// `Field, Type, Null, Key, Default, Extra` result shape.
    fn describe(&mut self, table: &str) -> RelmapResult<Vec<ColumnDescriptor>> {
        let sql = format!("DESCRIBE {}", quote_identifier(table));
        self.query(&sql, &[])?
            .into_iter()
            .enumerate()
            .map(|(ordinal, row)| column_from_describe_row(ordinal, row))
            .collect()
    }

    /// Returns the connection state.
    fn state(&self) -> ConnectionState;

    /// Closes the connection. Further queries fail with `NotConnected`.
    fn disconnect(&mut self) -> RelmapResult<()>;
}

/// Opens connections.
pub trait Connector {
    /// Validates `config` and opens a connection.
    ///
    /// Fails with [`RelmapError::Validation`] when the parameters are
    /// rejected.
    fn connect(&self, config: &ConnectionConfig) -> RelmapResult<Box<dyn Connection>>;
}

/// Quotes a MySQL identifier, doubling any embedded backticks.
pub fn quote_identifier(identifier: &str) -> String {
    let mut escaped = identifier.replace('`', "``");
    escaped.insert(0, '`');
    escaped.push('`');
    escaped
}

fn column_from_describe_row(ordinal: usize, row: Row) -> RelmapResult<ColumnDescriptor> {
    let mut cells = row.into_iter();
    let name = match cells.next() {
        Some(Value::String(name)) => name,
        other => {
            return Err(RelmapError::query(format!(
                "unexpected DESCRIBE field cell: {:?}",
                other
            )))
        }
    };
    let declared_type = cells.next().map(|v| v.to_string()).unwrap_or_default();
    let nullable = matches!(cells.next(), Some(Value::String(s)) if s.eq_ignore_ascii_case("YES"));
    let primary_key = matches!(cells.next(), Some(Value::String(s)) if s.eq_ignore_ascii_case("PRI"));

    Ok(ColumnDescriptor::new(ordinal, name, declared_type)
        .with_nullable(nullable)
        .with_primary_key(primary_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        rows: Vec<Row>,
        last_sql: Option<String>,
    }

    impl Connection for Scripted {
        fn query(&mut self, sql: &str, _params: &[Value]) -> RelmapResult<Vec<Row>> {
            self.last_sql = Some(sql.to_string());
            Ok(self.rows.clone())
        }

        fn state(&self) -> ConnectionState {
            ConnectionState::Connected
        }

        fn disconnect(&mut self) -> RelmapResult<()> {
            Ok(())
        }
    }

    fn describe_row(field: &str, ty: &str, null: &str, key: &str) -> Row {
        vec![
            Value::from(field),
            Value::from(ty),
            Value::from(null),
            Value::from(key),
            Value::Null,
            Value::from(""),
        ]
    }

    #[test]
    fn test_identifier_quoting() {
        let expected = vec!["`a`", "`naughty``sql`", "```;naughty;sql;```"];
        let input = ["a", "naughty`sql", "`;naughty;sql;`"]
            .iter()
            .map(|raw| quote_identifier(raw))
            .collect::<Vec<_>>();
        assert_eq!(expected, input);
    }

    #[test]
    fn test_default_describe() {
        let mut conn = Scripted {
            rows: vec![
                describe_row("id", "int", "NO", "PRI"),
                describe_row("name", "varchar(64)", "YES", ""),
            ],
            last_sql: None,
        };

        let columns = conn.describe("user profile").unwrap();
        assert_eq!(conn.last_sql.as_deref(), Some("DESCRIBE `user profile`"));
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].ordinal, 0);
        assert!(columns[0].primary_key);
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].ordinal, 1);
        assert_eq!(columns[1].declared_type, "varchar(64)");
        assert!(columns[1].nullable);
    }

    #[test]
    fn test_describe_rejects_malformed_rows() {
        let mut conn = Scripted {
            rows: vec![vec![Value::Integer(1)]],
            last_sql: None,
        };
        assert!(matches!(
            conn.describe("t"),
            Err(RelmapError::Query { .. })
        ));
    }
}
