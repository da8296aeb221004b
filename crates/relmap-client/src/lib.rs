//! # relmap-client
//!
//! Connection capability for relmap.
//!
//! The engine reaches its relational store through the [`Connection`] trait
//! and obtains connections from a [`Connector`]. This crate also ships an
//! embedded, in-memory backend that understands the MySQL-flavoured SQL the
//! engine issues (`SHOW TABLES`, `DESCRIBE`, filtered `SELECT`s and the
//! `information_schema` relations relmap reads).
//!
//! ## Quick Start
//!
//! ```rust
//! use relmap_client::{Connector, MemoryDatabase};
//! use relmap_common::config::ConnectionConfig;
//!
//! let db = MemoryDatabase::new("shop");
//! let config = ConnectionConfig::new().user("root").database("shop");
//! let mut conn = db.connector().connect(&config).unwrap();
//!
//! let rows = conn.query("SELECT DATABASE()", &[]).unwrap();
//! assert_eq!(rows[0][0].as_str(), Some("shop"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Connection and connector traits.
pub mod connection;

/// Embedded in-memory backend.
pub mod memory;

pub use connection::{quote_identifier, Connection, ConnectionState, Connector};
pub use memory::{
    Fixture, MemoryColumn, MemoryConnection, MemoryConnector, MemoryDatabase, MemoryForeignKey,
    MemoryTable,
};
