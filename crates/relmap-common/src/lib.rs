//! # relmap-common
//!
//! Common types, errors, and configuration for relmap.
//!
//! This crate provides the foundational types shared by the connection
//! layer and the reflection engine. It includes:
//!
//! - **Types**: Cell values, rows, typed rows, and table/column descriptors
//! - **Errors**: Unified error handling with `RelmapError`
//! - **Config**: Connection, code generation, and tool configuration
//! - **Constants**: Schema conventions and size reporting
//!
//! ## Example
//!
//! ```rust
//! use relmap_common::types::{ColumnDescriptor, TableDescriptor, TypedRow, Value};
//! use relmap_common::error::RelmapResult;
//!
//! fn example() -> RelmapResult<()> {
//!     let table = TableDescriptor::new(
//!         "user_profile",
//!         vec![
//!             ColumnDescriptor::new(0, "id", "int").with_primary_key(true),
//!             ColumnDescriptor::new(1, "first_name", "varchar(64)"),
//!         ],
//!     );
//!     let row = TypedRow::from_row(&table, vec![Value::from(5), Value::from("Ann")])?;
//!     assert_eq!(row.get("first_name"), Some(&Value::from("Ann")));
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use error::{ErrorCode, RelmapError, RelmapResult};
pub use types::{ColumnDescriptor, ForeignKeyEdge, Row, TableDescriptor, TypedField, TypedRow, Value};
