//! Type definitions for relmap.
//!
//! This module contains the values, rows, and schema descriptors shared by
//! the connection layer and the engine.

mod row;
mod schema;
mod value;

pub use row::{Row, TypedField, TypedRow};
pub use schema::{ColumnDescriptor, ForeignKeyEdge, TableDescriptor};
pub use value::Value;
