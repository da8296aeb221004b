//! Configuration for relmap.
//!
//! This module provides configuration structures for connections, code
//! generation, and the command-line tool.

mod relmap;

pub use relmap::{CodegenConfig, ConnectionConfig, RelmapConfig};
