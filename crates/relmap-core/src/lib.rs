//! # relmap-core
//!
//! Schema reflection and object synthesis.
//!
//! This crate maps a relational schema onto generated object types and back:
//! - Table metadata and sizes ([`catalog`])
//! - Identifier casing ([`naming`])
//! - Type synthesis into namespaces ([`synthesizer`], [`registry`])
//! - Shape-based table and row lookup ([`matcher`])
//! - Foreign-key graph traversal ([`walker`])
//! - Row-to-instance binding ([`materializer`])
//! - Rust source for generated types ([`codegen`], [`sink`])
//!
//! ## Example
//!
//! ```rust
//! use relmap_client::{MemoryColumn, MemoryDatabase, MemoryTable};
//! use relmap_common::types::Value;
//! use relmap_core::Relmap;
//!
//! let db = MemoryDatabase::new("app");
//! db.create_table(
//!     MemoryTable::new("user_profile")
//!         .with_column(MemoryColumn::new("id", "int").primary_key())
//!         .with_column(MemoryColumn::new("first_name", "varchar(32)")),
//! )
//! .unwrap();
//! db.insert("user_profile", vec![Value::from(5), Value::from("Ada")]).unwrap();
//!
//! let mut relmap = Relmap::new();
//! relmap.attach(Box::new(db.connect()));
//!
//! let user = relmap.create_object("user_profile", 5).unwrap().unwrap();
//! assert_eq!(user.generated_type().name, "UserProfile");
//! assert_eq!(user.get("firstName"), Some(&Value::from("Ada")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Table metadata queries
pub mod catalog;

/// Source rendering
pub mod codegen;

/// The `Relmap` facade
pub mod engine;

/// Shape-based lookup
pub mod matcher;

/// Row-to-instance binding
pub mod materializer;

/// Identifier casing
pub mod naming;

/// Generated types and instances
pub mod registry;

/// Generated source destinations
pub mod sink;

/// Type synthesis
pub mod synthesizer;

/// Foreign-key traversal
pub mod walker;

pub use catalog::SchemaCatalog;
pub use engine::{Relmap, SharedRelmap};
pub use matcher::{ClassMatch, FieldSpec, StructuralMatcher};
pub use materializer::ObjectMaterializer;
pub use registry::{FieldDef, GeneratedType, Instance, NamespaceRegistry};
pub use sink::{CodeSink, FsSink, MemorySink};
pub use synthesizer::TypeSynthesizer;
pub use walker::{Hierarchy, ReferenceGraphWalker};
