//! Live registry of generated types and the instances built from them.
//!
//! Generated sources are a side artifact (see [`crate::sink`]); the
//! [`NamespaceRegistry`] is what object construction and lookups consult.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::{Row, TypedField, TypedRow, Value};

use crate::naming::to_snake;

/// A field of a generated type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name, identical to the source column name.
    pub name: String,
    /// Declared SQL type of the source column.
    pub declared_type: String,
    /// Whether the source column accepts NULL.
    pub nullable: bool,
}

/// A type synthesized from a table.
///
/// Identified by `(namespace, name)`. Fields follow the source table's
/// column order one-to-one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedType {
    /// `UpperCamelCase` type name.
    pub name: String,
    /// Namespace the type was emitted into.
    pub namespace: String,
    /// Table the type was synthesized from.
    pub source_table: String,
    /// Fields in column order.
    pub fields: Vec<FieldDef>,
}

impl GeneratedType {
    /// Returns the field names in order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Returns the number of positional values the constructor takes.
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Returns the index of a field.
    ///
    /// Accepts the column name or any spelling that converts to it, so
    /// `firstName` finds `first_name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| {
                let snake = to_snake(name);
                self.fields.iter().position(|f| f.name == snake)
            })
    }

    /// Builds an instance from positional values.
    ///
    /// Fails with `ArityMismatch` unless exactly [`arity`](Self::arity)
    /// values are supplied.
    pub fn construct(self: &Arc<Self>, values: Row) -> RelmapResult<Instance> {
        if values.len() != self.arity() {
            return Err(RelmapError::ArityMismatch {
                type_name: self.qualified_name(),
                expected: self.arity(),
                actual: values.len(),
            });
        }
        Ok(Instance {
            ty: Arc::clone(self),
            values,
        })
    }

    /// Returns `namespace::Name`.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.namespace, self.name)
    }
}

/// A value of a generated type.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    ty: Arc<GeneratedType>,
    values: Row,
}

impl Instance {
    /// Returns the instance's type.
    pub fn generated_type(&self) -> &Arc<GeneratedType> {
        &self.ty
    }

    /// Returns a field value by column name or camel-case spelling.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.ty.field_index(field).map(|i| &self.values[i])
    }

    /// Returns the values in field order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Iterates over `(field, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.ty
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }

    /// Converts to the schema-annotated row representation.
    pub fn to_typed_row(&self) -> TypedRow {
        let fields = self
            .ty
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| TypedField {
                name: f.name.clone(),
                declared_type: f.declared_type.clone(),
                value: v.clone(),
            })
            .collect();
        TypedRow { fields }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return write!(f, "{} {{}}", self.ty.name);
        }
        write!(f, "{} {{ ", self.ty.name)?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, " }}")
    }
}

/// Types emitted into one namespace, in emission order.
#[derive(Debug, Clone, Default)]
struct Namespace {
    types: Vec<Arc<GeneratedType>>,
}

impl Namespace {
    fn get(&self, name: &str) -> Option<&Arc<GeneratedType>> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// Registry of namespaces and the types emitted into them.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    namespaces: BTreeMap<String, Namespace>,
}

impl NamespaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `namespace` if it does not exist.
    pub fn ensure_namespace(&mut self, namespace: &str) {
        self.namespaces.entry(namespace.to_string()).or_default();
    }

    /// Returns true if `namespace` exists.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Removes `namespace` and every type in it.
    pub fn remove_namespace(&mut self, namespace: &str) -> bool {
        self.namespaces.remove(namespace).is_some()
    }

    /// Looks up a type.
    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<GeneratedType>> {
        self.namespaces.get(namespace)?.get(name).cloned()
    }

    /// Returns true if `(namespace, name)` is registered.
    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.get(namespace, name).is_some()
    }

    /// Registers a type, creating its namespace if needed.
    ///
    /// If a type of the same name already exists the registry is left
    /// untouched and the existing type is returned.
    pub fn insert(&mut self, ty: GeneratedType) -> Arc<GeneratedType> {
        let ns = self.namespaces.entry(ty.namespace.clone()).or_default();
        if let Some(existing) = ns.get(&ty.name) {
            return Arc::clone(existing);
        }
        let ty = Arc::new(ty);
        ns.types.push(Arc::clone(&ty));
        ty
    }

    /// Returns the types in `namespace` in emission order.
    pub fn types(&self, namespace: &str) -> Vec<Arc<GeneratedType>> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.types.clone())
            .unwrap_or_default()
    }

    /// Returns the type synthesized from `table` in `namespace`.
    pub fn for_table(&self, namespace: &str, table: &str) -> Option<Arc<GeneratedType>> {
        self.namespaces
            .get(namespace)?
            .types
            .iter()
            .find(|t| t.source_table == table)
            .cloned()
    }

    /// Returns the namespace names in sorted order.
    pub fn namespaces(&self) -> Vec<&str> {
        self.namespaces.keys().map(String::as_str).collect()
    }
}
