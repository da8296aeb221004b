//! Type synthesis from table descriptors.

use std::sync::Arc;

use tracing::{debug, info, warn};

use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::TableDescriptor;

use crate::naming::to_upper_camel;
use crate::registry::{FieldDef, GeneratedType, NamespaceRegistry};
use crate::sink::{validate_namespace, CodeSink};

/// Emits generated types into namespaces.
///
/// The registry is the live view; the sink receives rendered source as a
/// side artifact. A type is registered only after its source and the
/// namespace root have been written.
pub struct TypeSynthesizer<'a> {
    registry: &'a mut NamespaceRegistry,
    sink: &'a mut dyn CodeSink,
}

impl<'a> TypeSynthesizer<'a> {
    /// Creates a synthesizer over a registry and a sink.
    pub fn new(registry: &'a mut NamespaceRegistry, sink: &'a mut dyn CodeSink) -> Self {
        Self { registry, sink }
    }

    /// Returns the registry.
    pub fn registry(&self) -> &NamespaceRegistry {
        self.registry
    }

    /// Builds the type for `table` without registering it.
    pub fn build_type(table: &TableDescriptor, namespace: &str) -> GeneratedType {
        GeneratedType {
            name: to_upper_camel(&table.name),
            namespace: namespace.to_string(),
            source_table: table.name.clone(),
            fields: table
                .columns
                .iter()
                .map(|c| FieldDef {
                    name: c.name.clone(),
                    declared_type: c.declared_type.clone(),
                    nullable: c.nullable,
                })
                .collect(),
        }
    }

    /// Synthesizes the type for `table` into `namespace`.
    ///
    /// If a type of the derived name is already registered the call is a
    /// no-op returning that type. Source already present in the sink is
    /// never overwritten.
    pub fn synthesize(
        &mut self,
        table: &TableDescriptor,
        namespace: &str,
    ) -> RelmapResult<Arc<GeneratedType>> {
        validate_namespace(namespace)?;

        let ty = Self::build_type(table, namespace);
        if ty.name.is_empty() {
            return Err(RelmapError::synthesis(
                namespace,
                format!("table '{}' does not yield a type name", table.name),
            ));
        }

        if let Some(existing) = self.registry.get(namespace, &ty.name) {
            if existing.source_table != table.name {
                warn!(
                    namespace,
                    name = %ty.name,
                    table = %table.name,
                    existing = %existing.source_table,
                    "type name already taken; skipping"
                );
            } else {
                debug!(namespace, name = %ty.name, "type already synthesized");
            }
            return Ok(existing);
        }

        self.sink.ensure_namespace(namespace)?;
        if self.sink.has_type(namespace, &ty.name)? {
            debug!(namespace, name = %ty.name, "source exists; not overwriting");
        } else {
            self.sink.write_type(namespace, &ty)?;
        }

        let registered = self.registry.types(namespace);
        let mut index: Vec<&GeneratedType> = registered.iter().map(Arc::as_ref).collect();
        index.push(&ty);
        self.sink.write_index(namespace, &index)?;

        info!(namespace, name = %ty.name, fields = ty.arity(), "synthesized type");
        Ok(self.registry.insert(ty))
    }

    /// Drops `namespace` from the sink and the registry, then recreates it
    /// empty.
    pub fn reset_namespace(&mut self, namespace: &str) -> RelmapResult<()> {
        validate_namespace(namespace)?;
        self.remove_namespace(namespace)?;
        self.sink.ensure_namespace(namespace)?;
        self.sink.write_index(namespace, &[])?;
        self.registry.ensure_namespace(namespace);
        Ok(())
    }

    /// Drops `namespace` from the sink and the registry.
    pub fn remove_namespace(&mut self, namespace: &str) -> RelmapResult<()> {
        self.registry.remove_namespace(namespace);
        self.sink.remove_namespace(namespace)
    }
}
