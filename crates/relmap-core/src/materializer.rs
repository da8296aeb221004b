//! Row-to-instance binding.

use std::sync::Arc;

use tracing::warn;

use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::{ColumnDescriptor, TableDescriptor, Value};

use crate::catalog::SchemaCatalog;
use crate::registry::{GeneratedType, Instance};
use crate::synthesizer::TypeSynthesizer;

/// Fetches rows by identifier and binds them to generated types.
///
/// Types are synthesized on first use into the materializer's namespace.
pub struct ObjectMaterializer<'a> {
    catalog: SchemaCatalog<'a>,
    synthesizer: TypeSynthesizer<'a>,
    namespace: &'a str,
}

fn require_table_name(table: &str) -> RelmapResult<()> {
    if table.trim().is_empty() {
        return Err(RelmapError::invalid_argument("table name must not be empty"));
    }
    Ok(())
}

impl<'a> ObjectMaterializer<'a> {
    /// Creates a materializer emitting types into `namespace`.
    pub fn new(
        catalog: SchemaCatalog<'a>,
        synthesizer: TypeSynthesizer<'a>,
        namespace: &'a str,
    ) -> Self {
        Self {
            catalog,
            synthesizer,
            namespace,
        }
    }

    fn identified_table(
        &mut self,
        table: &str,
        missing: impl FnOnce(String) -> RelmapError,
    ) -> RelmapResult<(TableDescriptor, ColumnDescriptor)> {
        let descriptor = self.catalog.describe(table)?;
        let id = descriptor
            .identifier_column()
            .cloned()
            .ok_or_else(|| missing(table.to_string()))?;
        Ok((descriptor, id))
    }

    /// Returns the type rows of `table` bind to.
    ///
    /// Fails with `Synthesis` if the derived type name belongs to a type
    /// generated from another table. If the table's columns changed since
    /// its type was registered, rows bind to an unregistered type built
    /// from the current columns and the registered one is left untouched.
    fn bound_type(&mut self, table: &TableDescriptor) -> RelmapResult<Arc<GeneratedType>> {
        let ty = self.synthesizer.synthesize(table, self.namespace)?;
        if ty.source_table != table.name {
            return Err(RelmapError::synthesis(
                self.namespace,
                format!(
                    "type '{}' was generated from table '{}' and cannot hold rows of '{}'",
                    ty.name, ty.source_table, table.name
                ),
            ));
        }

        let current = TypeSynthesizer::build_type(table, self.namespace);
        if ty.fields != current.fields {
            warn!(
                namespace = self.namespace,
                name = %ty.name,
                table = %table.name,
                "columns changed since the type was generated; binding to current columns"
            );
            return Ok(Arc::new(current));
        }
        Ok(ty)
    }

    /// Loads the row of `table` whose identifier equals `id`.
    ///
    /// Returns `None` if no row matches. Fails with `NoIdentifierColumn` if
    /// the table has no identifier column or rejects the lookup, and with
    /// `Synthesis` if the table's type name is taken by another table.
    pub fn create_object(&mut self, table: &str, id: &Value) -> RelmapResult<Option<Instance>> {
        require_table_name(table)?;
        if id.is_null() {
            return Err(RelmapError::invalid_argument("identifier must not be NULL"));
        }

        let (descriptor, id_column) =
            self.identified_table(table, |table| RelmapError::NoIdentifierColumn { table })?;
        let ty = self.bound_type(&descriptor)?;

        let rows = self
            .catalog
            .select_where(table, &[(id_column.name.as_str(), id)])
            .map_err(|err| match err {
                RelmapError::Query { .. } => RelmapError::NoIdentifierColumn {
                    table: table.to_string(),
                },
                other => other,
            })?;

        rows.into_iter()
            .next()
            .map(|row| ty.construct(row))
            .transpose()
    }

    /// Loads every row of `table` with identifier in `[first, last]`, in
    /// ascending identifier order.
    ///
    /// An empty range yields no instances. Fails with `MissingIdColumn` if
    /// the table has no identifier column.
    pub fn create_objects(
        &mut self,
        table: &str,
        first: i64,
        last: i64,
    ) -> RelmapResult<Vec<Instance>> {
        require_table_name(table)?;

        let (descriptor, id_column) =
            self.identified_table(table, |table| RelmapError::MissingIdColumn { table })?;
        let ty = self.bound_type(&descriptor)?;
        if first > last {
            return Ok(Vec::new());
        }

        self.catalog
            .select_range(table, &id_column.name, Value::from(first), Value::from(last))?
            .into_iter()
            .map(|row| ty.construct(row))
            .collect()
    }
}
