//! Foreign-key graph traversal.
//!
//! Foreign keys are stored directed but walked undirected: a table's
//! neighbours are the tables it references and the tables referencing it.
//! [`ReferenceGraphWalker::build_hierarchy`] synthesizes the whole connected
//! component of a root table into one namespace, breadth first, visiting each
//! table once.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use relmap_common::error::{RelmapError, RelmapResult};

use crate::catalog::SchemaCatalog;
use crate::registry::GeneratedType;
use crate::sink::validate_namespace;
use crate::synthesizer::TypeSynthesizer;

/// The result of a hierarchy build.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    /// Namespace the types were emitted into.
    pub namespace: String,
    /// Table the walk started from.
    pub root: String,
    /// Synthesized types in visit order.
    pub types: Vec<Arc<GeneratedType>>,
}

impl Hierarchy {
    /// Returns the visited tables in visit order.
    pub fn tables(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.source_table.as_str()).collect()
    }
}

/// Walks the reference graph and synthesizes what it reaches.
pub struct ReferenceGraphWalker<'a> {
    catalog: SchemaCatalog<'a>,
    synthesizer: TypeSynthesizer<'a>,
}

impl<'a> ReferenceGraphWalker<'a> {
    /// Creates a walker.
    pub fn new(catalog: SchemaCatalog<'a>, synthesizer: TypeSynthesizer<'a>) -> Self {
        Self {
            catalog,
            synthesizer,
        }
    }

    /// Returns the tables adjacent to `table` in either direction, sorted.
    pub fn neighbours(&mut self, table: &str) -> RelmapResult<BTreeSet<String>> {
        let outgoing = self.catalog.references_from(table)?;
        let incoming = self.catalog.references_to(table)?;
        Ok(outgoing
            .iter()
            .chain(&incoming)
            .filter_map(|edge| edge.neighbour_of(table))
            .map(str::to_string)
            .collect())
    }

    /// Rebuilds `namespace` from the connected component of `root`.
    ///
    /// Prior contents of the namespace are discarded. If any step fails the
    /// namespace is removed before the error is returned.
    pub fn build_hierarchy(&mut self, root: &str, namespace: &str) -> RelmapResult<Hierarchy> {
        validate_namespace(namespace)?;
        if !self.catalog.has_table(root)? {
            return Err(RelmapError::UnknownTable {
                table: root.to_string(),
            });
        }

        info!(root, namespace, "rebuilding namespace");
        let result = self
            .synthesizer
            .reset_namespace(namespace)
            .and_then(|()| self.walk(root, namespace));

        match result {
            Ok(types) => {
                info!(root, namespace, types = types.len(), "hierarchy built");
                Ok(Hierarchy {
                    namespace: namespace.to_string(),
                    root: root.to_string(),
                    types,
                })
            }
            Err(err) => {
                warn!(root, namespace, error = %err, "hierarchy build failed; removing namespace");
                if let Err(cleanup) = self.synthesizer.remove_namespace(namespace) {
                    warn!(namespace, error = %cleanup, "namespace cleanup failed");
                }
                Err(err)
            }
        }
    }

    fn walk(&mut self, root: &str, namespace: &str) -> RelmapResult<Vec<Arc<GeneratedType>>> {
        let mut visited = HashSet::new();
        let mut pending = VecDeque::from([root.to_string()]);
        let mut types: Vec<Arc<GeneratedType>> = Vec::new();

        while let Some(table) = pending.pop_front() {
            if !visited.insert(table.clone()) {
                continue;
            }

            let descriptor = self.catalog.describe(&table)?;
            let ty = self.synthesizer.synthesize(&descriptor, namespace)?;
            if !types.iter().any(|t| Arc::ptr_eq(t, &ty)) {
                types.push(ty);
            }

            for next in self.neighbours(&table)? {
                if !visited.contains(&next) {
                    debug!(from = %table, to = %next, "queueing referenced table");
                    pending.push_back(next);
                }
            }
        }

        Ok(types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NamespaceRegistry;
    use crate::sink::MemorySink;
    use relmap_client::{MemoryColumn, MemoryDatabase, MemoryTable};

    fn table(name: &str, refs: &[&str]) -> MemoryTable {
        let mut t = MemoryTable::new(name).with_column(MemoryColumn::new("id", "int").primary_key());
        for r in refs {
            let column = format!("{}_id", r);
            t = t
                .with_column(MemoryColumn::new(column.as_str(), "int"))
                .with_foreign_key(column.as_str(), *r, "id");
        }
        t
    }

    /// `orders -> customers`, `order_items -> orders`, `order_items -> products`,
    /// plus an unrelated `audit`.
    fn shop() -> MemoryDatabase {
        let db = MemoryDatabase::new("shop");
        db.create_table(table("customers", &[])).unwrap();
        db.create_table(table("orders", &["customers"])).unwrap();
        db.create_table(table("products", &[])).unwrap();
        db.create_table(table("order_items", &["orders", "products"]))
            .unwrap();
        db.create_table(table("audit", &[])).unwrap();
        db
    }

    #[test]
    fn test_neighbours_both_directions() {
        let mut conn = shop().connect();
        let mut registry = NamespaceRegistry::new();
        let mut sink = MemorySink::new();
        let mut walker = ReferenceGraphWalker::new(
            SchemaCatalog::new(&mut conn),
            TypeSynthesizer::new(&mut registry, &mut sink),
        );
        let n: Vec<_> = walker.neighbours("orders").unwrap().into_iter().collect();
        assert_eq!(n, vec!["customers", "order_items"]);
        assert!(walker.neighbours("audit").unwrap().is_empty());
    }

    #[test]
    fn test_build_hierarchy_breadth_first() {
        let mut conn = shop().connect();
        let mut registry = NamespaceRegistry::new();
        let mut sink = MemorySink::new();
        let hierarchy = ReferenceGraphWalker::new(
            SchemaCatalog::new(&mut conn),
            TypeSynthesizer::new(&mut registry, &mut sink),
        )
        .build_hierarchy("customers", "shop")
        .unwrap();

        assert_eq!(
            hierarchy.tables(),
            vec!["customers", "orders", "order_items", "products"]
        );
        assert_eq!(registry.types("shop").len(), 4);
        assert!(!registry.contains("shop", "Audit"));

        let index = sink.source("shop", "mod.rs").unwrap();
        for name in ["Customers", "Orders", "OrderItems", "Products"] {
            assert!(index.contains(&format!("::{};", name)), "{} missing", name);
        }
    }

    #[test]
    fn test_rebuild_discards_previous_contents() {
        let mut conn = shop().connect();
        let mut registry = NamespaceRegistry::new();
        let mut sink = MemorySink::new();
        {
            let mut walker = ReferenceGraphWalker::new(
                SchemaCatalog::new(&mut conn),
                TypeSynthesizer::new(&mut registry, &mut sink),
            );
            walker.build_hierarchy("customers", "shop").unwrap();
            let hierarchy = walker.build_hierarchy("audit", "shop").unwrap();
            assert_eq!(hierarchy.tables(), vec!["audit"]);
        }
        assert_eq!(registry.types("shop").len(), 1);
        assert_eq!(sink.files("shop"), vec!["audit.rs", "mod.rs"]);
    }

    #[test]
    fn test_failure_removes_namespace() {
        let mut conn = shop().connect();
        let mut registry = NamespaceRegistry::new();
        // reset writes the empty root, then two types register before failing
        let mut sink = MemorySink::new().fail_index_after(3);
        let err = ReferenceGraphWalker::new(
            SchemaCatalog::new(&mut conn),
            TypeSynthesizer::new(&mut registry, &mut sink),
        )
        .build_hierarchy("customers", "shop")
        .unwrap_err();

        assert!(matches!(err, RelmapError::Synthesis { .. }));
        assert!(!registry.has_namespace("shop"));
        assert!(!sink.has_namespace("shop"));
    }

    #[test]
    fn test_unknown_root_keeps_namespace() {
        let mut conn = shop().connect();
        let mut registry = NamespaceRegistry::new();
        let mut sink = MemorySink::new();
        let mut walker = ReferenceGraphWalker::new(
            SchemaCatalog::new(&mut conn),
            TypeSynthesizer::new(&mut registry, &mut sink),
        );
        walker.build_hierarchy("audit", "shop").unwrap();
        let err = walker.build_hierarchy("ghost", "shop").unwrap_err();
        assert!(matches!(err, RelmapError::UnknownTable { .. }));
        drop(walker);
        assert!(registry.contains("shop", "Audit"));
    }
}
