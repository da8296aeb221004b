//! The `Relmap` facade.
//!
//! Holds at most one connection, the namespace registry, and a code sink,
//! and exposes the full query surface on top of them. Every operation other
//! than [`Relmap::connect`] fails with `NotConnected` while no open
//! connection is held.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use relmap_client::{Connection, ConnectionState, Connector};
use relmap_common::config::{CodegenConfig, ConnectionConfig};
use relmap_common::constants::DEFAULT_OBJECT_NAMESPACE;
use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::{TableDescriptor, TypedRow, Value};

use crate::catalog::SchemaCatalog;
use crate::matcher::{ClassMatch, FieldSpec, StructuralMatcher};
use crate::materializer::ObjectMaterializer;
use crate::registry::{GeneratedType, Instance, NamespaceRegistry};
use crate::sink::{CodeSink, FsSink, MemorySink};
use crate::synthesizer::TypeSynthesizer;
use crate::walker::{Hierarchy, ReferenceGraphWalker};

/// A [`Relmap`] shared between threads. The mutex serializes every call,
/// including namespace synthesis.
pub type SharedRelmap<S = MemorySink> = Arc<Mutex<Relmap<S>>>;

fn open(connection: &mut Option<Box<dyn Connection>>) -> RelmapResult<&mut dyn Connection> {
    match connection.as_deref_mut() {
        Some(conn) if conn.state() == ConnectionState::Connected => Ok(conn),
        _ => Err(RelmapError::NotConnected),
    }
}

/// Schema reflection and object synthesis over one connection.
pub struct Relmap<S: CodeSink = MemorySink> {
    connection: Option<Box<dyn Connection>>,
    registry: NamespaceRegistry,
    sink: S,
    object_namespace: String,
}

impl<S: CodeSink> fmt::Debug for Relmap<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relmap")
            .field("connected", &self.is_connected())
            .field("registry", &self.registry)
            .field("sink", &self.sink)
            .field("object_namespace", &self.object_namespace)
            .finish()
    }
}

impl Relmap<MemorySink> {
    /// Creates an engine that keeps generated source in memory.
    pub fn new() -> Self {
        Self::with_sink(MemorySink::new())
    }
}

impl Default for Relmap<MemorySink> {
    fn default() -> Self {
        Self::new()
    }
}

impl Relmap<Box<dyn CodeSink>> {
    /// Creates an engine whose sink follows `config`: files under
    /// `output_dir` when sources are emitted, memory otherwise.
    pub fn from_config(config: &CodegenConfig) -> Self {
        let sink: Box<dyn CodeSink> = if config.emit_sources {
            Box::new(FsSink::new(&config.output_dir))
        } else {
            Box::new(MemorySink::new())
        };
        Self::with_sink(sink)
    }
}

impl<S: CodeSink> Relmap<S> {
    /// Creates an engine writing generated source to `sink`.
    pub fn with_sink(sink: S) -> Self {
        Self {
            connection: None,
            registry: NamespaceRegistry::new(),
            sink,
            object_namespace: DEFAULT_OBJECT_NAMESPACE.to_string(),
        }
    }

    /// Sets the namespace types synthesized by object creation land in.
    pub fn with_object_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.object_namespace = namespace.into();
        self
    }

    /// Wraps the engine for sharing between threads.
    pub fn into_shared(self) -> SharedRelmap<S> {
        Arc::new(Mutex::new(self))
    }

    /// Returns the namespace registry.
    pub fn registry(&self) -> &NamespaceRegistry {
        &self.registry
    }

    /// Returns the code sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the namespace used by object creation.
    pub fn object_namespace(&self) -> &str {
        &self.object_namespace
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Opens a connection through `connector`, closing any previous one.
    pub fn connect(
        &mut self,
        connector: &dyn Connector,
        config: &ConnectionConfig,
    ) -> RelmapResult<()> {
        let conn = connector.connect(config)?;
        if let Some(mut previous) = self.connection.take() {
            if let Err(err) = previous.disconnect() {
                debug!(error = %err, "previous connection already closed");
            }
        }
        info!(host = %config.host, database = %config.database, "connected");
        self.connection = Some(conn);
        Ok(())
    }

    /// Adopts an already open connection, closing any previous one.
    pub fn attach(&mut self, conn: Box<dyn Connection>) {
        if let Some(mut previous) = self.connection.replace(conn) {
            if let Err(err) = previous.disconnect() {
                debug!(error = %err, "previous connection already closed");
            }
        }
    }

    /// Closes the connection.
    pub fn disconnect(&mut self) -> RelmapResult<()> {
        let mut conn = self.connection.take().ok_or(RelmapError::NotConnected)?;
        conn.disconnect()?;
        info!("disconnected");
        Ok(())
    }

    /// Returns true if an open connection is held.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map_or(false, |c| c.state() == ConnectionState::Connected)
    }

    fn catalog(&mut self) -> RelmapResult<SchemaCatalog<'_>> {
        Ok(SchemaCatalog::new(open(&mut self.connection)?))
    }

    fn matcher(&mut self) -> RelmapResult<StructuralMatcher<'_>> {
        Ok(StructuralMatcher::new(self.catalog()?))
    }

    // =========================================================================
    // Database information
    // =========================================================================

    /// Returns `Name: <database>, Version: <version>`.
    pub fn db_engine(&mut self) -> RelmapResult<String> {
        self.catalog()?.engine_info()
    }

    /// Returns the current database name.
    pub fn db_name(&mut self) -> RelmapResult<String> {
        self.catalog()?.database_name()
    }

    /// Returns the database size in megabytes.
    pub fn db_size(&mut self) -> RelmapResult<f64> {
        self.catalog()?.database_size()
    }

    /// Returns the table names.
    pub fn db_tables(&mut self) -> RelmapResult<Vec<String>> {
        self.catalog()?.table_names()
    }

    /// Returns `(ordinal, name, type)` for every column of `table`.
    pub fn db_table_structure(&mut self, table: &str) -> RelmapResult<Vec<(usize, String, String)>> {
        let descriptor = self.catalog()?.describe(table)?;
        Ok(descriptor.columns.iter().map(|c| c.as_triple()).collect())
    }

    /// Returns the full descriptor of `table`.
    pub fn db_table_descriptor(&mut self, table: &str) -> RelmapResult<TableDescriptor> {
        self.catalog()?.describe(table)
    }

    /// Returns the size of `table` in megabytes.
    pub fn db_table_size(&mut self, table: &str) -> RelmapResult<f64> {
        self.catalog()?.table_size(table)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// See [`StructuralMatcher::find_object`].
    pub fn find_object(
        &mut self,
        table: &str,
        fields: &[(&str, Value)],
    ) -> RelmapResult<Option<TypedRow>> {
        self.matcher()?.find_object(table, fields)
    }

    /// See [`StructuralMatcher::find_instance`].
    pub fn find_instance(&mut self, instance: &Instance) -> RelmapResult<Option<TypedRow>> {
        self.matcher()?.find_instance(instance)
    }

    /// See [`StructuralMatcher::find_objects_by`].
    pub fn find_objects_by(
        &mut self,
        table: &str,
        pairs: &[(&str, Value)],
    ) -> RelmapResult<Vec<TypedRow>> {
        self.matcher()?.find_objects_by(table, pairs)
    }

    /// See [`StructuralMatcher::find_class`].
    pub fn find_class(&mut self, fields: &[FieldSpec]) -> RelmapResult<ClassMatch> {
        self.matcher()?.find_class(fields)
    }

    /// See [`StructuralMatcher::find_type`].
    pub fn find_type(&mut self, ty: &GeneratedType) -> RelmapResult<ClassMatch> {
        self.matcher()?.find_type(ty)
    }

    /// See [`StructuralMatcher::find_classes_by`].
    pub fn find_classes_by<A: AsRef<str>>(
        &mut self,
        attributes: &[A],
    ) -> RelmapResult<Vec<TableDescriptor>> {
        self.matcher()?.find_classes_by(attributes)
    }

    // =========================================================================
    // Synthesis
    // =========================================================================

    /// See [`ObjectMaterializer::create_object`].
    pub fn create_object(
        &mut self,
        table: &str,
        id: impl Into<Value>,
    ) -> RelmapResult<Option<Instance>> {
        let conn = open(&mut self.connection)?;
        let synthesizer = TypeSynthesizer::new(&mut self.registry, &mut self.sink);
        ObjectMaterializer::new(SchemaCatalog::new(conn), synthesizer, &self.object_namespace)
            .create_object(table, &id.into())
    }

    /// See [`ObjectMaterializer::create_objects`].
    pub fn create_objects(
        &mut self,
        table: &str,
        first: i64,
        last: i64,
    ) -> RelmapResult<Vec<Instance>> {
        let conn = open(&mut self.connection)?;
        let synthesizer = TypeSynthesizer::new(&mut self.registry, &mut self.sink);
        ObjectMaterializer::new(SchemaCatalog::new(conn), synthesizer, &self.object_namespace)
            .create_objects(table, first, last)
    }

    /// Synthesizes the type for `table` into `namespace`.
    ///
    /// A no-op returning the existing type if one of the same name is
    /// already registered there.
    pub fn create_class(&mut self, table: &str, namespace: &str) -> RelmapResult<Arc<GeneratedType>> {
        let descriptor = SchemaCatalog::new(open(&mut self.connection)?).describe(table)?;
        TypeSynthesizer::new(&mut self.registry, &mut self.sink).synthesize(&descriptor, namespace)
    }

    /// Rebuilds `namespace` from every table connected to `table` by
    /// foreign keys. See [`ReferenceGraphWalker::build_hierarchy`].
    pub fn create_hierarchy(&mut self, table: &str, namespace: &str) -> RelmapResult<Hierarchy> {
        let conn = open(&mut self.connection)?;
        let synthesizer = TypeSynthesizer::new(&mut self.registry, &mut self.sink);
        ReferenceGraphWalker::new(SchemaCatalog::new(conn), synthesizer)
            .build_hierarchy(table, namespace)
    }
}
