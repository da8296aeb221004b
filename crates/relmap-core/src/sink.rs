//! Destinations for generated source.
//!
//! A [`CodeSink`] receives one rendered module per generated type plus the
//! namespace root that re-exports them. Sinks hold side artifacts only;
//! object construction never reads them back.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use relmap_common::constants::NAMESPACE_ROOT_FILE;
use relmap_common::error::{RelmapError, RelmapResult};

use crate::codegen::{render_module_index, render_type, source_file_name};
use crate::registry::GeneratedType;

/// Checks that `namespace` is usable as a module name.
pub fn validate_namespace(namespace: &str) -> RelmapResult<()> {
    let valid = !namespace.is_empty()
        && !namespace.starts_with(|c: char| c.is_ascii_digit())
        && namespace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RelmapError::invalid_argument(format!(
            "invalid namespace '{}': expected letters, digits and underscores",
            namespace
        )))
    }
}

/// Receives generated source for namespaces.
pub trait CodeSink: Send + fmt::Debug {
    /// Creates `namespace` if it does not exist.
    fn ensure_namespace(&mut self, namespace: &str) -> RelmapResult<()>;

    /// Returns true if source for type `name` exists in `namespace`.
    fn has_type(&self, namespace: &str, name: &str) -> RelmapResult<bool>;

    /// Writes the module for `ty`.
    fn write_type(&mut self, namespace: &str, ty: &GeneratedType) -> RelmapResult<()>;

    /// Rewrites the namespace root so every type in `types` is reachable.
    fn write_index(&mut self, namespace: &str, types: &[&GeneratedType]) -> RelmapResult<()>;

    /// Deletes `namespace` and everything in it. Missing namespaces are fine.
    fn remove_namespace(&mut self, namespace: &str) -> RelmapResult<()>;
}

impl<T: CodeSink + ?Sized> CodeSink for Box<T> {
    fn ensure_namespace(&mut self, namespace: &str) -> RelmapResult<()> {
        (**self).ensure_namespace(namespace)
    }

    fn has_type(&self, namespace: &str, name: &str) -> RelmapResult<bool> {
        (**self).has_type(namespace, name)
    }

    fn write_type(&mut self, namespace: &str, ty: &GeneratedType) -> RelmapResult<()> {
        (**self).write_type(namespace, ty)
    }

    fn write_index(&mut self, namespace: &str, types: &[&GeneratedType]) -> RelmapResult<()> {
        (**self).write_index(namespace, types)
    }

    fn remove_namespace(&mut self, namespace: &str) -> RelmapResult<()> {
        (**self).remove_namespace(namespace)
    }
}

/// Keeps generated source in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
    index_writes_left: Option<usize>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes index writes fail once `count` of them have succeeded.
    pub fn fail_index_after(mut self, count: usize) -> Self {
        self.index_writes_left = Some(count);
        self
    }

    /// Returns true if `namespace` exists.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Returns the contents of a file in `namespace`.
    pub fn source(&self, namespace: &str, file: &str) -> Option<&str> {
        self.namespaces
            .get(namespace)?
            .get(file)
            .map(String::as_str)
    }

    /// Returns the file names in `namespace`, sorted.
    pub fn files(&self, namespace: &str) -> Vec<&str> {
        self.namespaces
            .get(namespace)
            .map(|files| files.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn files_mut(&mut self, namespace: &str) -> RelmapResult<&mut BTreeMap<String, String>> {
        self.namespaces
            .get_mut(namespace)
            .ok_or_else(|| RelmapError::synthesis(namespace, "namespace does not exist"))
    }
}

impl CodeSink for MemorySink {
    fn ensure_namespace(&mut self, namespace: &str) -> RelmapResult<()> {
        self.namespaces.entry(namespace.to_string()).or_default();
        Ok(())
    }

    fn has_type(&self, namespace: &str, name: &str) -> RelmapResult<bool> {
        Ok(self.source(namespace, &source_file_name(name)).is_some())
    }

    fn write_type(&mut self, namespace: &str, ty: &GeneratedType) -> RelmapResult<()> {
        let file = source_file_name(&ty.name);
        self.files_mut(namespace)?.insert(file, render_type(ty));
        Ok(())
    }

    fn write_index(&mut self, namespace: &str, types: &[&GeneratedType]) -> RelmapResult<()> {
        if let Some(left) = self.index_writes_left.as_mut() {
            if *left == 0 {
                return Err(RelmapError::synthesis(
                    namespace,
                    "namespace root is not writable",
                ));
            }
            *left -= 1;
        }
        let index = render_module_index(types);
        self.files_mut(namespace)?
            .insert(NAMESPACE_ROOT_FILE.to_string(), index);
        Ok(())
    }

    fn remove_namespace(&mut self, namespace: &str) -> RelmapResult<()> {
        self.namespaces.remove(namespace);
        Ok(())
    }
}

/// Writes generated source under `<root>/<namespace>/`.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Creates a sink rooted at `root`. The directory is created on demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of `namespace`.
    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn write(&self, namespace: &str, file: &str, contents: &str) -> RelmapResult<()> {
        let path = self.namespace_dir(namespace).join(file);
        debug!(path = %path.display(), bytes = contents.len(), "writing generated source");
        fs::write(&path, contents).map_err(|e| io_error(namespace, &path, e))
    }
}

fn io_error(namespace: &str, path: &Path, err: io::Error) -> RelmapError {
    RelmapError::synthesis(namespace, format!("{}: {}", path.display(), err))
}

impl CodeSink for FsSink {
    fn ensure_namespace(&mut self, namespace: &str) -> RelmapResult<()> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).map_err(|e| io_error(namespace, &dir, e))
    }

    fn has_type(&self, namespace: &str, name: &str) -> RelmapResult<bool> {
        Ok(self
            .namespace_dir(namespace)
            .join(source_file_name(name))
            .is_file())
    }

    fn write_type(&mut self, namespace: &str, ty: &GeneratedType) -> RelmapResult<()> {
        self.write(namespace, &source_file_name(&ty.name), &render_type(ty))
    }

    fn write_index(&mut self, namespace: &str, types: &[&GeneratedType]) -> RelmapResult<()> {
        self.write(namespace, NAMESPACE_ROOT_FILE, &render_module_index(types))
    }

    fn remove_namespace(&mut self, namespace: &str) -> RelmapResult<()> {
        let dir = self.namespace_dir(namespace);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(namespace, &dir, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldDef;

    fn ty(name: &str) -> GeneratedType {
        GeneratedType {
            name: name.to_string(),
            namespace: "app".to_string(),
            source_table: name.to_lowercase(),
            fields: vec![FieldDef {
                name: "id".to_string(),
                declared_type: "int".to_string(),
                nullable: false,
            }],
        }
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("models").is_ok());
        assert!(validate_namespace("app_v2").is_ok());
        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("../etc").is_err());
        assert!(validate_namespace("a/b").is_err());
        assert!(validate_namespace("2app").is_err());
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        assert!(sink.write_type("app", &ty("Users")).is_err());

        sink.ensure_namespace("app").unwrap();
        assert!(!sink.has_type("app", "Users").unwrap());
        sink.write_type("app", &ty("Users")).unwrap();
        sink.write_index("app", &[&ty("Users")]).unwrap();
        assert!(sink.has_type("app", "Users").unwrap());
        assert_eq!(sink.files("app"), vec!["mod.rs", "users.rs"]);
        assert!(sink
            .source("app", "mod.rs")
            .unwrap()
            .contains("pub use users::Users;"));

        sink.remove_namespace("app").unwrap();
        assert!(!sink.has_namespace("app"));
        sink.remove_namespace("app").unwrap();
    }

    #[test]
    fn test_memory_sink_index_failure() {
        let mut sink = MemorySink::new().fail_index_after(1);
        sink.ensure_namespace("app").unwrap();
        sink.write_index("app", &[]).unwrap();
        let err = sink.write_index("app", &[]).unwrap_err();
        assert!(matches!(err, RelmapError::Synthesis { .. }));
    }

    #[test]
    fn test_fs_sink_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::new(dir.path());
        sink.ensure_namespace("app").unwrap();
        sink.write_type("app", &ty("Users")).unwrap();
        sink.write_index("app", &[&ty("Users")]).unwrap();

        let ns = dir.path().join("app");
        assert!(ns.join("users.rs").is_file());
        assert!(ns.join("mod.rs").is_file());
        assert!(sink.has_type("app", "Users").unwrap());
        assert!(!sink.has_type("app", "Orders").unwrap());

        let source = fs::read_to_string(ns.join("users.rs")).unwrap();
        assert!(source.contains("pub struct Users {"));

        sink.remove_namespace("app").unwrap();
        assert!(!ns.exists());
        sink.remove_namespace("app").unwrap();
    }

    #[test]
    fn test_fs_sink_write_without_namespace_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::new(dir.path());
        let err = sink.write_type("missing", &ty("Users")).unwrap_err();
        assert!(matches!(err, RelmapError::Synthesis { .. }));
    }
}
