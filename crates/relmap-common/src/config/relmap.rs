//! Configuration structures.
//!
//! Loaded from TOML files and overridden by command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CODEGEN_DIR;
use crate::error::{RelmapError, RelmapResult};

/// Parameters used to open a connection.
///
/// # Example
///
/// ```rust
/// use relmap_common::config::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .host("localhost")
///     .user("root")
///     .database("shop");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server hostname.
    #[serde(default = "default_host")]
    pub host: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password (read from config files, never written back).
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Database name.
    #[serde(default)]
    pub database: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Sets the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Validates the parameters.
    ///
    /// Host, user, and database must be non-blank. The password may be empty.
    pub fn validate(&self) -> RelmapResult<()> {
        for (field, value) in [
            ("host", &self.host),
            ("user", &self.user),
            ("database", &self.database),
        ] {
            if value.trim().is_empty() {
                return Err(RelmapError::Validation {
                    message: format!("{} must not be empty", field),
                });
            }
        }
        Ok(())
    }
}

/// Code generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Directory namespaces are written under.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Whether to write source files at all.
    #[serde(default = "default_emit_sources")]
    pub emit_sources: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CODEGEN_DIR)
}

fn default_emit_sources() -> bool {
    true
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            emit_sources: default_emit_sources(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelmapConfig {
    /// Connection parameters.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Code generation settings.
    #[serde(default)]
    pub codegen: CodegenConfig,

    /// Fixture file for the embedded backend.
    #[serde(default)]
    pub fixture: Option<PathBuf>,
}

impl RelmapConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> RelmapResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> RelmapResult<Self> {
        toml::from_str(content).map_err(|e| RelmapError::Config {
            message: e.to_string(),
        })
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> RelmapResult<String> {
        toml::to_string_pretty(self).map_err(|e| RelmapError::Config {
            message: e.to_string(),
        })
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> RelmapResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Loads the default configuration file.
    ///
    /// Looks in the following locations:
    /// 1. ~/.config/relmap/config.toml
    /// 2. ~/.relmap/config.toml
    /// 3. Returns default if not found
    pub fn load_default() -> RelmapResult<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("relmap").join("config.toml");
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".relmap").join("config.toml");
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Returns the default configuration file path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("relmap").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RelmapConfig::default();
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.codegen.output_dir, PathBuf::from("generated"));
        assert!(config.codegen.emit_sources);
        assert!(config.fixture.is_none());
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let config = ConnectionConfig::new().user("root");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RelmapError::Validation { .. }));
        assert!(err.to_string().contains("database"));

        let config = ConnectionConfig::new().host(" ").user("root").database("db");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_password_is_valid() {
        let config = ConnectionConfig::new().user("root").database("db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = RelmapConfig::new();
        config.connection = ConnectionConfig::new()
            .host("db.internal")
            .user("app")
            .password("secret")
            .database("shop");
        config.codegen.output_dir = PathBuf::from("out");

        config.save(&path).unwrap();

        let loaded = RelmapConfig::from_file(&path).unwrap();
        assert_eq!(loaded.connection.host, "db.internal");
        assert_eq!(loaded.connection.database, "shop");
        assert_eq!(loaded.connection.password, "");
        assert_eq!(loaded.codegen.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            fixture = "shop.toml"

            [connection]
            host = "db.example.com"
            user = "reader"
            database = "production"

            [codegen]
            emit_sources = false
        "#;

        let config = RelmapConfig::from_toml(toml).unwrap();
        assert_eq!(config.connection.host, "db.example.com");
        assert_eq!(config.connection.user, "reader");
        assert_eq!(config.fixture, Some(PathBuf::from("shop.toml")));
        assert!(!config.codegen.emit_sources);
        assert_eq!(config.codegen.output_dir, PathBuf::from("generated"));
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = RelmapConfig::from_toml("connection = 5").unwrap_err();
        assert!(matches!(err, RelmapError::Config { .. }));
    }
}
