//! Engine error types.
//!
//! Every failure the engine can surface to a caller is a variant of
//! [`RelmapError`]. None of them are retried internally.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0000,
    /// Invalid argument provided.
    InvalidArgument = 0x0001,
    /// I/O error.
    Io = 0x0002,
    /// Configuration could not be read or written.
    Config = 0x0003,

    // Connection errors (0x0100 - 0x01FF)
    /// No active connection.
    NotConnected = 0x0100,
    /// Connection parameters rejected.
    Validation = 0x0101,
    /// Backend failed to run a statement.
    Query = 0x0102,

    // Schema errors (0x0200 - 0x02FF)
    /// Table does not exist.
    UnknownTable = 0x0200,
    /// Column does not exist.
    UnknownAttribute = 0x0201,

    // Input errors (0x0300 - 0x03FF)
    /// Object fields do not cover the table.
    IncompleteObject = 0x0300,
    /// Attribute specification is malformed.
    InvalidAttributeSpec = 0x0301,
    /// Wrong number of constructor values.
    ArityMismatch = 0x0302,

    // Lookup errors (0x0400 - 0x04FF)
    /// No table has the requested shape.
    NoMatchingTable = 0x0400,
    /// Table has no identifier column.
    NoIdentifierColumn = 0x0401,
    /// Table has no identifier column for a range fetch.
    MissingIdColumn = 0x0402,
    /// Aggregate query returned no row.
    NoData = 0x0403,

    // Codegen errors (0x0500 - 0x05FF)
    /// Namespace could not be written.
    Synthesis = 0x0500,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Connection",
            0x02 => "Schema",
            0x03 => "Input",
            0x04 => "Lookup",
            0x05 => "Codegen",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for relmap.
///
/// # Example
///
/// ```rust
/// use relmap_common::error::{RelmapError, RelmapResult};
///
/// fn lookup(table: &str) -> RelmapResult<()> {
///     Err(RelmapError::UnknownTable { table: table.to_string() })
/// }
///
/// assert!(lookup("ghost").is_err());
/// ```
#[derive(Debug, Error)]
pub enum RelmapError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed or written.
    #[error("configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Connection Errors
    // ==========================================================================
    /// No connection is held.
    #[error("database isn't connected")]
    NotConnected,

    /// Connection parameters were rejected.
    #[error("invalid connection parameters: {message}")]
    Validation {
        /// Error message.
        message: String,
    },

    /// The backend could not run a statement.
    #[error("query failed: {message}")]
    Query {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Schema Errors
    // ==========================================================================
    /// Table does not exist in the current schema.
    #[error("table '{table}' does not exist")]
    UnknownTable {
        /// The missing table.
        table: String,
    },

    /// Attribute is not a column of the table.
    #[error("attribute '{attribute}' is not a column of table '{table}'")]
    UnknownAttribute {
        /// The table name.
        table: String,
        /// The unknown attribute.
        attribute: String,
    },

    // ==========================================================================
    // Input Errors
    // ==========================================================================
    /// Object field count differs from the table's column count.
    #[error("object has {actual} fields but table '{table}' has {expected} columns")]
    IncompleteObject {
        /// The table name.
        table: String,
        /// Number of columns in the table.
        expected: usize,
        /// Number of fields on the object.
        actual: usize,
    },

    /// Attribute specification is malformed.
    #[error("invalid attribute specification: {message}")]
    InvalidAttributeSpec {
        /// Error message.
        message: String,
    },

    /// Constructor called with the wrong number of values.
    #[error("type '{type_name}' takes {expected} values, got {actual}")]
    ArityMismatch {
        /// The generated type.
        type_name: String,
        /// Number of fields.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    // ==========================================================================
    // Lookup Errors
    // ==========================================================================
    /// No table has the requested column set.
    #[error("no table matches fields [{}]", fields.join(", "))]
    NoMatchingTable {
        /// The requested field names.
        fields: Vec<String>,
    },

    /// Table has no identifier column.
    #[error("table '{table}' has no identifier column")]
    NoIdentifierColumn {
        /// The table name.
        table: String,
    },

    /// Table has no identifier column to range over.
    #[error("table '{table}' has no id column")]
    MissingIdColumn {
        /// The table name.
        table: String,
    },

    /// Aggregate query returned no row.
    #[error("no data returned for {what}")]
    NoData {
        /// What was being measured.
        what: String,
    },

    // ==========================================================================
    // Codegen Errors
    // ==========================================================================
    /// Namespace could not be written.
    #[error("failed to synthesize into namespace '{namespace}': {message}")]
    Synthesis {
        /// The target namespace.
        namespace: String,
        /// Error message.
        message: String,
    },
}

impl RelmapError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Io { .. } => ErrorCode::Io,
            Self::Config { .. } => ErrorCode::Config,
            Self::NotConnected => ErrorCode::NotConnected,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::Query { .. } => ErrorCode::Query,
            Self::UnknownTable { .. } => ErrorCode::UnknownTable,
            Self::UnknownAttribute { .. } => ErrorCode::UnknownAttribute,
            Self::IncompleteObject { .. } => ErrorCode::IncompleteObject,
            Self::InvalidAttributeSpec { .. } => ErrorCode::InvalidAttributeSpec,
            Self::ArityMismatch { .. } => ErrorCode::ArityMismatch,
            Self::NoMatchingTable { .. } => ErrorCode::NoMatchingTable,
            Self::NoIdentifierColumn { .. } => ErrorCode::NoIdentifierColumn,
            Self::MissingIdColumn { .. } => ErrorCode::MissingIdColumn,
            Self::NoData { .. } => ErrorCode::NoData,
            Self::Synthesis { .. } => ErrorCode::Synthesis,
        }
    }

    /// Returns true if the error was caused by caller input rather than
    /// the backend or the environment.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self.code().as_u16() >> 8,
            0x02 | 0x03
        ) || matches!(self, Self::InvalidArgument { .. })
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a query error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Creates a synthesis error for `namespace`.
    #[must_use]
    pub fn synthesis(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Synthesis {
            namespace: namespace.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = RelmapError::UnknownTable {
            table: "ghost".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::UnknownTable);
        assert_eq!(err.code().category(), "Schema");
        assert_eq!(RelmapError::NotConnected.code().category(), "Connection");
    }

    #[test]
    fn test_error_display() {
        let err = RelmapError::NoMatchingTable {
            fields: vec!["id".to_string(), "name".to_string()],
        };
        assert_eq!(err.to_string(), "no table matches fields [id, name]");
        assert_eq!(
            RelmapError::NotConnected.to_string(),
            "database isn't connected"
        );
    }

    #[test]
    fn test_caller_error() {
        let err = RelmapError::IncompleteObject {
            table: "users".to_string(),
            expected: 3,
            actual: 2,
        };
        assert!(err.is_caller_error());
        assert!(RelmapError::invalid_argument("bad").is_caller_error());
        assert!(!RelmapError::NotConnected.is_caller_error());
        assert!(!RelmapError::query("boom").is_caller_error());
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RelmapError = io_err.into();
        assert_eq!(err.code(), ErrorCode::Io);
    }
}
