//! System-wide constants for relmap.

// =============================================================================
// Schema Conventions
// =============================================================================

/// Name of the column treated as a table's identifier.
pub const IDENTIFIER_COLUMN: &str = "id";

// =============================================================================
// Size Reporting
// =============================================================================

/// Bytes in one megabyte, as used for table and database sizes.
pub const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Decimal places kept when reporting sizes in megabytes.
pub const SIZE_PRECISION: i32 = 3;

// =============================================================================
// Code Generation
// =============================================================================

/// Namespace that types synthesized on demand by object creation land in.
pub const DEFAULT_OBJECT_NAMESPACE: &str = "objects";

/// Default directory generated sources are written under.
pub const DEFAULT_CODEGEN_DIR: &str = "generated";

/// File name of a namespace's root module.
pub const NAMESPACE_ROOT_FILE: &str = "mod.rs";

/// Extension of generated source files.
pub const SOURCE_EXTENSION: &str = "rs";

/// Rounds a byte count to megabytes with [`SIZE_PRECISION`] decimals.
#[must_use]
pub fn bytes_to_megabytes(bytes: f64) -> f64 {
    let scale = 10f64.powi(SIZE_PRECISION);
    (bytes / BYTES_PER_MEGABYTE * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_megabytes() {
        assert_eq!(bytes_to_megabytes(0.0), 0.0);
        assert_eq!(bytes_to_megabytes(1024.0 * 1024.0), 1.0);
        assert_eq!(bytes_to_megabytes(16384.0), 0.016);
        assert_eq!(bytes_to_megabytes(1536.0 * 1024.0), 1.5);
    }
}
