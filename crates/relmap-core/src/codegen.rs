//! Rust source rendering for generated types.
//!
//! Each [`GeneratedType`] renders to one module holding a struct with a
//! field per column and a positional `new` constructor. A namespace root
//! declares those modules and re-exports their types.

use std::collections::HashSet;

use itertools::Itertools;

use relmap_common::constants::SOURCE_EXTENSION;

use crate::naming::to_snake;
use crate::registry::{FieldDef, GeneratedType};

const HEADER: &str = "// @generated by relmap. Do not edit.";

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const NON_RAW_KEYWORDS: &[&str] = &["_", "crate", "self", "super", "Self"];

/// A buffer for generated code that tracks block indentation.
#[derive(Debug, Default)]
pub struct CodegenBuf {
    inner: String,
    level: usize,
}

impl CodegenBuf {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a line at the current indentation.
    pub fn writeln(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if !line.is_empty() {
            for _ in 0..self.level {
                self.inner.push_str("    ");
            }
            self.inner.push_str(line);
        }
        self.inner.push('\n');
    }

    /// Writes an empty line.
    pub fn blank(&mut self) {
        self.inner.push('\n');
    }

    /// Writes `header {` and indents.
    pub fn start_block(&mut self, header: impl AsRef<str>) {
        let header = header.as_ref();
        if header.is_empty() {
            self.writeln("{");
        } else {
            self.writeln(format!("{} {{", header));
        }
        self.level += 1;
    }

    /// Dedents and writes `}`.
    pub fn end_block(&mut self) {
        self.level = self.level.saturating_sub(1);
        self.writeln("}");
    }

    /// Returns the generated code.
    pub fn into_string(self) -> String {
        self.inner
    }
}

/// Maps a declared SQL type to the Rust type used for its field.
pub fn rust_type(declared_type: &str) -> &'static str {
    let lower = declared_type.trim().to_ascii_lowercase();
    let unsigned = lower.contains("unsigned");
    let base = lower
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    match base {
        "bool" | "boolean" => "bool",
        "tinyint" if lower.starts_with("tinyint(1)") => "bool",
        "tinyint" if unsigned => "u8",
        "tinyint" => "i8",
        "smallint" if unsigned => "u16",
        "smallint" => "i16",
        "mediumint" | "int" | "integer" if unsigned => "u32",
        "mediumint" | "int" | "integer" => "i32",
        "bigint" if unsigned => "u64",
        "bigint" => "i64",
        "float" => "f32",
        "double" | "real" | "decimal" | "numeric" => "f64",
        "binary" | "varbinary" | "bit" | "blob" | "tinyblob" | "mediumblob" | "longblob" => {
            "Vec<u8>"
        }
        _ => "String",
    }
}

/// Converts a column or table name into a Rust identifier.
pub fn rust_ident(name: &str) -> String {
    let mut ident: String = to_snake(name)
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if NON_RAW_KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    } else if KEYWORDS.contains(&ident.as_str()) {
        ident.insert_str(0, "r#");
    }
    ident
}

/// Returns the struct name for a type, suffixed if it is a keyword.
pub fn type_ident(type_name: &str) -> String {
    if NON_RAW_KEYWORDS.contains(&type_name) {
        format!("{}_", type_name)
    } else {
        type_name.to_string()
    }
}

/// Converts field names into distinct Rust identifiers, in order.
///
/// Names that map to an identifier already taken get a numeric suffix.
pub fn field_idents(fields: &[FieldDef]) -> Vec<String> {
    let mut taken = HashSet::new();
    fields
        .iter()
        .map(|field| {
            let base = rust_ident(&field.name);
            let mut ident = base.clone();
            let mut n = 2;
            while !taken.insert(ident.clone()) {
                ident = format!("{}_{}", base.trim_start_matches("r#"), n);
                n += 1;
            }
            ident
        })
        .collect()
}

/// Returns the module a type of the given name is declared in.
pub fn module_name(type_name: &str) -> String {
    rust_ident(type_name)
}

/// Returns the file a type of the given name is written to.
pub fn source_file_name(type_name: &str) -> String {
    format!(
        "{}.{}",
        module_name(type_name).trim_start_matches("r#"),
        SOURCE_EXTENSION
    )
}

fn field_type(field: &FieldDef) -> String {
    let ty = rust_type(&field.declared_type);
    if field.nullable {
        format!("Option<{}>", ty)
    } else {
        ty.to_string()
    }
}

/// Renders the module for one generated type.
pub fn render_type(ty: &GeneratedType) -> String {
    let name = type_ident(&ty.name);
    let mut buf = CodegenBuf::new();
    buf.writeln(HEADER);
    buf.blank();
    buf.writeln(format!("/// Row of the `{}` table.", ty.source_table));
    buf.writeln("#[derive(Debug, Clone, PartialEq)]");

    if ty.fields.is_empty() {
        buf.writeln(format!("pub struct {};", name));
        buf.blank();
        buf.start_block(format!("impl {}", name));
        buf.start_block("pub fn new() -> Self");
        buf.writeln("Self");
        buf.end_block();
        buf.end_block();
        return buf.into_string();
    }

    let idents = field_idents(&ty.fields);

    buf.start_block(format!("pub struct {}", name));
    for (field, ident) in ty.fields.iter().zip(&idents) {
        buf.writeln(format!("/// `{}`", field.declared_type));
        buf.writeln(format!("pub {}: {},", ident, field_type(field)));
    }
    buf.end_block();
    buf.blank();

    let params = ty
        .fields
        .iter()
        .zip(&idents)
        .map(|(f, ident)| format!("{}: {}", ident, field_type(f)))
        .join(", ");
    let names = idents.iter().join(", ");

    buf.start_block(format!("impl {}", name));
    buf.writeln("#[allow(clippy::too_many_arguments)]");
    buf.start_block(format!("pub fn new({}) -> Self", params));
    buf.writeln(format!("Self {{ {} }}", names));
    buf.end_block();
    buf.end_block();

    buf.into_string()
}

/// Renders a namespace root declaring and re-exporting `types`.
pub fn render_module_index(types: &[&GeneratedType]) -> String {
    let mut buf = CodegenBuf::new();
    buf.writeln(HEADER);
    if types.is_empty() {
        return buf.into_string();
    }

    buf.blank();
    for ty in types.iter().sorted_by_key(|t| module_name(&t.name)) {
        buf.writeln(format!("pub mod {};", module_name(&ty.name)));
    }
    buf.blank();
    for ty in types.iter().sorted_by_key(|t| module_name(&t.name)) {
        buf.writeln(format!(
            "pub use {}::{};",
            module_name(&ty.name),
            type_ident(&ty.name)
        ));
    }
    buf.into_string()
}
