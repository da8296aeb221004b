//! Output formatting for command results.
//!
//! Supports table, JSON, CSV, and raw output formats.

use comfy_table::{Cell, ContentArrangement, Table};
use serde_json::{json, Value as JsonValue};

use relmap_common::types::{Row, TypedRow, Value};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Formatted table output.
    Table,
    /// JSON output.
    Json,
    /// CSV output.
    Csv,
    /// Raw output (values separated by tabs).
    Raw,
}

/// Tabular output of a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Line printed above table and raw output.
    pub title: Option<String>,
    /// Column headers.
    pub columns: Vec<String>,
    /// Rows in display order.
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Creates an empty result with the given headers.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: None,
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// A single named value.
    pub fn scalar(column: &str, value: impl Into<Value>) -> Self {
        let mut result = Self::new([column]);
        result.rows.push(vec![value.into()]);
        result
    }

    /// Rows annotated with their column names. Headers come from the first
    /// row.
    pub fn from_typed_rows(rows: &[TypedRow]) -> Self {
        let columns = rows
            .first()
            .map(|r| r.fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default();
        Self {
            title: None,
            columns,
            rows: rows.iter().map(TypedRow::values).collect(),
        }
    }

    /// Sets the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Appends a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }
}

/// Formats a result according to the specified format.
pub fn format_result(result: &ResultSet, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_table(result),
        OutputFormat::Json => format_json(result),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Raw => format_raw(result),
    }
}

/// Formats the result as a table.
fn format_table(result: &ResultSet) -> String {
    let mut output = String::new();
    if let Some(title) = &result.title {
        output.push_str(title);
        output.push('\n');
    }
    if result.columns.is_empty() && result.rows.is_empty() {
        output.push_str("(0 rows)");
        return output;
    }

    let mut table = Table::new();

    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    if !result.columns.is_empty() {
        table.set_header(result.columns.iter().map(Cell::new));
    }

    for row in &result.rows {
        let cells: Vec<Cell> = row.iter().map(|v| Cell::new(v.to_string())).collect();
        table.add_row(cells);
    }

    output.push_str(&table.to_string());
    output
}

/// Formats the result as a JSON array of objects.
fn format_json(result: &ResultSet) -> String {
    let rows: Vec<JsonValue> = result
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, value) in row.iter().enumerate() {
                let col_name = result
                    .columns
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i));
                obj.insert(col_name, value_to_json(value));
            }
            JsonValue::Object(obj)
        })
        .collect();

    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => json!(*b),
        Value::Integer(i) => json!(*i),
        Value::Float(f) => json!(*f),
        Value::String(s) => json!(s),
        Value::Bytes(b) => json!(b),
    }
}

/// Formats the result as CSV.
fn format_csv(result: &ResultSet) -> String {
    let mut output = String::new();

    if !result.columns.is_empty() {
        let header: Vec<String> = result.columns.iter().map(|c| escape_csv(c)).collect();
        output.push_str(&header.join(","));
        output.push('\n');
    }

    for row in &result.rows {
        let values: Vec<String> = row.iter().map(|v| escape_csv(&v.to_string())).collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

/// Escapes a value for CSV output.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Formats the result as raw tab-separated values.
fn format_raw(result: &ResultSet) -> String {
    let mut output = String::new();

    if let Some(title) = &result.title {
        output.push_str(title);
        output.push('\n');
    }

    if !result.columns.is_empty() {
        output.push_str(&result.columns.join("\t"));
        output.push('\n');
    }

    for row in &result.rows {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        output.push_str(&values.join("\t"));
        output.push('\n');
    }

    output
}
