//! Shape-based lookup of tables and rows.
//!
//! Four distinct rules, kept separate on purpose:
//!
//! | Operation                                   | Matches on                                   |
//! |---------------------------------------------|----------------------------------------------|
//! | [`find_object`](StructuralMatcher::find_object)         | every column, by value                       |
//! | [`find_objects_by`](StructuralMatcher::find_objects_by) | the given columns, by value                  |
//! | [`find_class`](StructuralMatcher::find_class)           | exactly the table's column set, by name      |
//! | [`find_classes_by`](StructuralMatcher::find_classes_by) | a subset of the table's columns, by name     |

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::{ColumnDescriptor, TableDescriptor, TypedRow, Value};

use crate::catalog::SchemaCatalog;
use crate::naming::to_snake;
use crate::registry::{GeneratedType, Instance};

/// One field of a shape passed to [`StructuralMatcher::find_class`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Declared SQL type, compared case-insensitively when present.
    pub declared_type: Option<String>,
}

impl FieldSpec {
    /// A field matched on name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
        }
    }

    /// A field matched on name and declared type.
    pub fn typed(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(declared_type.into()),
        }
    }

    /// Parses `name` or `name:type`.
    pub fn parse(spec: &str) -> RelmapResult<Self> {
        let (name, declared_type) = match spec.split_once(':') {
            Some((name, ty)) => (name.trim(), Some(ty.trim())),
            None => (spec.trim(), None),
        };
        if name.is_empty() || declared_type.map_or(false, str::is_empty) {
            return Err(RelmapError::InvalidAttributeSpec {
                message: format!("malformed field '{}'", spec),
            });
        }
        Ok(Self {
            name: name.to_string(),
            declared_type: declared_type.map(str::to_string),
        })
    }

    /// The shape of a generated type, with declared types.
    pub fn from_type(ty: &GeneratedType) -> Vec<Self> {
        ty.fields
            .iter()
            .map(|f| Self::typed(f.name.clone(), f.declared_type.clone()))
            .collect()
    }

    fn matches(&self, column: &ColumnDescriptor) -> bool {
        column.name == self.name
            && self
                .declared_type
                .as_deref()
                .map_or(true, |ty| ty.eq_ignore_ascii_case(&column.declared_type))
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declared_type {
            Some(ty) => write!(f, "{}:{}", self.name, ty),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The table matched by [`StructuralMatcher::find_class`] and its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMatch {
    /// The matched table.
    pub table: TableDescriptor,
    /// Every row of the table.
    pub rows: Vec<TypedRow>,
}

/// Resolves a caller-supplied attribute name to a column: exact name first,
/// then its snake-case spelling.
fn resolve_column<'t>(table: &'t TableDescriptor, name: &str) -> RelmapResult<&'t ColumnDescriptor> {
    table
        .column(name)
        .or_else(|| table.column(&to_snake(name)))
        .ok_or_else(|| RelmapError::UnknownAttribute {
            table: table.name.clone(),
            attribute: name.to_string(),
        })
}

fn validate_attribute(name: &str) -> RelmapResult<()> {
    if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
        return Err(RelmapError::InvalidAttributeSpec {
            message: format!("malformed attribute name '{}'", name),
        });
    }
    Ok(())
}

/// Shape and value matching over a [`SchemaCatalog`].
pub struct StructuralMatcher<'c> {
    catalog: SchemaCatalog<'c>,
}

impl<'c> StructuralMatcher<'c> {
    /// Creates a matcher.
    pub fn new(catalog: SchemaCatalog<'c>) -> Self {
        Self { catalog }
    }

    fn rows_where(
        &mut self,
        table: &TableDescriptor,
        filter: &[(&str, &Value)],
    ) -> RelmapResult<Vec<TypedRow>> {
        self.catalog
            .select_where(&table.name, filter)?
            .into_iter()
            .map(|row| TypedRow::from_row(table, row))
            .collect()
    }

    /// Finds the row of `table` equal to an object on every column.
    ///
    /// The object must name every column exactly once. A different field
    /// count fails with `IncompleteObject`; a field that is not a column
    /// fails with `UnknownAttribute`. Returns `None` if no row matches.
    pub fn find_object(
        &mut self,
        table: &str,
        fields: &[(&str, Value)],
    ) -> RelmapResult<Option<TypedRow>> {
        let descriptor = self.catalog.describe(table)?;
        if fields.len() != descriptor.len() {
            return Err(RelmapError::IncompleteObject {
                table: table.to_string(),
                expected: descriptor.len(),
                actual: fields.len(),
            });
        }

        let mut seen = HashSet::with_capacity(fields.len());
        let mut filter = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let column = resolve_column(&descriptor, name)?;
            if !seen.insert(column.ordinal) {
                return Err(RelmapError::IncompleteObject {
                    table: table.to_string(),
                    expected: descriptor.len(),
                    actual: seen.len(),
                });
            }
            filter.push((column.name.as_str(), value));
        }

        let mut rows = self.rows_where(&descriptor, &filter)?;
        debug!(table, matches = rows.len(), "object lookup");
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    /// Finds the row equal to `instance` in the table its type came from.
    pub fn find_instance(&mut self, instance: &Instance) -> RelmapResult<Option<TypedRow>> {
        let fields: Vec<(&str, Value)> = instance
            .iter()
            .map(|(name, value)| (name, value.clone()))
            .collect();
        self.find_object(&instance.generated_type().source_table, &fields)
    }

    /// Returns every row of `table` equal to all `(column, value)` pairs.
    ///
    /// No pairs returns every row.
    pub fn find_objects_by(
        &mut self,
        table: &str,
        pairs: &[(&str, Value)],
    ) -> RelmapResult<Vec<TypedRow>> {
        let descriptor = self.catalog.describe(table)?;
        let filter = pairs
            .iter()
            .map(|(name, value)| {
                resolve_column(&descriptor, name).map(|column| (column.name.as_str(), value))
            })
            .collect::<RelmapResult<Vec<_>>>()?;
        self.rows_where(&descriptor, &filter)
    }

    /// Finds the first table whose columns are exactly `fields` and returns
    /// all of its rows.
    ///
    /// Names must agree one-to-one; declared types are compared only for
    /// fields that carry one. Fails with `NoMatchingTable` if no table
    /// qualifies.
    pub fn find_class(&mut self, fields: &[FieldSpec]) -> RelmapResult<ClassMatch> {
        let mut names = HashSet::with_capacity(fields.len());
        for field in fields {
            validate_attribute(&field.name)?;
            if !names.insert(field.name.as_str()) {
                return Err(RelmapError::InvalidAttributeSpec {
                    message: format!("field '{}' given twice", field.name),
                });
            }
        }

        for table in self.catalog.describe_all()? {
            let same_shape = table.len() == fields.len()
                && fields
                    .iter()
                    .all(|f| table.columns.iter().any(|c| f.matches(c)));
            if same_shape {
                debug!(table = %table.name, "class shape matched");
                let rows = self.rows_where(&table, &[])?;
                return Ok(ClassMatch { table, rows });
            }
        }

        Err(RelmapError::NoMatchingTable {
            fields: fields.iter().map(ToString::to_string).collect(),
        })
    }

    /// Finds the table an existing generated type's shape matches.
    pub fn find_type(&mut self, ty: &GeneratedType) -> RelmapResult<ClassMatch> {
        self.find_class(&FieldSpec::from_type(ty))
    }

    /// Returns every table that has all of `attributes` as columns.
    ///
    /// Only names are compared; extra columns are allowed. Fails with
    /// `InvalidAttributeSpec` for an empty list or a blank name.
    pub fn find_classes_by<S: AsRef<str>>(
        &mut self,
        attributes: &[S],
    ) -> RelmapResult<Vec<TableDescriptor>> {
        if attributes.is_empty() {
            return Err(RelmapError::InvalidAttributeSpec {
                message: "at least one attribute is required".to_string(),
            });
        }
        for attr in attributes {
            validate_attribute(attr.as_ref())?;
        }

        Ok(self
            .catalog
            .describe_all()?
            .into_iter()
            .filter(|table| attributes.iter().all(|a| table.has_column(a.as_ref())))
            .collect())
    }
}
