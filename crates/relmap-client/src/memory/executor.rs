//! Evaluation of lowered requests against in-memory tables.

use std::borrow::Cow;
use std::cmp::Ordering;

use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::{Row, Value};

use super::parser::{Operand, Predicate, Projection, Relation, Request, SelectRequest};
use super::DatabaseState;

static NULL: Value = Value::Null;

/// Columns and rows of the relation a select reads.
struct RelationData<'a> {
    columns: Vec<String>,
    rows: Cow<'a, [Row]>,
}

impl RelationData<'_> {
    fn column_index(&self, name: &str, clause: &str) -> RelmapResult<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                RelmapError::query(format!("Unknown column '{}' in '{}'", name, clause))
            })
    }
}

/// Runs `request` against `state` with positional `params`.
pub(crate) fn execute(
    state: &DatabaseState,
    request: &Request,
    params: &[Value],
) -> RelmapResult<Vec<Row>> {
    match request {
        Request::ShowTables => Ok(state
            .tables
            .keys()
            .map(|name| vec![Value::String(name.clone())])
            .collect()),
        Request::Describe { table } => describe(state, table),
        Request::Select(select) => {
            if select.param_count != params.len() {
                return Err(RelmapError::query(format!(
                    "statement has {} placeholders but {} parameters were bound",
                    select.param_count,
                    params.len()
                )));
            }
            match &select.from {
                Some(relation) => {
                    let data = resolve(state, relation)?;
                    run_select(state, select, &data, params)
                }
                None => run_scalar_select(state, select),
            }
        }
    }
}

fn describe(state: &DatabaseState, table: &str) -> RelmapResult<Vec<Row>> {
    let table = state.table(table)?;
    Ok(table
        .columns
        .iter()
        .map(|col| {
            let key = if col.primary_key {
                "PRI"
            } else if table.foreign_keys.iter().any(|fk| fk.column == col.name) {
                "MUL"
            } else {
                ""
            };
            vec![
                Value::String(col.name.clone()),
                Value::String(col.declared_type.clone()),
                Value::from(if col.nullable { "YES" } else { "NO" }),
                Value::from(key),
                Value::Null,
                Value::from(""),
            ]
        })
        .collect())
}

fn resolve<'a>(state: &'a DatabaseState, relation: &Relation) -> RelmapResult<RelationData<'a>> {
    match relation {
        Relation::Table(name) => {
            let table = state.table(name)?;
            Ok(RelationData {
                columns: table.columns.iter().map(|c| c.name.clone()).collect(),
                rows: Cow::Borrowed(&table.rows),
            })
        }
        Relation::InformationSchema(name) => match name.as_str() {
            "TABLES" => Ok(information_schema_tables(state)),
            "KEY_COLUMN_USAGE" => Ok(information_schema_key_column_usage(state)),
            other => Err(RelmapError::query(format!(
                "Unknown table '{}' in information_schema",
                other
            ))),
        },
    }
}

fn information_schema_tables(state: &DatabaseState) -> RelationData<'static> {
    let columns = [
        "TABLE_SCHEMA",
        "TABLE_NAME",
        "TABLE_TYPE",
        "ENGINE",
        "TABLE_ROWS",
        "DATA_LENGTH",
        "INDEX_LENGTH",
    ];
    let rows = state
        .tables
        .values()
        .map(|table| {
            vec![
                Value::String(state.name.clone()),
                Value::String(table.name.clone()),
                Value::from("BASE TABLE"),
                Value::from("MEMORY"),
                Value::Integer(table.rows.len() as i64),
                Value::Integer(table.data_length() as i64),
                Value::Integer(table.index_length as i64),
            ]
        })
        .collect::<Vec<_>>();

    RelationData {
        columns: columns.iter().map(|c| (*c).to_string()).collect(),
        rows: Cow::Owned(rows),
    }
}

fn information_schema_key_column_usage(state: &DatabaseState) -> RelationData<'static> {
    let columns = [
        "CONSTRAINT_SCHEMA",
        "CONSTRAINT_NAME",
        "TABLE_SCHEMA",
        "TABLE_NAME",
        "COLUMN_NAME",
        "ORDINAL_POSITION",
        "REFERENCED_TABLE_SCHEMA",
        "REFERENCED_TABLE_NAME",
        "REFERENCED_COLUMN_NAME",
    ];
    let schema = Value::String(state.name.clone());
    let mut rows = Vec::new();

    for table in state.tables.values() {
        let keys = table.columns.iter().filter(|c| c.primary_key);
        for (position, col) in keys.enumerate() {
            rows.push(vec![
                schema.clone(),
                Value::from("PRIMARY"),
                schema.clone(),
                Value::String(table.name.clone()),
                Value::String(col.name.clone()),
                Value::Integer(position as i64 + 1),
                Value::Null,
                Value::Null,
                Value::Null,
            ]);
        }

        for fk in &table.foreign_keys {
            rows.push(vec![
                schema.clone(),
                Value::String(format!("fk_{}_{}", table.name, fk.column)),
                schema.clone(),
                Value::String(table.name.clone()),
                Value::String(fk.column.clone()),
                Value::Integer(1),
                schema.clone(),
                Value::String(fk.references.clone()),
                Value::String(fk.referenced_column.clone()),
            ]);
        }
    }

    RelationData {
        columns: columns.iter().map(|c| (*c).to_string()).collect(),
        rows: Cow::Owned(rows),
    }
}

/// A predicate with its column references resolved to indices.
enum Bound<'a> {
    Column(usize),
    Value(&'a Value),
}

impl<'a> Bound<'a> {
    fn bind(
        operand: &'a Operand,
        data: &RelationData<'_>,
        params: &'a [Value],
    ) -> RelmapResult<Self> {
        match operand {
            Operand::Column(name) => data.column_index(name, "where clause").map(Bound::Column),
            Operand::Literal(value) => Ok(Bound::Value(value)),
            Operand::Param(i) => params
                .get(*i)
                .map(Bound::Value)
                .ok_or_else(|| RelmapError::query(format!("missing parameter {}", i))),
        }
    }

    fn eval<'r>(&self, row: &'r Row) -> &'r Value
    where
        'a: 'r,
    {
        match self {
            Bound::Column(i) => row.get(*i).unwrap_or(&NULL),
            Bound::Value(v) => v,
        }
    }
}

enum BoundPredicate<'a> {
    Eq(Bound<'a>, Bound<'a>),
    IsNull(Bound<'a>, bool),
    Between(Bound<'a>, Bound<'a>, Bound<'a>, bool),
}

impl BoundPredicate<'_> {
    fn matches(&self, row: &Row) -> bool {
        match self {
            BoundPredicate::Eq(a, b) => a.eval(row).sql_eq(b.eval(row)),
            BoundPredicate::IsNull(a, negated) => a.eval(row).is_null() != *negated,
            BoundPredicate::Between(a, low, high, negated) => {
                let value = a.eval(row);
                let within = matches!(
                    value.sql_cmp(low.eval(row)),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    value.sql_cmp(high.eval(row)),
                    Some(Ordering::Less | Ordering::Equal)
                );
                // NULL BETWEEN .. is unknown either way.
                !value.is_null() && within != *negated
            }
        }
    }
}

fn bind_predicate<'a>(
    predicate: &'a Predicate,
    data: &RelationData<'_>,
    params: &'a [Value],
) -> RelmapResult<BoundPredicate<'a>> {
    Ok(match predicate {
        Predicate::Eq(a, b) => {
            BoundPredicate::Eq(Bound::bind(a, data, params)?, Bound::bind(b, data, params)?)
        }
        Predicate::IsNull { operand, negated } => {
            BoundPredicate::IsNull(Bound::bind(operand, data, params)?, *negated)
        }
        Predicate::Between {
            operand,
            low,
            high,
            negated,
        } => BoundPredicate::Between(
            Bound::bind(operand, data, params)?,
            Bound::bind(low, data, params)?,
            Bound::bind(high, data, params)?,
            *negated,
        ),
    })
}

fn run_select(
    state: &DatabaseState,
    select: &SelectRequest,
    data: &RelationData<'_>,
    params: &[Value],
) -> RelmapResult<Vec<Row>> {
    let predicates = select
        .filter
        .iter()
        .map(|p| bind_predicate(p, data, params))
        .collect::<RelmapResult<Vec<_>>>()?;

    let sort_keys = select
        .order_by
        .iter()
        .map(|(name, asc)| data.column_index(name, "order clause").map(|i| (i, *asc)))
        .collect::<RelmapResult<Vec<_>>>()?;

    let mut rows: Vec<&Row> = data
        .rows
        .iter()
        .filter(|row| predicates.iter().all(|p| p.matches(row)))
        .collect();

    if !sort_keys.is_empty() {
        rows.sort_by(|a, b| {
            for (index, asc) in &sort_keys {
                let ordering = compare_for_sort(&a[*index], &b[*index]);
                let ordering = if *asc { ordering } else { ordering.reverse() };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    rows.into_iter()
        .map(|row| project(state, &select.projection, Some((data, row))))
        .collect()
}

/// Sort order used by `ORDER BY`: NULLs first, incomparable values equal.
fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.sql_cmp(b).unwrap_or(Ordering::Equal),
    }
}

fn run_scalar_select(state: &DatabaseState, select: &SelectRequest) -> RelmapResult<Vec<Row>> {
    if !select.filter.is_empty() || !select.order_by.is_empty() {
        return Err(RelmapError::query("WHERE/ORDER BY require a FROM clause"));
    }
    Ok(vec![project(state, &select.projection, None)?])
}

fn project(
    state: &DatabaseState,
    projection: &[Projection],
    source: Option<(&RelationData<'_>, &Row)>,
) -> RelmapResult<Row> {
    let mut out = Vec::with_capacity(projection.len());
    for item in projection {
        match (item, source) {
            (Projection::Wildcard, Some((_, row))) => out.extend(row.iter().cloned()),
            (Projection::Wildcard, None) => {
                return Err(RelmapError::query("No tables used"));
            }
            (Projection::Column(name), Some((data, row))) => {
                let index = data.column_index(name, "field list")?;
                out.push(row.get(index).cloned().unwrap_or(Value::Null));
            }
            (Projection::Column(name), None) => {
                return Err(RelmapError::query(format!(
                    "Unknown column '{}' in 'field list'",
                    name
                )));
            }
            (Projection::Function(name), _) => out.push(call_function(state, name)?),
            (Projection::Literal(value), _) => out.push(value.clone()),
        }
    }
    Ok(out)
}

fn call_function(state: &DatabaseState, name: &str) -> RelmapResult<Value> {
    match name {
        "DATABASE" | "SCHEMA" => Ok(Value::String(state.name.clone())),
        "VERSION" => Ok(Value::String(state.version.clone())),
        other => Err(RelmapError::query(format!(
            "FUNCTION {}.{} does not exist",
            state.name, other
        ))),
    }
}
