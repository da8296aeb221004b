//! Translation of the SQL subset the engine issues.
//!
//! Statements are parsed with `sqlparser`'s MySQL dialect and lowered into a
//! [`Request`]. Anything outside the subset is rejected with a query error
//! rather than silently approximated.

use sqlparser::ast as sql_ast;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser as SqlParser;

use relmap_common::error::{RelmapError, RelmapResult};
use relmap_common::types::Value;

/// A lowered statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
    /// `SHOW TABLES`.
    ShowTables,
    /// `DESCRIBE <table>`.
    Describe { table: String },
    /// A single-relation `SELECT`.
    Select(SelectRequest),
}

/// A single-relation `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectRequest {
    /// Output expressions.
    pub projection: Vec<Projection>,
    /// Source relation; `None` for `SELECT DATABASE()` and friends.
    pub from: Option<Relation>,
    /// Conjunctive filter.
    pub filter: Vec<Predicate>,
    /// Sort keys: column name and ascending flag.
    pub order_by: Vec<(String, bool)>,
    /// Number of `?` placeholders in the statement.
    pub param_count: usize,
}

/// A projected expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    /// `*`
    Wildcard,
    /// A column, by name.
    Column(String),
    /// A zero-argument server function such as `DATABASE()`.
    Function(String),
    /// A constant.
    Literal(Value),
}

/// The relation a `SELECT` reads.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Relation {
    /// A user table.
    Table(String),
    /// `information_schema.<name>`, name upper-cased.
    InformationSchema(String),
}

/// A value-producing operand in a predicate.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    /// Column reference.
    Column(String),
    /// Constant.
    Literal(Value),
    /// Positional parameter, zero-based.
    Param(usize),
}

/// One conjunct of a `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    /// `a = b`
    Eq(Operand, Operand),
    /// `a IS NULL` / `a IS NOT NULL`
    IsNull { operand: Operand, negated: bool },
    /// `a [NOT] BETWEEN low AND high`
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
        negated: bool,
    },
}

fn unsupported(what: impl std::fmt::Display) -> RelmapError {
    RelmapError::query(format!("unsupported SQL: {}", what))
}

/// Parses one statement.
pub(crate) fn parse(sql: &str) -> RelmapResult<Request> {
    let dialect = MySqlDialect {};
    let mut statements = SqlParser::parse_sql(&dialect, sql)
        .map_err(|e| RelmapError::query(format!("SQL syntax error: {}", e)))?;

    if statements.len() != 1 {
        return Err(RelmapError::query(format!(
            "expected 1 statement, got {}",
            statements.len()
        )));
    }

    match statements.remove(0) {
        sql_ast::Statement::ShowTables { .. } => Ok(Request::ShowTables),
        sql_ast::Statement::ExplainTable { table_name, .. } => Ok(Request::Describe {
            table: object_leaf(&table_name),
        }),
        sql_ast::Statement::Query(query) => {
            let mut lowering = Lowering::default();
            lowering.query(*query).map(Request::Select)
        }
        other => Err(unsupported(other)),
    }
}

fn object_leaf(name: &sql_ast::ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}

/// Lowers AST nodes while numbering placeholders in textual order.
#[derive(Default)]
struct Lowering {
    params: usize,
}

impl Lowering {
    fn query(&mut self, query: sql_ast::Query) -> RelmapResult<SelectRequest> {
        if query.with.is_some() {
            return Err(unsupported("WITH"));
        }
        if query.limit.is_some() || query.offset.is_some() {
            return Err(unsupported("LIMIT/OFFSET"));
        }

        let select = match *query.body {
            sql_ast::SetExpr::Select(select) => *select,
            other => return Err(unsupported(other)),
        };

        let projection = select
            .projection
            .into_iter()
            .map(|item| self.projection(item))
            .collect::<RelmapResult<Vec<_>>>()?;

        let from = match select.from.len() {
            0 => None,
            1 => {
                let table = select.from.into_iter().next().ok_or_else(|| unsupported("FROM"))?;
                if !table.joins.is_empty() {
                    return Err(unsupported("JOIN"));
                }
                Some(relation(table.relation)?)
            }
            _ => return Err(unsupported("multiple relations in FROM")),
        };

        let mut filter = Vec::new();
        if let Some(selection) = select.selection {
            self.conjuncts(selection, &mut filter)?;
        }

        let order_by = query
            .order_by
            .into_iter()
            .map(|o| column_name(&o.expr).map(|name| (name, o.asc.unwrap_or(true))))
            .collect::<RelmapResult<Vec<_>>>()?;

        Ok(SelectRequest {
            projection,
            from,
            filter,
            order_by,
            param_count: self.params,
        })
    }

    fn projection(&mut self, item: sql_ast::SelectItem) -> RelmapResult<Projection> {
        match item {
            sql_ast::SelectItem::Wildcard(_) => Ok(Projection::Wildcard),
            sql_ast::SelectItem::UnnamedExpr(expr)
            | sql_ast::SelectItem::ExprWithAlias { expr, .. } => match expr {
                sql_ast::Expr::Function(func) => {
                    Ok(Projection::Function(func.name.to_string().to_uppercase()))
                }
                other => match self.operand(other)? {
                    Operand::Column(name) => Ok(Projection::Column(name)),
                    Operand::Literal(value) => Ok(Projection::Literal(value)),
                    Operand::Param(_) => Err(unsupported("placeholder in select list")),
                },
            },
            other => Err(unsupported(other)),
        }
    }

    fn conjuncts(&mut self, expr: sql_ast::Expr, out: &mut Vec<Predicate>) -> RelmapResult<()> {
        match expr {
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::And,
                right,
            } => {
                self.conjuncts(*left, out)?;
                self.conjuncts(*right, out)
            }
            sql_ast::Expr::Nested(inner) => self.conjuncts(*inner, out),
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::Eq,
                right,
            } => {
                let left = self.operand(*left)?;
                let right = self.operand(*right)?;
                out.push(Predicate::Eq(left, right));
                Ok(())
            }
            sql_ast::Expr::IsNull(inner) => {
                out.push(Predicate::IsNull {
                    operand: self.operand(*inner)?,
                    negated: false,
                });
                Ok(())
            }
            sql_ast::Expr::IsNotNull(inner) => {
                out.push(Predicate::IsNull {
                    operand: self.operand(*inner)?,
                    negated: true,
                });
                Ok(())
            }
            sql_ast::Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let operand = self.operand(*expr)?;
                let low = self.operand(*low)?;
                let high = self.operand(*high)?;
                out.push(Predicate::Between {
                    operand,
                    low,
                    high,
                    negated,
                });
                Ok(())
            }
            other => Err(unsupported(other)),
        }
    }

    fn operand(&mut self, expr: sql_ast::Expr) -> RelmapResult<Operand> {
        match expr {
            sql_ast::Expr::Identifier(_) | sql_ast::Expr::CompoundIdentifier(_) => {
                column_name(&expr).map(Operand::Column)
            }
            sql_ast::Expr::Nested(inner) => self.operand(*inner),
            sql_ast::Expr::Value(sql_ast::Value::Placeholder(_)) => {
                let index = self.params;
                self.params += 1;
                Ok(Operand::Param(index))
            }
            sql_ast::Expr::Value(value) => literal(value).map(Operand::Literal),
            sql_ast::Expr::UnaryOp {
                op: sql_ast::UnaryOperator::Minus,
                expr,
            } => match self.operand(*expr)? {
                Operand::Literal(Value::Integer(i)) => Ok(Operand::Literal(Value::Integer(-i))),
                Operand::Literal(Value::Float(f)) => Ok(Operand::Literal(Value::Float(-f))),
                _ => Err(unsupported("unary minus on non-numeric operand")),
            },
            other => Err(unsupported(other)),
        }
    }
}

fn relation(factor: sql_ast::TableFactor) -> RelmapResult<Relation> {
    match factor {
        sql_ast::TableFactor::Table { name, .. } => {
            let parts: Vec<&str> = name.0.iter().map(|i| i.value.as_str()).collect();
            match parts.as_slice() {
                [table] => Ok(Relation::Table((*table).to_string())),
                [schema, table] if schema.eq_ignore_ascii_case("information_schema") => {
                    Ok(Relation::InformationSchema(table.to_uppercase()))
                }
                [_, table] => Ok(Relation::Table((*table).to_string())),
                _ => Err(unsupported(name)),
            }
        }
        other => Err(unsupported(other)),
    }
}

fn column_name(expr: &sql_ast::Expr) -> RelmapResult<String> {
    match expr {
        sql_ast::Expr::Identifier(ident) => Ok(ident.value.clone()),
        sql_ast::Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(|i| i.value.clone())
            .ok_or_else(|| unsupported("empty identifier")),
        other => Err(unsupported(other)),
    }
}

fn literal(value: sql_ast::Value) -> RelmapResult<Value> {
    match value {
        sql_ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else {
                n.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| RelmapError::query(format!("invalid number literal {}", n)))
            }
        }
        sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
            Ok(Value::String(s))
        }
        sql_ast::Value::Boolean(b) => Ok(Value::Boolean(b)),
        sql_ast::Value::Null => Ok(Value::Null),
        other => Err(unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(sql: &str) -> SelectRequest {
        match parse(sql).unwrap() {
            Request::Select(select) => select,
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_show_and_describe() {
        assert_eq!(parse("SHOW TABLES").unwrap(), Request::ShowTables);
        assert_eq!(
            parse("DESCRIBE `user_profile`").unwrap(),
            Request::Describe {
                table: "user_profile".to_string()
            }
        );
    }

    #[test]
    fn test_select_without_from() {
        let req = select("SELECT DATABASE()");
        assert_eq!(req.from, None);
        assert_eq!(req.projection, vec![Projection::Function("DATABASE".to_string())]);
    }

    #[test]
    fn test_placeholders_numbered_in_order() {
        let req = select("SELECT * FROM `t` WHERE `a` = ? AND `b` BETWEEN ? AND ? ORDER BY `b`");
        assert_eq!(req.param_count, 3);
        assert_eq!(req.from, Some(Relation::Table("t".to_string())));
        assert_eq!(
            req.filter,
            vec![
                Predicate::Eq(Operand::Column("a".to_string()), Operand::Param(0)),
                Predicate::Between {
                    operand: Operand::Column("b".to_string()),
                    low: Operand::Param(1),
                    high: Operand::Param(2),
                    negated: false,
                },
            ]
        );
        assert_eq!(req.order_by, vec![("b".to_string(), true)]);
    }

    #[test]
    fn test_information_schema_relation() {
        let req = select(
            "SELECT TABLE_NAME, REFERENCED_TABLE_NAME FROM information_schema.KEY_COLUMN_USAGE \
             WHERE TABLE_SCHEMA = ? AND REFERENCED_TABLE_NAME IS NOT NULL",
        );
        assert_eq!(
            req.from,
            Some(Relation::InformationSchema("KEY_COLUMN_USAGE".to_string()))
        );
        assert_eq!(req.filter.len(), 2);
        assert!(matches!(req.filter[1], Predicate::IsNull { negated: true, .. }));
    }

    #[test]
    fn test_rejects_outside_subset() {
        assert!(parse("SELECT * FROM a JOIN b ON a.id = b.id").is_err());
        assert!(parse("DELETE FROM a").is_err());
        assert!(parse("SELECT * FROM a WHERE x > 1").is_err());
        assert!(parse("SELECT 1; SELECT 2").is_err());
        assert!(parse("SELEKT").is_err());
    }

    #[test]
    fn test_literals() {
        let req = select("SELECT * FROM t WHERE a = -3 AND b = 'x' AND c = 1.5");
        assert_eq!(
            req.filter,
            vec![
                Predicate::Eq(Operand::Column("a".to_string()), Operand::Literal(Value::Integer(-3))),
                Predicate::Eq(
                    Operand::Column("b".to_string()),
                    Operand::Literal(Value::String("x".to_string()))
                ),
                Predicate::Eq(Operand::Column("c".to_string()), Operand::Literal(Value::Float(1.5))),
            ]
        );
    }
}
