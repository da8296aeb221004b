//! Subcommands and their execution against a connected engine.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;
use itertools::Itertools;

use relmap_common::config::RelmapConfig;
use relmap_common::types::Value;
use relmap_core::sink::CodeSink;
use relmap_core::{FieldSpec, Relmap};

use crate::formatter::ResultSet;

/// A relmap subcommand.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the database name and server version
    Engine,
    /// Show the database name
    Name,
    /// Show the size of the database or of one table, in MB
    Size {
        /// Table to measure instead of the whole database
        table: Option<String>,
    },
    /// List tables
    Tables,
    /// Show the columns of a table
    Describe {
        /// Table name
        table: String,
    },
    /// List rows equal to every COLUMN=VALUE pair (all rows if none given)
    FindBy {
        /// Table name
        table: String,
        /// Filters as COLUMN=VALUE
        #[arg(value_parser = parse_pair)]
        pairs: Vec<(String, Value)>,
    },
    /// Find the row equal to a complete object given as COLUMN=VALUE pairs
    FindObject {
        /// Table name
        table: String,
        /// One COLUMN=VALUE pair per column
        #[arg(value_parser = parse_pair, required = true)]
        pairs: Vec<(String, Value)>,
    },
    /// Find the table whose columns are exactly FIELD[:TYPE]... and list its rows
    FindClass {
        /// Fields as NAME or NAME:TYPE
        #[arg(value_parser = parse_field, required = true)]
        fields: Vec<FieldSpec>,
    },
    /// List tables that have all of the given columns
    FindClassesBy {
        /// Column names
        #[arg(required = true)]
        attributes: Vec<String>,
    },
    /// Load one row by identifier as an object
    CreateObject {
        /// Table name
        table: String,
        /// Identifier value
        #[arg(value_parser = parse_value, allow_negative_numbers = true)]
        id: Value,
    },
    /// Load rows with identifier in FIRST..=LAST as objects
    CreateObjects {
        /// Table name
        table: String,
        /// First identifier
        #[arg(allow_negative_numbers = true)]
        first: i64,
        /// Last identifier
        #[arg(allow_negative_numbers = true)]
        last: i64,
    },
    /// Generate the type for a table into a namespace
    CreateClass {
        /// Table name
        table: String,
        /// Target namespace
        namespace: String,
    },
    /// Regenerate a namespace from every table linked to TABLE by foreign keys
    CreateHierarchy {
        /// Root table
        table: String,
        /// Target namespace
        namespace: String,
    },
    /// Write the effective configuration to a file
    InitConfig {
        /// Destination (defaults to the user config directory)
        path: Option<PathBuf>,
    },
}

impl Command {
    /// Returns true if the command needs a database connection.
    pub fn needs_connection(&self) -> bool {
        !matches!(self, Command::InitConfig { .. })
    }
}

/// Parses a command-line value.
///
/// `null`, `true` and `false` map to their SQL values, numbers to numbers,
/// and anything else, or anything in quotes, to a string.
pub fn parse_value(input: &str) -> Result<Value, String> {
    let trimmed = input.trim();
    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return Ok(Value::from(&trimmed[1..trimmed.len() - 1]));
        }
    }

    if trimmed.eq_ignore_ascii_case("null") {
        Ok(Value::Null)
    } else if trimmed.eq_ignore_ascii_case("true") {
        Ok(Value::Boolean(true))
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(Value::Boolean(false))
    } else if let Ok(i) = trimmed.parse::<i64>() {
        Ok(Value::Integer(i))
    } else if let Ok(f) = trimmed.parse::<f64>() {
        Ok(Value::Float(f))
    } else {
        Ok(Value::from(input))
    }
}

/// Parses `COLUMN=VALUE`.
pub fn parse_pair(input: &str) -> Result<(String, Value), String> {
    let (column, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got '{}'", input))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column name in '{}'", input));
    }
    Ok((column.to_string(), parse_value(value)?))
}

fn parse_field(input: &str) -> Result<FieldSpec, String> {
    FieldSpec::parse(input).map_err(|e| e.to_string())
}

fn pair_refs(pairs: &[(String, Value)]) -> Vec<(&str, Value)> {
    pairs
        .iter()
        .map(|(name, value)| (name.as_str(), value.clone()))
        .collect()
}

/// Runs a command that needs a connection.
pub fn execute<S: CodeSink>(relmap: &mut Relmap<S>, command: &Command) -> Result<ResultSet> {
    let result = match command {
        Command::Engine => ResultSet::scalar("engine", relmap.db_engine()?),
        Command::Name => ResultSet::scalar("name", relmap.db_name()?),
        Command::Size { table: None } => ResultSet::scalar("size_mb", relmap.db_size()?),
        Command::Size { table: Some(table) } => {
            let mut result = ResultSet::new(["table", "size_mb"]);
            result.push(vec![
                Value::from(table.as_str()),
                Value::from(relmap.db_table_size(table)?),
            ]);
            result
        }
        Command::Tables => {
            let mut result = ResultSet::new(["table"]);
            for table in relmap.db_tables()? {
                result.push(vec![Value::from(table)]);
            }
            result
        }
        Command::Describe { table } => {
            let mut result = ResultSet::new(["ordinal", "name", "type", "nullable", "key"]);
            for column in relmap.db_table_descriptor(table)?.columns {
                result.push(vec![
                    Value::Integer(column.ordinal as i64),
                    Value::from(column.name),
                    Value::from(column.declared_type),
                    Value::from(column.nullable),
                    Value::from(if column.primary_key { "PRI" } else { "" }),
                ]);
            }
            result.with_title(table.as_str())
        }
        Command::FindBy { table, pairs } => {
            ResultSet::from_typed_rows(&relmap.find_objects_by(table, &pair_refs(pairs))?)
        }
        Command::FindObject { table, pairs } => {
            match relmap.find_object(table, &pair_refs(pairs))? {
                Some(row) => ResultSet::from_typed_rows(&[row]),
                None => ResultSet::default().with_title("no matching row"),
            }
        }
        Command::FindClass { fields } => {
            let found = relmap.find_class(fields)?;
            let mut result = ResultSet::from_typed_rows(&found.rows);
            if result.columns.is_empty() {
                result.columns = found
                    .table
                    .column_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
            }
            result.with_title(format!("table: {}", found.table.name))
        }
        Command::FindClassesBy { attributes } => {
            let mut result = ResultSet::new(["table", "columns"]);
            for table in relmap.find_classes_by(attributes)? {
                let columns = table.column_names().iter().join(", ");
                result.push(vec![Value::from(table.name), Value::from(columns)]);
            }
            result
        }
        Command::CreateObject { table, id } => match relmap.create_object(table, id.clone())? {
            Some(instance) => ResultSet::from_typed_rows(&[instance.to_typed_row()])
                .with_title(instance.generated_type().qualified_name()),
            None => ResultSet::default().with_title(format!("no row in '{}' with id {}", table, id)),
        },
        Command::CreateObjects { table, first, last } => {
            let instances = relmap.create_objects(table, *first, *last)?;
            let rows: Vec<_> = instances.iter().map(|i| i.to_typed_row()).collect();
            let mut result = ResultSet::from_typed_rows(&rows);
            if let Some(instance) = instances.first() {
                result = result.with_title(instance.generated_type().qualified_name());
            }
            result
        }
        Command::CreateClass { table, namespace } => {
            let ty = relmap.create_class(table, namespace)?;
            let mut result = ResultSet::new(["namespace", "type", "table", "fields"]);
            result.push(vec![
                Value::from(ty.namespace.as_str()),
                Value::from(ty.name.as_str()),
                Value::from(ty.source_table.as_str()),
                Value::from(ty.field_names().iter().join(", ")),
            ]);
            result
        }
        Command::CreateHierarchy { table, namespace } => {
            let hierarchy = relmap.create_hierarchy(table, namespace)?;
            let mut result = ResultSet::new(["type", "table", "fields"]);
            for ty in &hierarchy.types {
                result.push(vec![
                    Value::from(ty.name.as_str()),
                    Value::from(ty.source_table.as_str()),
                    Value::Integer(ty.arity() as i64),
                ]);
            }
            result.with_title(format!("namespace: {}", hierarchy.namespace))
        }
        Command::InitConfig { .. } => bail!("init-config does not use a connection"),
    };
    Ok(result)
}

/// Writes `config` to `path`, or to the default location.
pub fn init_config(config: &RelmapConfig, path: Option<&PathBuf>) -> Result<ResultSet> {
    let path = match path {
        Some(path) => path.clone(),
        None => match RelmapConfig::default_config_path() {
            Some(path) => path,
            None => bail!("no configuration directory on this platform; pass a path"),
        },
    };
    config.save(&path)?;
    Ok(ResultSet::scalar("written", path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_client::MemoryDatabase;

    const FIXTURE: &str = r#"
name = "shop"

[[tables]]
name = "customers"
columns = [
    { name = "id", type = "int", primary_key = true },
    { name = "name", type = "varchar(32)" },
]
rows = [{ id = 1, name = "Ann" }, { id = 2, name = "Bo" }]

[[tables]]
name = "orders"
columns = [
    { name = "id", type = "int", primary_key = true },
    { name = "customer_id", type = "int" },
]
foreign_keys = [{ column = "customer_id", references = "customers" }]
rows = [{ id = 10, customer_id = 1 }]
"#;

    fn relmap() -> Relmap {
        let db = MemoryDatabase::from_fixture_str(FIXTURE).unwrap();
        let mut relmap = Relmap::new();
        relmap.attach(Box::new(db.connect()));
        relmap
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("null").unwrap(), Value::Null);
        assert_eq!(parse_value("TRUE").unwrap(), Value::Boolean(true));
        assert_eq!(parse_value("42").unwrap(), Value::Integer(42));
        assert_eq!(parse_value("-3").unwrap(), Value::Integer(-3));
        assert_eq!(parse_value("2.5").unwrap(), Value::Float(2.5));
        assert_eq!(parse_value("Ann").unwrap(), Value::from("Ann"));
        assert_eq!(parse_value("'42'").unwrap(), Value::from("42"));
        assert_eq!(parse_value("\"null\"").unwrap(), Value::from("null"));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("name=Ann").unwrap(),
            ("name".to_string(), Value::from("Ann"))
        );
        assert_eq!(
            parse_pair("note=a=b").unwrap(),
            ("note".to_string(), Value::from("a=b"))
        );
        assert!(parse_pair("name").is_err());
        assert!(parse_pair("=1").is_err());
    }

    #[test]
    fn test_execute_information_commands() {
        let mut relmap = relmap();
        let tables = execute(&mut relmap, &Command::Tables).unwrap();
        assert_eq!(
            tables.rows,
            vec![vec![Value::from("customers")], vec![Value::from("orders")]]
        );

        let name = execute(&mut relmap, &Command::Name).unwrap();
        assert_eq!(name.rows[0][0], Value::from("shop"));

        let describe = execute(
            &mut relmap,
            &Command::Describe {
                table: "orders".to_string(),
            },
        )
        .unwrap();
        assert_eq!(describe.rows.len(), 2);
        assert_eq!(describe.rows[0][4], Value::from("PRI"));
    }

    #[test]
    fn test_execute_find_commands() {
        let mut relmap = relmap();
        let rows = execute(
            &mut relmap,
            &Command::FindBy {
                table: "customers".to_string(),
                pairs: vec![("name".to_string(), Value::from("Bo"))],
            },
        )
        .unwrap();
        assert_eq!(rows.rows, vec![vec![Value::from(2), Value::from("Bo")]]);

        let found = execute(
            &mut relmap,
            &Command::FindClass {
                fields: vec![FieldSpec::named("customer_id"), FieldSpec::named("id")],
            },
        )
        .unwrap();
        assert_eq!(found.title.as_deref(), Some("table: orders"));

        let err = execute(
            &mut relmap,
            &Command::FindObject {
                table: "customers".to_string(),
                pairs: vec![("id".to_string(), Value::from(1))],
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("has 2 columns"));
    }

    #[test]
    fn test_execute_create_commands() {
        let mut relmap = relmap();
        let object = execute(
            &mut relmap,
            &Command::CreateObject {
                table: "customers".to_string(),
                id: Value::from(1),
            },
        )
        .unwrap();
        assert_eq!(object.title.as_deref(), Some("objects::Customers"));

        let hierarchy = execute(
            &mut relmap,
            &Command::CreateHierarchy {
                table: "orders".to_string(),
                namespace: "shop".to_string(),
            },
        )
        .unwrap();
        assert_eq!(hierarchy.rows.len(), 2);
        assert_eq!(hierarchy.rows[1][0], Value::from("Customers"));
    }

    #[test]
    fn test_init_config_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relmap.toml");
        let mut config = RelmapConfig::default();
        config.connection.user = "root".to_string();
        init_config(&config, Some(&path)).unwrap();
        let loaded = RelmapConfig::from_file(&path).unwrap();
        assert_eq!(loaded.connection.user, "root");
    }
}
