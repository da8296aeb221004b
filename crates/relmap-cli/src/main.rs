//! Relmap Command-Line Interface
//!
//! Inspects a database and generates types from its tables.
//!
//! # Usage
//!
//! ```bash
//! # List the tables of a fixture database
//! relmap --fixture shop.toml -U root tables
//!
//! # Describe a table as JSON
//! relmap --fixture shop.toml -U root -o json describe orders
//!
//! # Find the table shaped like these fields
//! relmap --fixture shop.toml -U root find-class id name:varchar(32)
//!
//! # Generate every table linked to `orders` under ./generated/shop
//! relmap --fixture shop.toml -U root create-hierarchy orders shop
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod formatter;

use commands::Command;
use formatter::{format_result, OutputFormat};
use relmap_client::MemoryDatabase;
use relmap_common::config::RelmapConfig;
use relmap_core::Relmap;

/// Relmap command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "relmap",
    author = "Relmap Team",
    version,
    about = "Schema reflection and type generation for relational databases",
    long_about = "Inspects a relational database, looks up rows and tables by shape,\n\
                  and generates Rust types for tables and their foreign-key neighbours."
)]
struct Args {
    /// Server hostname
    #[arg(short = 'H', long, env = "RELMAP_HOST")]
    host: Option<String>,

    /// Database name (defaults to the fixture's name)
    #[arg(short = 'd', long, env = "RELMAP_DATABASE")]
    database: Option<String>,

    /// Username
    #[arg(short = 'U', long, env = "RELMAP_USER")]
    user: Option<String>,

    /// Password (use RELMAP_PASSWORD env var for security)
    #[arg(short = 'W', long, env = "RELMAP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Fixture file describing the database to serve
    #[arg(long, value_name = "FILE", env = "RELMAP_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Directory generated namespaces are written under
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Generate types without writing source files
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "table")]
    output: OutputFormatArg,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Output format argument
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    /// Display results in a formatted table
    Table,
    /// Display results as JSON
    Json,
    /// Display results as CSV
    Csv,
    /// Display raw values
    Raw,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Raw => OutputFormat::Raw,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let config = load_config(&args)?;
    let format = args.output.into();

    let result = if let Command::InitConfig { path } = &args.command {
        commands::init_config(&config, path.as_ref())?
    } else {
        execute(&config, &args.command)?
    };

    println!("{}", format_result(&result, format));
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("relmap_cli=debug,relmap_core=debug,relmap_client=debug")
    } else {
        EnvFilter::new("relmap_cli=warn,relmap_core=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<RelmapConfig> {
    let mut config = if let Some(path) = &args.config {
        RelmapConfig::from_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    } else {
        RelmapConfig::load_default()?
    };

    // Command line arguments win over the file
    if let Some(host) = &args.host {
        config.connection.host = host.clone();
    }
    if let Some(db) = &args.database {
        config.connection.database = db.clone();
    }
    if let Some(user) = &args.user {
        config.connection.user = user.clone();
    }
    if let Some(pass) = &args.password {
        config.connection.password = pass.clone();
    }
    if let Some(fixture) = &args.fixture {
        config.fixture = Some(fixture.clone());
    }
    if let Some(dir) = &args.out_dir {
        config.codegen.output_dir = dir.clone();
    }
    if args.dry_run {
        config.codegen.emit_sources = false;
    }

    Ok(config)
}

fn execute(config: &RelmapConfig, command: &Command) -> Result<formatter::ResultSet> {
    let fixture = config
        .fixture
        .as_ref()
        .context("no database to connect to; pass --fixture or set `fixture` in the config")?;
    let db = MemoryDatabase::from_fixture(fixture)
        .with_context(|| format!("failed to load fixture {}", fixture.display()))?;

    let mut connection = config.connection.clone();
    if connection.database.trim().is_empty() {
        connection.database = db.name();
    }

    info!(fixture = %fixture.display(), database = %connection.database, "opening");

    let mut relmap = Relmap::from_config(&config.codegen);
    relmap.connect(&db.connector(), &connection)?;
    let result = commands::execute(&mut relmap, command);
    relmap.disconnect()?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_subcommand() {
        let args = Args::try_parse_from([
            "relmap",
            "--fixture",
            "shop.toml",
            "-U",
            "root",
            "find-by",
            "customers",
            "name=Ann",
            "id=1",
        ])
        .unwrap();
        assert_eq!(args.fixture, Some(PathBuf::from("shop.toml")));
        match args.command {
            Command::FindBy { table, pairs } => {
                assert_eq!(table, "customers");
                assert_eq!(pairs.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_args_negative_range() {
        let args =
            Args::try_parse_from(["relmap", "create-objects", "orders", "-5", "5"]).unwrap();
        assert_eq!(
            args.command,
            Command::CreateObjects {
                table: "orders".to_string(),
                first: -5,
                last: 5,
            }
        );
    }

    #[test]
    fn test_load_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relmap.toml");
        std::fs::write(
            &path,
            "[connection]\nhost = \"db.internal\"\nuser = \"app\"\n\n[codegen]\noutput_dir = \"gen\"\n",
        )
        .unwrap();

        let args = Args::try_parse_from([
            "relmap",
            "--config",
            path.to_str().unwrap(),
            "-U",
            "root",
            "--dry-run",
            "tables",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.user, "root");
        assert_eq!(config.codegen.output_dir, PathBuf::from("gen"));
        assert!(!config.codegen.emit_sources);
    }

    #[test]
    fn test_execute_against_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("shop.toml");
        std::fs::write(
            &fixture,
            "name = \"shop\"\n\n[[tables]]\nname = \"items\"\ncolumns = [{ name = \"id\", type = \"int\", primary_key = true }]\nrows = [{ id = 1 }]\n",
        )
        .unwrap();

        let mut config = RelmapConfig::default();
        config.connection.user = "root".to_string();
        config.fixture = Some(fixture);
        config.codegen.emit_sources = false;

        let result = execute(&config, &Command::Tables).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert!(execute(&RelmapConfig::default(), &Command::Tables).is_err());
    }
}
