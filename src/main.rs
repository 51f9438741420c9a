use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dbinspect::codegen::{CodeGenerator, EmittedUnit, PythonGenerator};
use dbinspect::config::ConnectionDescriptor;
use dbinspect::dialect::Dialect;
use dbinspect::introspect::{self, TableFilter};

#[derive(Parser, Debug)]
#[command(name = "dbinspect")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Database dialect to inspect: sqlite, postgres, mysql or mssql
    /// (also accepts sqlite3, postgresql, pg, mariadb, sqlserver)
    database: Dialect,

    /// Output directory for the generated package
    #[arg(short, long, default_value = "./models")]
    output: PathBuf,

    /// Schema to inspect (default: public, dbo, main or the database name)
    #[arg(long)]
    schema: Option<String>,

    /// Path to .env file for connection config
    #[arg(long, default_value = "./.env")]
    env_file: PathBuf,

    /// Comma-separated list of tables to include (default: all)
    #[arg(long, value_delimiter = ',')]
    tables: Option<Vec<String>>,

    /// Comma-separated list of tables to exclude
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Print generated files to stdout instead of writing them
    #[arg(long)]
    dry_run: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    if let Err(e) = run() {
        error!(error = ?e, "Fatal error");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    info!("dbinspect v{}", env!("CARGO_PKG_VERSION"));
    info!(
        database = %cli.database,
        output = ?cli.output,
        schema = ?cli.schema,
        dry_run = cli.dry_run,
        "Starting inspection"
    );

    let mut descriptor = ConnectionDescriptor::load(cli.database, &cli.env_file)
        .context("Failed to load database configuration")?;
    if let Some(schema) = cli.schema {
        descriptor = descriptor.with_schema(schema);
    }
    debug!(connection = ?descriptor.redacted_connection_string(), "Loaded configuration");

    let filter = TableFilter {
        include: cli.tables,
        exclude: cli.exclude,
    };

    if filter.include.is_some() || filter.exclude.is_some() {
        debug!(filter = ?filter, "Table filter configured");
    }

    let model = introspect::inspect_filtered(&descriptor, &filter).with_context(|| {
        format!(
            "Failed to inspect {}",
            descriptor.redacted_connection_string()
        )
    })?;

    if model.tables.is_empty() {
        warn!(schema = ?model.name, "No tables found after filtering");
        return Ok(());
    }

    for table in &model.tables {
        debug!(
            table = ?table.raw_name,
            type_name = ?table.type_name,
            columns = ?table.columns.len(),
            "Table"
        );
    }

    let generator = PythonGenerator::new();
    let mut units = generator.emit(&model);
    if let Some(index) = generator.package_index(&units) {
        units.push(index);
    }

    if cli.dry_run {
        print_units(&units);
    } else {
        write_units(&cli.output, &units)?;
    }

    info!(files = ?units.len(), "Done");
    Ok(())
}

/// `-v` sets the default level; `RUST_LOG` directives take precedence
fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn print_units(units: &[EmittedUnit]) {
    for unit in units {
        println!("# --- {} ---", unit.file_name);
        print!("{}", unit.source);
    }
}

fn write_units(output: &Path, units: &[EmittedUnit]) -> Result<()> {
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    for unit in units {
        let path = output.join(&unit.file_name);
        fs::write(&path, &unit.source)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = ?path, "Wrote file");
    }

    info!(output = ?output, "Wrote generated package");
    Ok(())
}
