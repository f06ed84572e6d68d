//! Gridiron CLI - Compile data-view requests to SQL
//!
//! Usage:
//!   gridiron compile <request.json> [--dialect <dialect>] [--output <format>]
//!   gridiron columns
//!   gridiron cache-policy --kind <kind> [--year <year>...] [--week <week>...]
//!
//! Examples:
//!   gridiron compile requests/rushing.json --dialect duckdb
//!   gridiron cache-policy --kind play-level --year 2024 --week 3

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

use gridiron::cache::{resolve_cache_policy, CachePolicyKind};
use gridiron::columns::{ColumnRegistry, ColumnSource};
use gridiron::compile::{compile_data_view, CompileOptions, DataViewRequest};
use gridiron::config::Settings;
use gridiron::params::{DataViewParams, OneOrMany};
use gridiron::sql::Dialect;

#[derive(Parser)]
#[command(name = "gridiron")]
#[command(about = "Gridiron - compile fantasy football data views to SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a data-view request (JSON) to SQL
    Compile {
        /// Path to the request JSON file
        file: PathBuf,

        /// SQL dialect to generate (defaults to the configured dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// List the available columns
    Columns,

    /// Show the cache policy for a year/week selection
    CachePolicy {
        /// Cache policy kind, e.g. season-aggregate or betting
        #[arg(short, long)]
        kind: CachePolicyKind,

        #[arg(short, long)]
        year: Vec<i32>,

        #[arg(short, long)]
        week: Vec<i32>,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Postgres,
    Duckdb,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Duckdb => Dialect::DuckDb,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// SQL with values inlined
    Sql,
    /// SQL, bindings and cache policy as JSON
    Json,
    /// SQL with a comment header
    Verbose,
}

fn main() -> ExitCode {
    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridiron=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Failed to load settings, using defaults: {}", e);
            Settings::default()
        }
    };

    match cli.command {
        Commands::Compile {
            file,
            dialect,
            output,
        } => cmd_compile(&settings, file, dialect, output),
        Commands::Columns => cmd_columns(),
        Commands::CachePolicy { kind, year, week } => cmd_cache_policy(&settings, kind, year, week),
    }
}

fn cmd_compile(
    settings: &Settings,
    file: PathBuf,
    dialect: Option<DialectArg>,
    output: OutputFormat,
) -> ExitCode {
    let source = match fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let request: DataViewRequest = match serde_json::from_str(&source) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Invalid request '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut options = CompileOptions::from_settings(settings, Utc::now());
    if let Some(dialect) = dialect {
        options = options.with_dialect(dialect.into());
    }
    debug!(season = ?options.season, "compiling {}", file.display());

    let compiled = match compile_data_view(&request, &ColumnRegistry::builtin(), &options) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match output {
        OutputFormat::Sql => {
            println!("{}", compiled.display_sql());
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&compiled) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize output: {}", e);
                return ExitCode::FAILURE;
            }
        },
        OutputFormat::Verbose => {
            println!("-- Gridiron Compiled SQL");
            println!("-- Source: {}", file.display());
            println!("-- Dialect: {}", compiled.dialect);
            println!(
                "-- Cache: {}s (expires {})",
                compiled.cache_info.cache_ttl,
                compiled.cache_info.cache_expire_at.to_rfc3339()
            );
            println!();
            println!("{}", compiled.sql);
            if !compiled.bindings.is_empty() {
                println!();
                for (i, value) in compiled.bindings.iter().enumerate() {
                    println!("-- ${} = {:?}", i + 1, value);
                }
            }
        }
    }
    ExitCode::SUCCESS
}

fn cmd_columns() -> ExitCode {
    let registry = ColumnRegistry::builtin();

    println!("Columns:");
    for column in registry.iter() {
        let source = match &column.source {
            ColumnSource::Player { column } => format!("player.{}", column),
            ColumnSource::Table { table, column, .. } => format!("{}.{}", table, column),
            ColumnSource::TeamStat { unit, rate, .. } => {
                format!("team stat ({:?}{})", unit, if *rate { ", rate" } else { "" })
            }
            ColumnSource::PerRoute { .. } => "per route run".to_string(),
        };
        println!(
            "  - {} [{}] {} ({})",
            column.id, column.cache_kind, column.description, source
        );
    }

    ExitCode::SUCCESS
}

fn cmd_cache_policy(
    settings: &Settings,
    kind: CachePolicyKind,
    year: Vec<i32>,
    week: Vec<i32>,
) -> ExitCode {
    let now = Utc::now();
    let season = settings.season(now.date_naive());

    let params = DataViewParams {
        year: (!year.is_empty()).then(|| OneOrMany::many(year)),
        week: (!week.is_empty()).then(|| OneOrMany::many(week)),
        ..Default::default()
    };

    let info = resolve_cache_policy(&params, kind, &season, &settings.cache, now);
    println!("Season: {} week {} ({})", season.year, season.week, season.nfl_seas_type);
    println!("TTL: {}s", info.cache_ttl);
    println!("Expires: {}", info.cache_expire_at.to_rfc3339());
    ExitCode::SUCCESS
}
