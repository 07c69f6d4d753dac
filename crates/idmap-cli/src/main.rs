//! idmap CLI
//!
//! Runs the session-cache scenarios against a database file and manages
//! customer rows

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use idmap_core::logging_facility::{self, Profile};
use idmap_store::{Database, StoreConfig};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "idmap")]
#[command(about = "idmap - identity-mapped session cache demonstrations", long_about = None)]
struct Cli {
    /// Database file (overrides config and IDMAP_DATABASE_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs to stderr
    #[arg(long, value_enum, global = true)]
    log: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run caching scenarios
    Scenario(commands::scenario::ScenarioArgs),
    /// Customer operations
    Customer(commands::customer::CustomerArgs),
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.log {
        Some(LogFormat::Pretty) => logging_facility::init(Profile::Development),
        Some(LogFormat::Json) => logging_facility::init(Profile::Production),
        None => {}
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.db {
        config.database_path = path;
    }
    let db = Database::open(config)?;

    match cli.command {
        Commands::Scenario(args) => commands::scenario::execute(&db, args, cli.json),
        Commands::Customer(args) => commands::customer::execute(&db, args, cli.json),
    }
}
