//! Cellar CLI
//!
//! Command-line interface for Cellar - wine cellars, bottles and cloud sync.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cellar_core::{Config, StorageError, Store, Vintage, WineType};

mod commands;
mod logging;
mod output;
mod prompt;

use commands::sync::SyncSession;
use output::{Output, OutputFormat};

/// Environment variable holding the cloud drive bearer token
const TOKEN_ENV: &str = "CELLAR_SYNC_TOKEN";

#[derive(Parser)]
#[command(name = "cellar")]
#[command(about = "Cellar - wine inventory for your racks and fridges")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Cloud drive access token (defaults to $CELLAR_SYNC_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    /// Use a throwaway in-memory store
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage cellars
    Cellar {
        #[command(subcommand)]
        command: CellarCommands,
    },
    /// Manage bottles
    Bottle {
        #[command(subcommand)]
        command: BottleCommands,
    },
    /// List every varietal in the inventory
    Varietals,
    /// Show inventory statistics
    Stats,
    /// Show or change currency settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
    /// Export all data as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a JSON backup, replacing the collections it contains
    Import {
        /// Backup file
        file: PathBuf,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Import bottles from a CSV spreadsheet
    ImportCsv {
        /// CSV file
        file: PathBuf,
    },
    /// Cloud drive sync
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status (storage, counts, sync)
    Status,
}

#[derive(Subcommand)]
enum CellarCommands {
    /// List cellars with bottle counts
    #[command(alias = "ls")]
    List,
    /// Show a cellar grid
    Show {
        /// Cellar ID (full ID or prefix)
        id: String,
    },
    /// Create a cellar
    #[command(alias = "add")]
    Create {
        /// Cellar name
        name: String,
        /// Number of rows
        #[arg(short, long)]
        rows: u32,
        /// Number of columns
        #[arg(short, long)]
        columns: u32,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Edit a cellar
    Edit {
        /// Cellar ID (full ID or prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        rows: Option<u32>,
        #[arg(long)]
        columns: Option<u32>,
        /// New description ("" to clear)
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a cellar (its bottles keep a dangling reference)
    #[command(alias = "rm")]
    Delete {
        /// Cellar ID (full ID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum BottleCommands {
    /// List bottles (active by default)
    #[command(alias = "ls")]
    List {
        /// Only bottles in this cellar
        #[arg(long, conflicts_with_all = ["unplaced", "consumed"])]
        cellar: Option<String>,
        /// Only active bottles without a cellar
        #[arg(long, conflicts_with = "consumed")]
        unplaced: bool,
        /// Only consumed bottles
        #[arg(long)]
        consumed: bool,
        /// Include consumed bottles
        #[arg(long)]
        all: bool,
    },
    /// Show bottle details
    Show {
        /// Bottle ID (full ID or prefix)
        id: String,
    },
    /// Add a bottle
    #[command(alias = "create")]
    Add {
        #[arg(short, long)]
        producer: String,
        #[arg(short = 'g', long)]
        varietal: String,
        /// Year or NV
        #[arg(short = 'y', long)]
        vintage: Vintage,
        /// Red, White, Rose, Sparkling or Other
        #[arg(short = 't', long = "type", default_value = "Red")]
        wine_type: WineType,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        country: Option<String>,
        /// Purchase price
        #[arg(long)]
        price: Option<f64>,
        /// Current value (defaults to the purchase price)
        #[arg(long)]
        value: Option<f64>,
        /// Put the bottle in this cellar
        #[arg(long)]
        cellar: Option<String>,
        #[arg(long, requires = "cellar", requires = "col")]
        row: Option<u32>,
        #[arg(long, requires = "cellar", requires = "row")]
        col: Option<u32>,
    },
    /// Edit a bottle ("" clears optional text fields)
    Edit {
        /// Bottle ID (full ID or prefix)
        id: String,
        #[arg(long)]
        producer: Option<String>,
        #[arg(long)]
        varietal: Option<String>,
        #[arg(long)]
        vintage: Option<Vintage>,
        #[arg(long = "type")]
        wine_type: Option<WineType>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a bottle
    #[command(alias = "rm")]
    Delete {
        /// Bottle ID (full ID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Add unplaced copies of a bottle
    Duplicate {
        /// Bottle ID (full ID or prefix)
        id: String,
        /// Number of copies
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Mark a bottle consumed with a tasting record
    #[command(alias = "drink")]
    Consume {
        /// Bottle ID (full ID or prefix)
        id: String,
        /// Rating from 0 to 5
        #[arg(short, long)]
        rating: u8,
        #[arg(short, long)]
        notes: Option<String>,
        #[arg(short, long)]
        occasion: Option<String>,
    },
    /// Put a bottle in a slot (first free slot if none given)
    Place {
        /// Bottle ID (full ID or prefix)
        id: String,
        /// Cellar ID (full ID or prefix)
        cellar: String,
        #[arg(long, requires = "col")]
        row: Option<u32>,
        #[arg(long, requires = "row")]
        col: Option<u32>,
    },
    /// Move a bottle to a cellar, loose unless a slot is given
    #[command(alias = "mv")]
    Move {
        /// Bottle ID (full ID or prefix)
        id: String,
        /// Cellar ID (full ID or prefix)
        cellar: String,
        #[arg(long, requires = "col")]
        row: Option<u32>,
        #[arg(long, requires = "row")]
        col: Option<u32>,
    },
    /// Take a bottle out of its slot
    Unplace {
        /// Bottle ID (full ID or prefix)
        id: String,
        /// Stay in the cellar as a loose bottle
        #[arg(long)]
        keep_cellar: bool,
    },
    /// Search active bottles by producer, varietal or region
    Search {
        /// Search query (at least 2 characters)
        query: String,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show,
    /// Use a built-in currency (USD, EUR, GBP, JPY, HKD, AUD, CAD, CHF, CNY)
    Currency {
        code: String,
    },
    /// Use a custom currency
    Custom {
        code: String,
        symbol: String,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Replace local data with the cloud copy
    Pull,
    /// Upload local data to the cloud copy
    Push,
    /// Show sync configuration
    Status,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (see `cellar config show`)
        key: String,
        /// Value to set ("none" clears optional keys)
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match run(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    logging::init(&config, cli.verbose);

    let token = cli.token.clone().or_else(|| std::env::var(TOKEN_ENV).ok());

    let mut store = if cli.ephemeral {
        let store = Store::in_memory(config.clone());
        if config.seed_default_cellar {
            store.seed_defaults()?;
        }
        store
    } else {
        Store::open_with_config(config.clone())?
    };

    if let Commands::Sync { command } = cli.command {
        return match command {
            SyncCommands::Pull => commands::sync::pull(&store, token, output).await,
            SyncCommands::Push => commands::sync::push(&store, token, output).await,
            SyncCommands::Status => commands::sync::status(&store, token.is_some(), output),
        };
    }

    let session = SyncSession::attach(&mut store, token)?;
    let result = dispatch(cli.command, &mut store, output);
    if let Some(session) = session {
        session.finish(&mut store).await;
    }
    result
}

fn dispatch(command: Commands, store: &mut Store, output: &Output) -> Result<()> {
    match command {
        Commands::Cellar { command } => handle_cellar_command(command, store, output),
        Commands::Bottle { command } => handle_bottle_command(command, store, output),
        Commands::Varietals => commands::stats::varietals(store, output),
        Commands::Stats => commands::stats::show(store, output),
        Commands::Settings { command } => match command {
            Some(SettingsCommands::Show) | None => commands::settings::show(store, output),
            Some(SettingsCommands::Currency { code }) => {
                commands::settings::currency(store, &code, output)
            }
            Some(SettingsCommands::Custom { code, symbol }) => {
                commands::settings::custom(store, code, symbol, output)
            }
        },
        Commands::Export { output: path } => commands::backup::export(store, path, output),
        Commands::Import { file, yes } => commands::backup::import(store, &file, yes, output),
        Commands::ImportCsv { file } => commands::backup::import_csv(store, &file, output),
        Commands::Status => commands::status::show(store, output),
        Commands::Sync { .. } | Commands::Config { .. } => Ok(()),
    }
}

fn handle_cellar_command(command: CellarCommands, store: &mut Store, output: &Output) -> Result<()> {
    match command {
        CellarCommands::List => commands::cellar::list(store, output),
        CellarCommands::Show { id } => commands::cellar::show(store, &id, output),
        CellarCommands::Create {
            name,
            rows,
            columns,
            description,
        } => commands::cellar::create(store, name, rows, columns, description, output),
        CellarCommands::Edit {
            id,
            name,
            rows,
            columns,
            description,
        } => commands::cellar::edit(store, &id, name, rows, columns, description, output),
        CellarCommands::Delete { id, yes } => commands::cellar::delete(store, &id, yes, output),
    }
}

fn handle_bottle_command(command: BottleCommands, store: &mut Store, output: &Output) -> Result<()> {
    use commands::bottle::{self, BottleFields, ListFilter};

    match command {
        BottleCommands::List {
            cellar,
            unplaced,
            consumed,
            all,
        } => {
            let filter = match (cellar, unplaced, consumed, all) {
                (Some(cellar), ..) => ListFilter::Cellar(cellar),
                (None, true, ..) => ListFilter::Unplaced,
                (None, false, true, _) => ListFilter::Consumed,
                (None, false, false, true) => ListFilter::All,
                (None, false, false, false) => ListFilter::Active,
            };
            bottle::list(store, filter, output)
        }
        BottleCommands::Show { id } => bottle::show(store, &id, output),
        BottleCommands::Add {
            producer,
            varietal,
            vintage,
            wine_type,
            region,
            country,
            price,
            value,
            cellar,
            row,
            col,
        } => {
            let fields = BottleFields {
                region,
                country,
                price,
                value,
                ..Default::default()
            };
            bottle::add(
                store,
                (producer, varietal, vintage, wine_type),
                fields,
                cellar,
                row.zip(col),
                output,
            )
        }
        BottleCommands::Edit {
            id,
            producer,
            varietal,
            vintage,
            wine_type,
            region,
            country,
            price,
            value,
            notes,
        } => {
            let fields = BottleFields {
                producer,
                varietal,
                vintage,
                wine_type,
                region,
                country,
                price,
                value,
                notes,
            };
            bottle::edit(store, &id, fields, output)
        }
        BottleCommands::Delete { id, yes } => bottle::delete(store, &id, yes, output),
        BottleCommands::Duplicate { id, count } => bottle::duplicate(store, &id, count, output),
        BottleCommands::Consume {
            id,
            rating,
            notes,
            occasion,
        } => bottle::consume(store, &id, rating, notes, occasion, output),
        BottleCommands::Place {
            id,
            cellar,
            row,
            col,
        } => bottle::place(store, &id, &cellar, row.zip(col), output),
        BottleCommands::Move {
            id,
            cellar,
            row,
            col,
        } => bottle::move_to(store, &id, &cellar, row.zip(col), output),
        BottleCommands::Unplace { id, keep_cellar } => {
            bottle::unplace(store, &id, keep_cellar, output)
        }
        BottleCommands::Search { query } => bottle::search(store, &query, output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(config_path, &key, &value, output)
        }
    }
}

/// Print an error chain, plus a hint when storage can suggest one
fn report_error(error: &anyhow::Error) {
    eprintln!("Error: {:#}", error);
    let suggestion = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(StorageError::recovery_suggestion);
    if let Some(suggestion) = suggestion {
        eprintln!("Hint: {}", suggestion);
    }
}
