mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use crate::commands::{
    cmd_category_add, cmd_category_delete, cmd_category_list, cmd_category_rename, cmd_clear,
    cmd_day, cmd_export, cmd_history, cmd_log, cmd_remove, cmd_remove_day, cmd_serving_add,
    cmd_serving_delete, cmd_serving_list, cmd_serving_move, cmd_serving_set_calories,
    cmd_settings_set_start_of_day, cmd_settings_set_target, cmd_settings_show, cmd_today,
    cmd_transfer,
};
use crate::config::Config;
use dcalt_core::progress::SnapshotFile;
use dcalt_core::{StoreKind, TrackerService};

#[derive(Parser)]
#[command(
    name = "dcalt",
    version,
    about = "A daily calorie tracker CLI",
    long_about = "A daily calorie tracker CLI.\n\n\
        Today's log lives in the main store; elapsed days are merged into the \
        archive store when history is viewed or `dcalt transfer` runs."
)]
struct Cli {
    /// Directory holding main.db, archive.db and progress.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Manage servings
    Serving {
        #[command(subcommand)]
        command: ServingCommands,
    },
    /// Log one serving
    Log {
        /// Serving name or ID
        serving: String,
        /// When it was eaten (HH:MM, HH:MM:SS or "YYYY-MM-DD HH:MM"; default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show today's log and progress
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Archive elapsed days, then list archived days
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one day's log
    Day {
        /// Day (YYYY-MM-DD, today or yesterday)
        day: String,
        /// Store to read from
        #[arg(long, default_value = "main")]
        store: StoreKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a logged serving from both stores
    Remove {
        /// Serving name or ID
        serving: String,
        /// Day it was logged on (YYYY-MM-DD)
        day: String,
        /// Time it was logged at (HH:MM or HH:MM:SS)
        time: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a whole day from both stores
    RemoveDay {
        /// Day (YYYY-MM-DD, today or yesterday)
        day: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move elapsed days from the main store into the archive
    Transfer {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Permanently delete every logged day
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
        /// Also delete the archive's copies of categories and servings
        #[arg(long)]
        catalog: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Export both stores as CSV files
    Export {
        /// Output directory
        dir: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// Add a category
    Add {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List categories
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a category
    Rename {
        /// Category name or ID
        category: String,
        /// New name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a category and its servings
    Delete {
        /// Category name or ID
        category: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ServingCommands {
    /// Add a serving to a category
    Add {
        /// Category name or ID
        category: String,
        /// Serving name
        name: String,
        /// Calories per serving
        calories: i16,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List servings
    List {
        /// Only servings in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change calories for future logs
    SetCalories {
        /// Serving name or ID
        serving: String,
        calories: i16,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a serving to another category
    Move {
        /// Serving name or ID
        serving: String,
        /// Target category name or ID
        category: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a serving
    Delete {
        /// Serving name or ID
        serving: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the time a new day starts (HH:MM)
    SetStartOfDay {
        time: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the daily calorie target
    SetTarget {
        calories: i16,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Log to stderr at `warn`, or as set by `DCALT_LOG` / `RUST_LOG`.
/// `--verbose` forces `debug`.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_env("DCALT_LOG")
            .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.data_dir)?;
    tracing::debug!(data_dir = %config.data_dir.display(), "Opening stores");
    let widget = Arc::new(SnapshotFile::new(config.progress_path));
    let svc = TrackerService::open(&config.main_db_path, &config.archive_db_path)
        .with_sink(widget.clone());

    match cli.command {
        Commands::Category { command } => match command {
            CategoryCommands::Add { name, json } => cmd_category_add(&svc, &name, json),
            CategoryCommands::List { json } => cmd_category_list(&svc, json),
            CategoryCommands::Rename {
                category,
                name,
                json,
            } => cmd_category_rename(&svc, &category, &name, json),
            CategoryCommands::Delete { category, json } => {
                cmd_category_delete(&svc, &category, json)
            }
        },
        Commands::Serving { command } => match command {
            ServingCommands::Add {
                category,
                name,
                calories,
                json,
            } => cmd_serving_add(&svc, &category, &name, calories, json),
            ServingCommands::List { category, json } => {
                cmd_serving_list(&svc, category.as_deref(), json)
            }
            ServingCommands::SetCalories {
                serving,
                calories,
                json,
            } => cmd_serving_set_calories(&svc, &serving, calories, json),
            ServingCommands::Move {
                serving,
                category,
                json,
            } => cmd_serving_move(&svc, &serving, &category, json),
            ServingCommands::Delete { serving, json } => cmd_serving_delete(&svc, &serving, json),
        },
        Commands::Log { serving, at, json } => cmd_log(&svc, &serving, at.as_deref(), json),
        Commands::Today { json } => cmd_today(&svc, &widget, json),
        Commands::History { json } => cmd_history(&svc, json).await,
        Commands::Day { day, store, json } => cmd_day(&svc, &day, store, json),
        Commands::Remove {
            serving,
            day,
            time,
            json,
        } => cmd_remove(&svc, &serving, &day, &time, json),
        Commands::RemoveDay { day, json } => cmd_remove_day(&svc, &day, json),
        Commands::Transfer { json } => cmd_transfer(&svc, json),
        Commands::Clear { yes, catalog, json } => cmd_clear(&svc, yes, catalog, json),
        Commands::Settings { command } => match command {
            SettingsCommands::Show { json } => cmd_settings_show(&svc, json),
            SettingsCommands::SetStartOfDay { time, json } => {
                cmd_settings_set_start_of_day(&svc, &time, json)
            }
            SettingsCommands::SetTarget { calories, json } => {
                cmd_settings_set_target(&svc, calories, json)
            }
        },
        Commands::Export { dir, json } => cmd_export(&svc, &dir, json),
    }
}
