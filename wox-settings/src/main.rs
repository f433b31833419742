//! wox-settings - Wox settings migration and maintenance tool
//!
//! Runs the one-shot migration from the legacy JSON settings files into the
//! settings store, then inspects or edits the migrated settings.
//!
//! Uses XDG Base Directory locations:
//! - User data: $XDG_DATA_HOME/wox/wox-user/ (~/.local/share/wox/wox-user/)
//! - Logs: $XDG_STATE_HOME/wox-settings/wox-settings.log
//! - Config: $XDG_CONFIG_HOME/wox-settings/config.toml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wox_settings_core::{
    Config, HeadlessHooks, Locale, MigrationOutcome, Migrator, Os, SettingStore, SettingsManager,
};

#[derive(Parser)]
#[command(name = "wox-settings")]
#[command(about = "Migrate and maintain Wox settings")]
#[command(version)]
struct Args {
    /// User data directory (defaults to the configured or XDG location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Migrate legacy settings files if that has not happened yet
    Migrate,

    /// Print the current settings as JSON
    Show,

    /// Change one setting
    Set {
        /// Setting key, e.g. AppWidth or MainHotkey
        key: String,

        /// New value; JSON for list settings
        value: String,
    },

    /// Print the most recent queries, newest first
    History {
        /// Number of queries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(data_dir) = args.data_dir {
        config.paths.user_data_dir = Some(data_dir);
    }

    // Initialize logging
    let _log_guard = wox_settings_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!("wox-settings starting");

    let location = config.location();

    // Migration always runs first, like at application startup
    let outcome = Migrator::new(&location, config.migration.clone())
        .run()
        .context("failed to migrate legacy settings")?;

    let command = match args.command {
        Command::Migrate => {
            print_outcome(&outcome);
            return Ok(());
        }
        command => command,
    };

    let db_path = location.database_path();
    tracing::info!(path = %db_path.display(), "Opening settings store");

    let store = SettingStore::open(&db_path).context("failed to open settings store")?;
    store
        .migrate()
        .context("failed to run settings store migrations")?;

    let mut manager = SettingsManager::init(
        store,
        Box::new(HeadlessHooks::default()),
        Os::current(),
        &Locale::detect(),
    )
    .context("failed to load settings")?;

    match command {
        Command::Migrate => unreachable!("handled before the store is opened"),
        Command::Show => {
            let json = serde_json::to_string_pretty(manager.settings())
                .context("failed to serialize settings")?;
            println!("{}", json);
        }
        Command::Set { key, value } => {
            manager
                .update_setting_str(&key, &value)
                .with_context(|| format!("failed to update {}", key))?;
            println!("Updated {}", key);
        }
        Command::History { count } => {
            let histories = manager.latest_query_history(count);
            if histories.is_empty() {
                println!("No query history");
            }
            for history in histories {
                println!(
                    "{}\t{}\t{}",
                    history.timestamp, history.query.query_type, history.query.query_text
                );
            }
        }
    }

    manager.shutdown().context("failed to save settings")?;
    tracing::info!("wox-settings finished");

    Ok(())
}

fn print_outcome(outcome: &MigrationOutcome) {
    match outcome {
        MigrationOutcome::Skipped(reason) => {
            println!("Migration skipped: {}", reason.as_str());
        }
        MigrationOutcome::Completed(report) => {
            println!("Migration complete:");
            println!("  Core settings:        {}", report.core_settings);
            println!("  Plugin files:         {}", report.plugin_files);
            println!("  Plugin settings:      {}", report.plugin_settings);
            println!("  Query histories:      {}", report.query_histories);
            println!("  Favorite results:     {}", report.favorite_results);
            println!("  Clipboard favorites:  {}", report.clipboard_favorites);
        }
    }
}
