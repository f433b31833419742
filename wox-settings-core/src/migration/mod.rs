//! One-shot migration from legacy JSON files into the settings store
//!
//! Migration runs once at startup, before the settings manager is created.
//! The existence of the target store file is the only "already migrated"
//! signal.
//!
//! Everything except clipboard favorites is written inside one store
//! transaction:
//! - core settings are all-or-nothing; a single failed key aborts
//! - plugin settings, query history and favorite results are best-effort
//!
//! After commit the legacy files are archived to `<name>.bak` and the
//! clipboard plugin's favorites are reconciled outside the transaction.

pub mod clipboard;

use crate::config::{Location, MigrationConfig};
use crate::error::{Error, Result};
use crate::legacy::{self, LegacyAppData};
use crate::platform::Os;
use crate::store::repo::snapshot_entries;
use crate::store::{SettingStore, StoreTransaction};
use crate::types::{GlobalSettings, Locale};
use std::path::{Path, PathBuf};

/// Core key holding the migrated query history.
pub const QUERY_HISTORIES_KEY: &str = "QueryHistories";

/// Core key holding the migrated favorite results.
pub const FAVORITE_RESULTS_KEY: &str = "FavoriteResults";

const BACKUP_EXTENSION: &str = "bak";

/// Why a migration run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target store file already exists
    TargetExists,
    /// Neither legacy settings nor legacy app data exist
    NoLegacyFiles,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TargetExists => "target store already exists",
            SkipReason::NoLegacyFiles => "no legacy settings files found",
        }
    }
}

/// Counts of what a completed migration wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub core_settings: usize,
    pub plugin_files: usize,
    pub plugin_settings: usize,
    pub query_histories: usize,
    pub favorite_results: usize,
    pub clipboard_favorites: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    Skipped(SkipReason),
    Completed(MigrationReport),
}

/// Legacy-to-store migration for one user data directory.
pub struct Migrator<'a> {
    location: &'a Location,
    config: MigrationConfig,
    defaults: GlobalSettings,
    os: Os,
}

impl<'a> Migrator<'a> {
    /// Migrator using the detected locale and the running OS.
    pub fn new(location: &'a Location, config: MigrationConfig) -> Self {
        Self {
            location,
            config,
            defaults: GlobalSettings::defaults(&Locale::detect()),
            os: Os::current(),
        }
    }

    /// Replace the settings used for absent or corrupt legacy values.
    pub fn with_defaults(mut self, defaults: GlobalSettings) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_os(mut self, os: Os) -> Self {
        self.os = os;
        self
    }

    /// Migrate if needed.
    ///
    /// Returns an error only when the core settings could not be committed.
    /// In that case the freshly created store file is removed, so the next
    /// start tries again.
    pub fn run(&self) -> Result<MigrationOutcome> {
        let span = tracing::info_span!(
            "migration",
            user_data_dir = %self.location.user_data_dir().display()
        );
        let _entered = span.enter();

        let target = self.location.database_path();
        if target.exists() {
            tracing::info!(path = %target.display(), "Settings store exists, skipping migration");
            return Ok(MigrationOutcome::Skipped(SkipReason::TargetExists));
        }

        let setting_path = self.location.legacy_setting_path();
        let app_data_path = self.location.legacy_app_data_path();
        if !setting_path.exists() && !app_data_path.exists() {
            tracing::info!("No legacy settings files, skipping migration");
            return Ok(MigrationOutcome::Skipped(SkipReason::NoLegacyFiles));
        }

        tracing::info!(
            from = %self.location.settings_dir().display(),
            to = %target.display(),
            "Migrating legacy settings"
        );

        let result = SettingStore::open(&target).and_then(|mut store| {
            store.migrate()?;
            self.migrate_into(&mut store)
        });

        match result {
            Ok(report) => {
                tracing::info!(
                    core_settings = report.core_settings,
                    plugin_files = report.plugin_files,
                    plugin_settings = report.plugin_settings,
                    query_histories = report.query_histories,
                    favorite_results = report.favorite_results,
                    clipboard_favorites = report.clipboard_favorites,
                    "Migration completed"
                );
                Ok(MigrationOutcome::Completed(report))
            }
            Err(e) => {
                tracing::error!(error = %e, "Migration failed");
                remove_store_files(&target);
                Err(e)
            }
        }
    }

    /// Migrate legacy state into an already opened store.
    ///
    /// Does not check whether migration is needed.
    pub fn migrate_into(&self, store: &mut SettingStore) -> Result<MigrationReport> {
        let settings = legacy::load_settings(
            &self.location.legacy_setting_path(),
            &self.defaults,
            self.os,
        );
        let app_data = legacy::load_app_data(&self.location.legacy_app_data_path());

        let mut report = MigrationReport::default();
        let tx = store.transaction()?;

        report.core_settings = migrate_core(&tx, &settings)?;

        let migrated_plugins = self.migrate_plugins(&tx, &mut report);
        migrate_app_data(&tx, &app_data, &mut report);

        tx.commit().map_err(Error::MigrationCommit)?;
        tracing::info!(core_settings = report.core_settings, "Committed migrated settings");

        for path in &migrated_plugins {
            archive(path);
        }
        archive(&self.location.legacy_setting_path());
        archive(&self.location.legacy_app_data_path());

        let plugin_id = &self.config.clipboard_plugin_id;
        match clipboard::reconcile(
            store,
            plugin_id,
            &self.location.clipboard_database_path(plugin_id),
        ) {
            Ok(count) => report.clipboard_favorites = count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to migrate clipboard favorites");
            }
        }

        Ok(report)
    }

    /// Write every plugin settings file into its namespace. Returns the files
    /// that were read, to be archived once the transaction commits.
    fn migrate_plugins(
        &self,
        tx: &StoreTransaction<'_>,
        report: &mut MigrationReport,
    ) -> Vec<PathBuf> {
        let mut migrated = Vec::new();

        for path in self.plugin_setting_files() {
            let Some(plugin_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let legacy_setting = match legacy::load_plugin_setting(&path) {
                Ok(setting) => setting,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse plugin settings, skipping"
                    );
                    continue;
                }
            };

            let namespace = tx.plugin(plugin_id);
            let mut written = 0;
            for (key, value) in &legacy_setting.settings {
                if value.is_empty() {
                    continue;
                }
                match namespace.set_raw(key, value) {
                    Ok(()) => written += 1,
                    Err(e) => {
                        tracing::warn!(
                            plugin = plugin_id,
                            key = %key,
                            error = %e,
                            "Failed to migrate plugin setting"
                        );
                    }
                }
            }

            tracing::debug!(
                plugin = plugin_id,
                name = %legacy_setting.name,
                written,
                "Migrated plugin settings"
            );
            report.plugin_files += 1;
            report.plugin_settings += written;
            migrated.push(path);
        }

        migrated
    }

    /// `*.json` files in the settings directory that belong to plugins.
    fn plugin_setting_files(&self) -> Vec<PathBuf> {
        let settings_dir = self.location.settings_dir();
        let pattern = format!(
            "{}/*.json",
            glob::Pattern::escape(&settings_dir.to_string_lossy())
        );

        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Invalid plugin settings pattern");
                return Vec::new();
            }
        };

        let reserved = &self.config.reserved_name_fragment;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read settings directory entry");
                    None
                }
            })
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| reserved.is_empty() || !name.contains(reserved.as_str()))
            })
            .collect();
        files.sort();
        files
    }
}

/// Write each global setting as its own core key. Any failure is fatal.
fn migrate_core(tx: &StoreTransaction<'_>, settings: &GlobalSettings) -> Result<usize> {
    let core = tx.core();
    let entries = snapshot_entries(settings)?;
    for (key, value) in &entries {
        core.set(key, value).map_err(|e| Error::MigrateSetting {
            key: key.clone(),
            source: Box::new(e),
        })?;
    }
    Ok(entries.len())
}

fn migrate_app_data(
    tx: &StoreTransaction<'_>,
    app_data: &LegacyAppData,
    report: &mut MigrationReport,
) {
    let core = tx.core();

    if !app_data.query_histories.is_empty() {
        match core.set(QUERY_HISTORIES_KEY, &app_data.query_histories) {
            Ok(()) => report.query_histories = app_data.query_histories.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to migrate query histories");
            }
        }
    }

    if let Some(favorites) = &app_data.favorite_results {
        match core.set(FAVORITE_RESULTS_KEY, favorites) {
            Ok(()) => report.favorite_results = favorites.len(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to migrate favorite results");
            }
        }
    }
}

/// Rename `path` to `<path>.bak` if it exists. Failures are only logged.
fn archive(path: &Path) {
    if !path.exists() {
        return;
    }
    let mut backup = path.as_os_str().to_owned();
    backup.push(".");
    backup.push(BACKUP_EXTENSION);

    if let Err(e) = std::fs::rename(path, &backup) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to archive legacy file");
    }
}

/// Remove a store file and its WAL companions.
fn remove_store_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let file = PathBuf::from(file);
        if !file.exists() {
            continue;
        }
        if let Err(e) = std::fs::remove_file(&file) {
            tracing::warn!(
                path = %file.display(),
                error = %e,
                "Failed to remove incomplete settings store"
            );
        }
    }
}
