//! # wox-settings-core
//!
//! Settings persistence for the Wox launcher.
//!
//! This library provides:
//! - Domain types for global settings, usage history and plugin settings
//! - A SQLite-backed key-value settings store with core and per-plugin namespaces
//! - A one-shot migration from the legacy JSON files into the store
//! - The settings manager used by the running application
//! - Configuration management and logging infrastructure
//!
//! ## Startup
//!
//! Migration runs before the manager is created and is a no-op once the
//! store file exists:
//! - **Legacy:** `settings/*.json` files, archived to `.bak` once consumed
//! - **Store:** `wox.db`, the only source of truth afterwards
//!
//! ## Example
//!
//! ```rust,no_run
//! use wox_settings_core::{Config, HeadlessHooks, Locale, Migrator, Os, SettingStore, SettingsManager};
//!
//! let config = Config::load().expect("failed to load config");
//! let location = config.location();
//!
//! // Fatal only when core settings could not be committed
//! Migrator::new(&location, config.migration.clone())
//!     .run()
//!     .expect("migration failed");
//!
//! let store = SettingStore::open(&location.database_path()).expect("failed to open store");
//! store.migrate().expect("failed to run schema migrations");
//!
//! let manager = SettingsManager::init(
//!     store,
//!     Box::new(HeadlessHooks::default()),
//!     Os::current(),
//!     &Locale::detect(),
//! )
//! .expect("failed to load settings");
//! println!("main hotkey: {}", manager.settings().main_hotkey.get());
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, Location};
pub use error::{Error, Result};
pub use hooks::{HeadlessHooks, SystemHooks};
pub use manager::{SettingKey, SettingsManager};
pub use migration::{MigrationOutcome, MigrationReport, Migrator, SkipReason};
pub use platform::{Os, PlatformValue};
pub use store::SettingStore;
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod hooks;
pub mod legacy;
pub mod logging;
pub mod manager;
pub mod migration;
pub mod platform;
pub mod store;
pub mod types;
