//! Error types for wox-settings-core

use thiserror::Error;

/// Main error type for the wox-settings-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Settings store error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Integer setting value could not be parsed
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Setting key outside the recognized set
    #[error("unknown key: {0}")]
    UnknownSettingKey(String),

    /// Setting value rejected by its validator
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Hotkey is already taken by another application
    #[error("hotkey is not available: {0}")]
    HotkeyUnavailable(String),

    /// Active language could not be switched
    #[error("failed to switch language: {0}")]
    Language(String),

    /// A core setting could not be written during migration
    #[error("failed to migrate setting {key}: {source}")]
    MigrateSetting {
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// The migration transaction could not be committed
    #[error("failed to commit migration transaction: {0}")]
    MigrationCommit(#[source] rusqlite::Error),
}

/// Result type alias for wox-settings-core
pub type Result<T> = std::result::Result<T, Error>;
