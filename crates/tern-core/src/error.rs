//! Error types for tern-core

use thiserror::Error;

/// Core error type for Tern
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Unknown target requested
    #[error("[E004] Unknown target '{name}'. Available targets: {available}")]
    UnknownTarget { name: String, available: String },

    /// E005: Invalid migration name
    #[error("[E005] Invalid migration name '{name}': {reason}")]
    InvalidMigrationName { name: String, reason: String },

    /// E006: Invalid scope path
    #[error("[E006] Invalid scope '{scope}': {reason}")]
    InvalidScope { scope: String, reason: String },

    /// E007: Migration file already exists
    #[error("[E007] Migration file already exists: {path}")]
    MigrationExists { path: String },

    /// E008: IO error
    #[error("[E008] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E009: IO error with file path context
    #[error("[E009] IO error at {path}: {source}")]
    IoWithPath {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// E010: YAML parse error
    #[error("[E010] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// E011: Existing migrations could not be discovered
    #[error("[E011] {0}")]
    Discovery(#[from] DiscoveryError),

    /// E012: No identifier is left above the highest existing one
    #[error("[E012] No migration identifier is available after {latest}")]
    IdentifiersExhausted { latest: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while discovering migration units on disk.
///
/// Discovery failures abort a run before any database contact.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// L001: Migration directory could not be read
    #[error("[L001] Cannot read migration directory {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// L002: File name does not start with a numeric identifier
    #[error("[L002] Cannot parse migration identifier from '{file}': {reason}")]
    BadIdentifier { file: String, reason: String },

    /// L003: File name carries an invalid migration name
    #[error("[L003] Invalid migration name in '{file}': {reason}")]
    BadName { file: String, reason: String },

    /// L004: A `.down.sql` script has no matching `.up.sql`
    #[error("[L004] Down script without matching up script: {file}")]
    OrphanDownScript { file: String },

    /// L005: The same unit is present as inline file and as script pair
    #[error("[L005] Migration {id} in scope '{scope}' is defined more than once: {first} and {second}")]
    DuplicateUnit {
        id: String,
        scope: String,
        first: String,
        second: String,
    },

    /// L006: Scope directory name is not a valid scope segment
    #[error("[L006] Invalid scope directory '{path}': {reason}")]
    BadScope { path: String, reason: String },

    /// L007: Migration file content could not be read
    #[error("[L007] Cannot read migration file {path}: {source}")]
    UnreadableFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for DiscoveryError
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
