//! # Configuration
//!
//! `rollbook.toml` (all sections optional):
//!
//! ```toml
//! [storage]
//! backend = "redb"        # or "file"
//! path = "rollbook.db"
//!
//! [roster]
//! path = "roster.toml"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [clock]
//! today = "2024-09-16"    # pin the calendar day (testing, back-office runs)
//! ```
//!
//! Command-line flags override file values; see `Settings::resolve`.

use chrono::NaiveDate;
use rollbook_core::{RollbookError, RosterDirectory};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Maximum size of a configuration or roster file (4 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 4 * 1024 * 1024;

// =============================================================================
// FILE SCHEMA
// =============================================================================

/// Contents of `rollbook.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollbookConfig {
    pub storage: StorageConfig,
    pub roster: RosterConfig,
    pub server: ServerConfig,
    pub clock: ClockConfig,
}

/// Storage backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// redb database, every change committed immediately.
    #[default]
    Redb,
    /// Snapshot file, rewritten after each change.
    File,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redb => "redb",
            Self::File => "file",
        })
    }
}

impl FromStr for BackendKind {
    type Err = RollbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "file" => Ok(Self::File),
            other => Err(RollbookError::ValidationFailed(format!(
                "Unknown backend: {}. Use: redb, file",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: PathBuf::from("rollbook.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RosterConfig {
    pub path: PathBuf,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("roster.toml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Fixed calendar day; the system clock is used when absent.
    pub today: Option<NaiveDate>,
}

impl RollbookConfig {
    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self, RollbookError> {
        toml::from_str(text)
            .map_err(|e| RollbookError::ValidationFailed(format!("Invalid configuration: {}", e)))
    }

    /// Load `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, RollbookError> {
        if !path.exists() {
            tracing::debug!("No configuration at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::parse(&read_text(path)?)
    }
}

// =============================================================================
// RESOLVED SETTINGS
// =============================================================================

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<BackendKind>,
    pub database: Option<PathBuf>,
    pub roster: Option<PathBuf>,
    pub today: Option<NaiveDate>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Effective settings after merging file and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: BackendKind,
    pub database: PathBuf,
    pub roster: PathBuf,
    pub today: Option<NaiveDate>,
    pub server: ServerConfig,
}

impl Settings {
    #[must_use]
    pub fn resolve(config: RollbookConfig, overrides: Overrides) -> Self {
        Self {
            backend: overrides.backend.unwrap_or(config.storage.backend),
            database: overrides.database.unwrap_or(config.storage.path),
            roster: overrides.roster.unwrap_or(config.roster.path),
            today: overrides.today.or(config.clock.today),
            server: ServerConfig {
                host: overrides.host.unwrap_or(config.server.host),
                port: overrides.port.unwrap_or(config.server.port),
            },
        }
    }
}

// =============================================================================
// ROSTER FILE
// =============================================================================

/// Parse a roster document (`[[classes]]` and `[[students]]` tables).
pub fn parse_roster(text: &str) -> Result<RosterDirectory, RollbookError> {
    toml::from_str(text)
        .map_err(|e| RollbookError::ValidationFailed(format!("Invalid roster: {}", e)))
}

/// Load the roster file; a missing file yields an empty roster.
pub fn load_roster(path: &Path) -> Result<RosterDirectory, RollbookError> {
    if !path.exists() {
        tracing::warn!("Roster file {:?} not found, starting with an empty roster", path);
        return Ok(RosterDirectory::new());
    }
    parse_roster(&read_text(path)?)
}

fn read_text(path: &Path) -> Result<String, RollbookError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RollbookError::IoError(format!("Cannot read {:?}: {}", path, e)))?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(RollbookError::ValidationFailed(format!(
            "File {:?} is {} bytes, maximum is {}",
            path,
            metadata.len(),
            MAX_CONFIG_FILE_SIZE
        )));
    }
    std::fs::read_to_string(path)
        .map_err(|e| RollbookError::IoError(format!("Cannot read {:?}: {}", path, e)))
}

// =============================================================================
// TESTS
// =============================================================================
