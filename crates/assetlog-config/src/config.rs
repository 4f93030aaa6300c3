// crates/assetlog-config/src/config.rs
// ============================================================================
// Module: Assetlog Configuration
// Description: Configuration loading and validation for the settings service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: assetlog-store-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional; missing sections take their defaults. When no
//! store path is configured the database location is picked from an ordered
//! list of environment-driven candidates, mirroring how the host lays out
//! plugin data directories.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use assetlog_store_sqlite::SqliteStoreConfig;
use assetlog_store_sqlite::SqliteStoreMode;
use assetlog_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "assetlog.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ASSETLOG_CONFIG";
/// Environment variable forcing local attachment storage.
pub const LOCAL_STORAGE_ENV_VAR: &str = "ASSETLOG_FORCE_LOCAL_STORAGE";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default store busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum store busy timeout in milliseconds.
const MAX_STORE_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Default gateway I/O timeout in milliseconds.
const DEFAULT_IO_TIMEOUT_MS: u64 = 3_000;
/// Minimum gateway I/O timeout in milliseconds.
pub(crate) const MIN_IO_TIMEOUT_MS: u64 = 100;
/// Maximum gateway I/O timeout in milliseconds.
pub(crate) const MAX_IO_TIMEOUT_MS: u64 = 30_000;
/// Default log filter directive.
const DEFAULT_LOG_FILTER: &str = "info";
/// Maximum log filter length.
const MAX_LOG_FILTER_LENGTH: usize = 1024;
/// Database file name used for derived candidates.
const DATABASE_FILE_NAME: &str = "assets.db";
/// Plugin identifier used in host data directories.
const PLUGIN_ID: &str = "rpatt-assetlog-app";
/// Environment variables naming a database file directly, in priority order.
const DIRECT_PATH_ENV_VARS: [&str; 3] = ["SQLITE_PATH", "ASSETLOG_DB_PATH", "ASSETLOG_DATA_PATH"];

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Settings service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetlogConfig {
    /// Durable settings store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Settings gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Attachment storage overrides.
    #[serde(default)]
    pub storage: StorageOverrideConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AssetlogConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Loads configuration when a file is present, defaults otherwise.
    ///
    /// An explicit `path` must exist. Without one, a missing default file
    /// yields [`AssetlogConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an existing file fails to load.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if path.is_none() && env::var_os(CONFIG_ENV_VAR).is_none() {
            let default_path = Path::new(DEFAULT_CONFIG_NAME);
            if !default_path.exists() {
                return Ok(Self::default());
            }
        }
        Self::load(path)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.gateway.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Durable settings store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Explicit `SQLite` database path; candidates are derived when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("store.path", &path.to_string_lossy())?;
        }
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_STORE_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be between 1 and {MAX_STORE_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    /// Returns `SQLite` tuning with the configured path, or an empty path
    /// to be replaced by each candidate.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone().unwrap_or_default(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }

    /// Returns the database paths to try, in order.
    #[must_use]
    pub fn path_candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.path {
            return vec![path.clone()];
        }
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        derive_store_candidates(|name| env::var(name).ok(), exe_dir.as_deref(), &env::temp_dir())
    }
}

/// Settings gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Upper bound for each store call, in milliseconds.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl GatewayConfig {
    /// Validates gateway configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_IO_TIMEOUT_MS ..= MAX_IO_TIMEOUT_MS).contains(&self.io_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "gateway.io_timeout_ms must be between {MIN_IO_TIMEOUT_MS} and {MAX_IO_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    /// Returns the store I/O timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Attachment storage overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageOverrideConfig {
    /// Treat storage as configured and keep attachments on local disk.
    #[serde(default)]
    pub force_local: bool,
}

impl StorageOverrideConfig {
    /// Returns true when the config flag or the environment forces local storage.
    #[must_use]
    pub fn local_override_enabled(&self) -> bool {
        self.force_local || env::var(LOCAL_STORAGE_ENV_VAR).is_ok_and(|value| is_truthy(&value))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl LoggingConfig {
    /// Validates logging configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let trimmed = self.filter.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".to_string()));
        }
        if trimmed.len() > MAX_LOG_FILTER_LENGTH {
            return Err(ConfigError::Invalid("logging.filter exceeds max length".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true for the accepted truthy spellings (`1`, `true`, `yes`, `y`, `on`).
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
}

/// Derives the ordered, de-duplicated database path candidates.
///
/// `lookup` reads an environment variable; blank values are ignored.
#[must_use]
pub fn derive_store_candidates(
    lookup: impl Fn(&str) -> Option<String>,
    exe_dir: Option<&Path>,
    temp_dir: &Path,
) -> Vec<PathBuf> {
    let read = |name: &str| {
        lookup(name).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
    };
    let mut candidates = Vec::new();
    for name in DIRECT_PATH_ENV_VARS {
        if let Some(value) = read(name) {
            candidates.push(PathBuf::from(value));
        }
    }
    if let Some(dir) = read("ASSETLOG_DATA_DIR") {
        candidates.push(Path::new(&dir).join(DATABASE_FILE_NAME));
    }
    if let Some(dir) = read("GF_PATHS_DATA") {
        let data_dir = Path::new(&dir);
        candidates.push(data_dir.join("plugins").join(PLUGIN_ID).join(DATABASE_FILE_NAME));
        candidates.push(data_dir.join(PLUGIN_ID).join(DATABASE_FILE_NAME));
    }
    candidates.push(Path::new("/var/lib").join(PLUGIN_ID).join(DATABASE_FILE_NAME));
    if let Some(dir) = exe_dir {
        candidates.push(dir.join(DATABASE_FILE_NAME));
    }
    candidates.push(temp_dir.join("assetlog").join(DATABASE_FILE_NAME));

    let mut unique: Vec<PathBuf> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// Resolves the config path from CLI or environment.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Returns the default store busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Returns the default gateway I/O timeout.
const fn default_io_timeout_ms() -> u64 {
    DEFAULT_IO_TIMEOUT_MS
}

/// Returns the default log filter.
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
