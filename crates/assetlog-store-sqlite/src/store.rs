// crates/assetlog-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Settings Store
// Description: Durable SettingsStore backed by SQLite WAL.
// Purpose: Persist one settings row per tenant with atomic, monotonic upserts.
// Dependencies: assetlog-core, rusqlite, serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! This module implements a durable [`SettingsStore`] using `SQLite`. Each
//! tenant owns a single `app_settings` row. Saves are one `INSERT ... ON
//! CONFLICT DO UPDATE` statement whose update arm only fires when the new
//! `updated_at` is not older than the stored one; timestamps are stored in
//! the canonical fixed-width text form so the comparison happens in SQL.
//! Security posture: database contents are untrusted; decode failures are
//! reported, never guessed around.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use assetlog_core::PersistedSettingsRecord;
use assetlog_core::ProvisionedBaseline;
use assetlog_core::SalvagedRecord;
use assetlog_core::SecretMap;
use assetlog_core::SettingsStore;
use assetlog_core::StoreError;
use assetlog_core::TenantId;
use assetlog_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
pub const SCHEMA_VERSION: i64 = 2;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Column list shared by reads.
const SELECT_SETTINGS_SQL: &str = "SELECT json_data, secure_json_data, updated_at, \
                                   provisioned_json_data, provisioned_secure_json_data, \
                                   provisioned_updated_at FROM app_settings WHERE tenant_id = ?1";

/// Atomic upsert; the update arm refuses to regress `updated_at`.
const UPSERT_SETTINGS_SQL: &str = "INSERT INTO app_settings (tenant_id, json_data, \
                                   secure_json_data, updated_at, provisioned_json_data, \
                                   provisioned_secure_json_data, provisioned_updated_at) VALUES \
                                   (?1, ?2, ?3, ?4, ?5, ?6, ?7) ON CONFLICT(tenant_id) DO UPDATE \
                                   SET json_data = excluded.json_data, secure_json_data = \
                                   excluded.secure_json_data, updated_at = excluded.updated_at, \
                                   provisioned_json_data = excluded.provisioned_json_data, \
                                   provisioned_secure_json_data = \
                                   excluded.provisioned_secure_json_data, provisioned_updated_at \
                                   = excluded.provisioned_updated_at WHERE excluded.updated_at >= \
                                   app_settings.updated_at";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` settings store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row cannot be decoded.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Upsert refused because the stored row is newer.
    #[error("sqlite store stale write: {0}")]
    Stale(String),
}

impl SqliteStoreError {
    /// Maps a write-path failure onto the store taxonomy.
    fn into_save_error(self) -> StoreError {
        match self {
            Self::Stale(message) => StoreError::Stale(message),
            Self::Invalid(message) => StoreError::Invalid(message),
            other => StoreError::Persistence(other.to_string()),
        }
    }
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Corrupt(message) => Self::Decode(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Stale(message) => Self::Stale(message),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed settings store with WAL support.
#[derive(Clone)]
pub struct SqliteSettingsStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSettingsStore {
    /// Opens an `SQLite`-backed settings store, migrating the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        tracing::info!(path = %config.path.display(), "opened sqlite settings store");
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Opens the first candidate path that can be created and migrated.
    ///
    /// `base` supplies tuning; its path is replaced by each candidate in turn.
    ///
    /// # Errors
    ///
    /// Returns the last candidate's error, or [`SqliteStoreError::Invalid`]
    /// when no candidates are given.
    pub fn open_first(
        candidates: &[PathBuf],
        base: &SqliteStoreConfig,
    ) -> Result<Self, SqliteStoreError> {
        let mut last_error = None;
        for candidate in candidates {
            let config = SqliteStoreConfig {
                path: candidate.clone(),
                ..base.clone()
            };
            match Self::new(config) {
                Ok(store) => return Ok(store),
                Err(err) => {
                    tracing::warn!(
                        path = %candidate.display(),
                        error = %err,
                        "sqlite candidate skipped"
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            SqliteStoreError::Invalid("no sqlite path candidates available".to_string())
        }))
    }

    /// Returns the database path in use.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn load(&self, tenant_id: TenantId) -> Result<Option<PersistedSettingsRecord>, StoreError> {
        let loaded = self.load_record(tenant_id, false).map_err(StoreError::from)?;
        Ok(loaded.map(|salvaged| salvaged.record))
    }

    fn load_salvaged(&self, tenant_id: TenantId) -> Result<Option<SalvagedRecord>, StoreError> {
        self.load_record(tenant_id, true).map_err(StoreError::from)
    }

    fn upsert(&self, tenant_id: TenantId, record: &PersistedSettingsRecord) -> Result<(), StoreError> {
        self.upsert_record(tenant_id, record).map_err(SqliteStoreError::into_save_error)
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        self.list_tenants().map_err(StoreError::from)
    }
}

impl SqliteSettingsStore {
    /// Loads and decodes the tenant row; `lenient` drops undecodable fields.
    fn load_record(
        &self,
        tenant_id: TenantId,
        lenient: bool,
    ) -> Result<Option<SalvagedRecord>, SqliteStoreError> {
        let key = tenant_key(tenant_id)?;
        let row = {
            let guard = self
                .connection
                .lock()
                .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
            let row = guard
                .query_row(SELECT_SETTINGS_SQL, params![key], |row| {
                    Ok(RawSettingsRow {
                        json_data: read_bytes(row, 0)?,
                        secure_json_data: read_bytes(row, 1)?,
                        updated_at: read_bytes(row, 2)?,
                        provisioned_json_data: read_bytes(row, 3)?,
                        provisioned_secure_json_data: read_bytes(row, 4)?,
                        provisioned_updated_at: read_bytes(row, 5)?,
                    })
                })
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            drop(guard);
            row
        };
        row.map(|row| row.decode(lenient)).transpose()
    }

    /// Upserts the tenant row in a single statement.
    fn upsert_record(
        &self,
        tenant_id: TenantId,
        record: &PersistedSettingsRecord,
    ) -> Result<(), SqliteStoreError> {
        let key = tenant_key(tenant_id)?;
        let updated_at = record
            .updated_at
            .ok_or_else(|| SqliteStoreError::Invalid("record missing updated_at".to_string()))?
            .to_canonical_string();
        let secure_json = encode_secret_map(&record.secure_data)?;
        let (provisioned_json, provisioned_secure, provisioned_updated) = match &record.provisioned {
            Some(baseline) => (
                nullable_bytes(&baseline.json_data),
                encode_secret_map(&baseline.secure_data)?,
                baseline.updated_at.map(Timestamp::to_canonical_string),
            ),
            None => (None, None, None),
        };
        let changed = {
            let guard = self
                .connection
                .lock()
                .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
            let changed = guard
                .execute(
                    UPSERT_SETTINGS_SQL,
                    params![
                        key,
                        record.json_data.as_slice(),
                        secure_json,
                        updated_at,
                        provisioned_json,
                        provisioned_secure,
                        provisioned_updated
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            drop(guard);
            changed
        };
        if changed == 0 {
            return Err(SqliteStoreError::Stale(format!(
                "tenant {tenant_id} has a stored record newer than {updated_at}"
            )));
        }
        Ok(())
    }

    /// Lists tenants with stored rows.
    fn list_tenants(&self) -> Result<Vec<TenantId>, SqliteStoreError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        let mut statement = guard
            .prepare("SELECT tenant_id FROM app_settings ORDER BY tenant_id")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let keys = statement
            .query_map(params![], |row| row.get::<_, i64>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        keys.into_iter()
            .map(|key| {
                u64::try_from(key)
                    .ok()
                    .and_then(TenantId::from_raw)
                    .ok_or_else(|| SqliteStoreError::Corrupt(format!("invalid tenant_id {key}")))
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Raw column values for one settings row.
struct RawSettingsRow {
    /// Live JSON blob.
    json_data: Option<Vec<u8>>,
    /// Live secret map JSON.
    secure_json_data: Option<Vec<u8>>,
    /// Live timestamp text.
    updated_at: Option<Vec<u8>>,
    /// Baseline JSON blob.
    provisioned_json_data: Option<Vec<u8>>,
    /// Baseline secret map JSON.
    provisioned_secure_json_data: Option<Vec<u8>>,
    /// Baseline timestamp text.
    provisioned_updated_at: Option<Vec<u8>>,
}

impl RawSettingsRow {
    /// Decodes the row; in lenient mode bad fields are dropped and listed.
    fn decode(self, lenient: bool) -> Result<SalvagedRecord, SqliteStoreError> {
        let mut dropped = Vec::new();
        let secure_data =
            decode_secret_map("secure_json_data", self.secure_json_data, lenient, &mut dropped)?;
        let updated_at = decode_timestamp("updated_at", self.updated_at, lenient, &mut dropped)?;
        let provisioned_secure = decode_secret_map(
            "provisioned_secure_json_data",
            self.provisioned_secure_json_data,
            lenient,
            &mut dropped,
        )?;
        let provisioned_updated = decode_timestamp(
            "provisioned_updated_at",
            self.provisioned_updated_at,
            lenient,
            &mut dropped,
        )?;
        let provisioned_json = self.provisioned_json_data.unwrap_or_default();
        let provisioned = if provisioned_json.trim_ascii().is_empty() && provisioned_secure.is_empty() {
            None
        } else {
            Some(ProvisionedBaseline {
                json_data: provisioned_json,
                secure_data: provisioned_secure,
                updated_at: provisioned_updated,
            })
        };
        Ok(SalvagedRecord {
            record: PersistedSettingsRecord {
                json_data: self.json_data.unwrap_or_default(),
                secure_data,
                updated_at,
                provisioned,
            },
            dropped,
        })
    }
}

/// Decodes a stored secret map column.
fn decode_secret_map(
    field: &str,
    raw: Option<Vec<u8>>,
    lenient: bool,
    dropped: &mut Vec<String>,
) -> Result<SecretMap, SqliteStoreError> {
    let Some(bytes) = raw.filter(|bytes| !bytes.trim_ascii().is_empty()) else {
        return Ok(SecretMap::new());
    };
    match serde_json::from_slice::<SecretMap>(&bytes) {
        Ok(map) => Ok(map),
        Err(_) if lenient => {
            dropped.push(field.to_string());
            Ok(SecretMap::new())
        }
        Err(err) => Err(SqliteStoreError::Corrupt(format!("decode {field}: {err}"))),
    }
}

/// Decodes a stored timestamp column.
fn decode_timestamp(
    field: &str,
    raw: Option<Vec<u8>>,
    lenient: bool,
    dropped: &mut Vec<String>,
) -> Result<Option<Timestamp>, SqliteStoreError> {
    let Some(bytes) = raw.filter(|bytes| !bytes.trim_ascii().is_empty()) else {
        return Ok(None);
    };
    let parsed = std::str::from_utf8(&bytes)
        .map_err(|err| err.to_string())
        .and_then(|text| Timestamp::parse(text).map_err(|err| err.to_string()));
    match parsed {
        Ok(timestamp) => Ok(Some(timestamp)),
        Err(_) if lenient => {
            dropped.push(field.to_string());
            Ok(None)
        }
        Err(err) => Err(SqliteStoreError::Corrupt(format!("parse {field}: {err}"))),
    }
}

/// Reads a TEXT or BLOB column as bytes.
fn read_bytes(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<Option<Vec<u8>>> {
    let value = row.get_ref(index)?;
    value.as_bytes_or_null().map(|bytes| bytes.map(<[u8]>::to_vec)).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(index, value.data_type(), Box::new(err))
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a tenant identifier into the `SQLite` integer key.
fn tenant_key(tenant_id: TenantId) -> Result<i64, SqliteStoreError> {
    i64::try_from(tenant_id.get())
        .map_err(|_| SqliteStoreError::Invalid(format!("tenant id {tenant_id} out of range")))
}

/// Serializes a secret map; empty maps are stored as NULL.
fn encode_secret_map(map: &SecretMap) -> Result<Option<String>, SqliteStoreError> {
    if map.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(map)
        .map(Some)
        .map_err(|err| SqliteStoreError::Invalid(format!("encode secret map: {err}")))
}

/// Returns `None` for blank blobs.
fn nullable_bytes(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.trim_ascii().is_empty() { None } else { Some(bytes.to_vec()) }
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.trim().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must be non-empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema, upgrading version 1 databases in place.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS app_settings (
                    tenant_id INTEGER PRIMARY KEY,
                    json_data BLOB NOT NULL,
                    secure_json_data TEXT,
                    updated_at TEXT NOT NULL,
                    provisioned_json_data BLOB,
                    provisioned_secure_json_data TEXT,
                    provisioned_updated_at TEXT
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(1) => {
            tx.execute_batch(
                "ALTER TABLE app_settings ADD COLUMN provisioned_json_data BLOB;
                ALTER TABLE app_settings ADD COLUMN provisioned_secure_json_data TEXT;
                ALTER TABLE app_settings ADD COLUMN provisioned_updated_at TEXT;",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute("UPDATE store_meta SET version = ?1", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rewritten = normalize_timestamps(&tx)?;
            tracing::info!(
                from = 1,
                to = SCHEMA_VERSION,
                rewritten_timestamps = rewritten,
                "upgraded sqlite settings schema"
            );
        }
        Some(value) if value == SCHEMA_VERSION => {
            let rewritten = normalize_timestamps(&tx)?;
            if rewritten > 0 {
                tracing::warn!(rewritten_timestamps = rewritten, "normalized non-canonical timestamps");
            }
        }
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Rewrites parseable, non-canonical timestamp text into canonical form.
///
/// The upsert guard compares timestamp text, which orders correctly only in
/// canonical form. Unparsable values are left for decode to report.
fn normalize_timestamps(tx: &Transaction<'_>) -> Result<usize, SqliteStoreError> {
    let rows = {
        let mut statement = tx
            .prepare("SELECT tenant_id, updated_at, provisioned_updated_at FROM app_settings")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        statement
            .query_map(params![], |row| {
                Ok((row.get::<_, i64>(0)?, read_bytes(row, 1)?, read_bytes(row, 2)?))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
    };
    let mut rewritten = 0;
    for (key, updated_at, provisioned_updated_at) in rows {
        let updated_at = recanonicalized(updated_at.as_deref());
        let provisioned_updated_at = recanonicalized(provisioned_updated_at.as_deref());
        if updated_at.is_none() && provisioned_updated_at.is_none() {
            continue;
        }
        tx.execute(
            "UPDATE app_settings SET updated_at = COALESCE(?2, updated_at), \
             provisioned_updated_at = COALESCE(?3, provisioned_updated_at) WHERE tenant_id = ?1",
            params![key, updated_at, provisioned_updated_at],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        rewritten += 1;
    }
    Ok(rewritten)
}

/// Returns the canonical text for `raw` when it parses but is not canonical.
fn recanonicalized(raw: Option<&[u8]>) -> Option<String> {
    let text = std::str::from_utf8(raw?).ok()?;
    let canonical = Timestamp::parse(text).ok()?.to_canonical_string();
    (canonical != text).then_some(canonical)
}
