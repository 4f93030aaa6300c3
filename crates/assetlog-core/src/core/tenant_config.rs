// crates/assetlog-core/src/core/tenant_config.rs
// ============================================================================
// Module: Assetlog Tenant Config
// Description: Typed configuration derived from effective settings.
// Purpose: Decode the settings blob, apply clamping, and expose storage readiness.
// Dependencies: crate::core::{canonical, settings}, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`TenantConfig`] is rebuilt on every instantiation from the effective
//! settings; it is never persisted directly. Non-secret fields come from the
//! JSON blob (`apiUrl`, `bucketName`, `objectPrefix`, `maxUploadSizeMb`),
//! secrets from the secret map (`apiKey`, `gcsServiceAccount`).
//!
//! Security posture: secret fields are wrapped in [`SecretValue`] and never
//! rendered by `Debug`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use thiserror::Error;

use crate::core::canonical::json_is_blank;
use crate::core::settings::SecretValue;
use crate::core::settings::SettingsPayload;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upload size used when none (or a non-positive one) is configured.
pub const DEFAULT_MAX_UPLOAD_SIZE_MB: u64 = 25;
/// Upper bound on the configured upload size.
pub const MAX_ALLOWED_UPLOAD_SIZE_MB: u64 = 5120;
/// Bytes per megabyte for upload limits.
pub const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;
/// Secret key holding the external API key.
pub const API_KEY_SECRET: &str = "apiKey";
/// Secret key holding the object-store service account credential.
pub const SERVICE_ACCOUNT_SECRET: &str = "gcsServiceAccount";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while decoding the non-secret settings blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantConfigError {
    /// The JSON blob is malformed or has the wrong shape.
    #[error("decode settings json: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Raw JSON shape of the non-secret settings blob.
#[derive(Debug, Default, Deserialize)]
struct RawJsonData {
    /// External API base URL.
    #[serde(rename = "apiUrl", default)]
    api_url: Option<String>,
    /// Object-store bucket name.
    #[serde(rename = "bucketName", default)]
    bucket_name: Option<String>,
    /// Object-key prefix.
    #[serde(rename = "objectPrefix", default)]
    object_prefix: Option<String>,
    /// Requested upload limit in megabytes.
    #[serde(rename = "maxUploadSizeMb", default)]
    max_upload_size_mb: Option<i64>,
}

/// Object-storage configuration for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Bucket name (trimmed).
    pub bucket: String,
    /// Object-key prefix (trimmed).
    pub prefix: String,
    /// Upload limit in megabytes after clamping.
    pub max_upload_size_mb: u64,
    /// Upload limit in bytes after clamping.
    pub max_upload_size_bytes: u64,
    /// Raw credential blob for the object-store signer.
    pub service_account: SecretValue,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            max_upload_size_mb: DEFAULT_MAX_UPLOAD_SIZE_MB,
            max_upload_size_bytes: DEFAULT_MAX_UPLOAD_SIZE_MB * BYTES_PER_MEGABYTE,
            service_account: SecretValue::default(),
        }
    }
}

impl StorageConfig {
    /// Returns true when a bucket name is configured.
    #[must_use]
    pub const fn has_bucket(&self) -> bool {
        !self.bucket.is_empty()
    }

    /// Returns true when a credential blob is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.service_account.expose().is_empty()
    }

    /// Returns true when storage can be used: bucket plus credentials, or
    /// the local storage override.
    #[must_use]
    pub fn is_fully_configured(&self, local_override: bool) -> bool {
        local_override || (self.has_bucket() && self.has_credentials())
    }
}

/// Configuration the service runs with for one tenant and instantiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantConfig {
    /// External API URL (trimmed).
    pub api_url: String,
    /// External API key.
    pub api_key: SecretValue,
    /// Object-storage settings.
    pub storage: StorageConfig,
}

impl TenantConfig {
    /// Derives the tenant config from effective settings.
    ///
    /// # Errors
    ///
    /// Returns [`TenantConfigError::Decode`] when the JSON blob is malformed.
    pub fn from_settings(settings: &SettingsPayload) -> Result<Self, TenantConfigError> {
        let raw = decode_json_data(&settings.json_data)?;
        Ok(Self::assemble(raw, settings))
    }

    /// Derives the tenant config, substituting defaults for a malformed blob.
    ///
    /// Secrets are still applied when the blob is malformed; the decode error
    /// is returned alongside so callers can report it.
    #[must_use]
    pub fn from_settings_lenient(settings: &SettingsPayload) -> (Self, Option<TenantConfigError>) {
        match decode_json_data(&settings.json_data) {
            Ok(raw) => (Self::assemble(raw, settings), None),
            Err(err) => (Self::assemble(RawJsonData::default(), settings), Some(err)),
        }
    }

    /// Builds the config from decoded JSON plus the payload's secrets.
    fn assemble(raw: RawJsonData, settings: &SettingsPayload) -> Self {
        let max_upload_size_mb = raw.max_upload_size_mb.map_or(DEFAULT_MAX_UPLOAD_SIZE_MB, clamp_upload_size_mb);
        Self {
            api_url: trimmed(raw.api_url),
            api_key: settings.secrets.get(API_KEY_SECRET).unwrap_or_default(),
            storage: StorageConfig {
                bucket: trimmed(raw.bucket_name),
                prefix: trimmed(raw.object_prefix),
                max_upload_size_mb,
                max_upload_size_bytes: max_upload_size_mb * BYTES_PER_MEGABYTE,
                service_account: settings.secrets.get(SERVICE_ACCOUNT_SECRET).unwrap_or_default(),
            },
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Clamps a requested upload size in megabytes.
///
/// Non-positive requests fall back to the default; larger requests are capped.
#[must_use]
pub fn clamp_upload_size_mb(requested: i64) -> u64 {
    match u64::try_from(requested) {
        Ok(0) | Err(_) => DEFAULT_MAX_UPLOAD_SIZE_MB,
        Ok(value) => value.min(MAX_ALLOWED_UPLOAD_SIZE_MB),
    }
}

/// Decodes the non-secret JSON blob; blank blobs decode to defaults.
fn decode_json_data(blob: &[u8]) -> Result<RawJsonData, TenantConfigError> {
    if json_is_blank(blob) {
        return Ok(RawJsonData::default());
    }
    serde_json::from_slice(blob.trim_ascii()).map_err(|err| TenantConfigError::Decode(err.to_string()))
}

/// Trims an optional string field, defaulting to empty.
fn trimmed(value: Option<String>) -> String {
    value.map(|text| text.trim().to_string()).unwrap_or_default()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
