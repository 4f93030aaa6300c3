// crates/assetlog-gateway/src/health.rs
// ============================================================================
// Module: Storage Health
// Description: Tri-state storage readiness derived from TenantConfig.
// Purpose: Report which storage fields are missing without exposing secrets.
// Dependencies: assetlog-core, serde
// ============================================================================

//! ## Overview
//! Health is derived solely from presence: is a bucket named, is a
//! service-account credential present, is the local storage override on.
//! Reports carry booleans and fixed messages, never configured values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use assetlog_core::TenantConfig;
use serde::Serialize;

use crate::gateway::LoadedSettings;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Storage readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Bucket and credentials present, or local override enabled.
    Ok,
    /// Exactly one of bucket or credentials present.
    PartiallyConfigured,
    /// Neither bucket nor credentials present.
    NotConfigured,
}

/// Storage health report for one tenant.
///
/// # Invariants
/// - No field carries a configured value; only presence is reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Overall readiness.
    pub status: HealthStatus,
    /// Human-readable reason naming the missing field, if any.
    pub message: String,
    /// True when a bucket name is configured.
    pub bucket_configured: bool,
    /// True when a service-account credential is configured.
    pub credentials_configured: bool,
    /// True when the local storage override is enabled.
    pub local_override: bool,
    /// Gateway warnings collected while loading settings.
    pub warnings: Vec<String>,
}

impl HealthReport {
    /// Evaluates storage readiness for `config`.
    #[must_use]
    pub fn evaluate(config: &TenantConfig, local_override: bool) -> Self {
        let bucket_configured = config.storage.has_bucket();
        let credentials_configured = config.storage.has_credentials();
        let (status, message) = if local_override {
            (HealthStatus::Ok, "local storage override enabled")
        } else {
            match (bucket_configured, credentials_configured) {
                (true, true) => (HealthStatus::Ok, "storage configured"),
                (false, false) => {
                    (HealthStatus::NotConfigured, "storage bucket and service account not configured")
                }
                (false, true) => (HealthStatus::PartiallyConfigured, "storage bucket not configured"),
                (true, false) => {
                    (HealthStatus::PartiallyConfigured, "storage service account not configured")
                }
            }
        };
        Self {
            status,
            message: message.to_string(),
            bucket_configured,
            credentials_configured,
            local_override,
            warnings: Vec::new(),
        }
    }

    /// Evaluates readiness for a gateway result, carrying its warnings.
    #[must_use]
    pub fn from_loaded(loaded: &LoadedSettings, local_override: bool) -> Self {
        let mut report = Self::evaluate(&loaded.config, local_override);
        report.warnings = loaded.warnings.iter().map(ToString::to_string).collect();
        report
    }

    /// Returns true when storage is usable.
    #[must_use]
    pub fn is_fully_configured(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
