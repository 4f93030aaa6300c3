// crates/assetlog-core/src/core/settings.rs
// ============================================================================
// Module: Assetlog Settings Records
// Description: Host-supplied settings payloads and persisted settings records.
// Purpose: Model incoming, effective, and durable tenant settings explicitly.
// Dependencies: crate::core::{canonical, time}, serde
// ============================================================================

//! ## Overview
//! A [`SettingsPayload`] is what the host hands in on every instantiation
//! (and also the shape of the effective settings chosen by reconciliation).
//! A [`PersistedSettingsRecord`] is the single durable row kept per tenant,
//! including the [`ProvisionedBaseline`] used to recognize replays of the
//! host's static defaults.
//!
//! Security posture: secret values never appear in `Debug` output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::canonical::json_is_blank;
use crate::core::canonical::maps_equal;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Secrets
// ============================================================================

/// A single secret string with redacted debug output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a secret string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret text.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when the secret is empty after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() { f.write_str("<empty>") } else { f.write_str("<redacted>") }
    }
}

/// Secret field name to secret value map.
///
/// # Invariants
/// - Keys iterate in sorted order, so the serialized form is deterministic.
/// - `Debug` lists keys only.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretMap(BTreeMap<String, String>);

impl SecretMap {
    /// Creates an empty secret map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a secret, returning the previous value when present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Returns the secret stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SecretValue> {
        self.0.get(key).map(SecretValue::new)
    }

    /// Returns true when `key` holds a value that is non-empty after trimming.
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|value| !value.trim().is_empty())
    }

    /// Returns true when the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true when any entry holds a value that is non-empty after trimming.
    #[must_use]
    pub fn has_any_value(&self) -> bool {
        self.0.values().any(|value| !value.trim().is_empty())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over secret key names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the underlying map for comparisons and serialization.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Fills keys that are absent or blank here from non-blank values in
    /// `previous`. Existing non-blank values are never replaced.
    pub fn retain_sticky_from(&mut self, previous: &Self) {
        for (key, value) in &previous.0 {
            if value.trim().is_empty() || self.has_value(key) {
                continue;
            }
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns true when both maps hold identical keys and values.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        maps_equal(Some(&self.0), Some(&other.0))
    }
}

impl fmt::Debug for SecretMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Settings as supplied by the host for one instantiation.
///
/// The same shape describes the effective settings chosen by reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPayload {
    /// Raw non-secret JSON blob.
    pub json_data: Vec<u8>,
    /// Decrypted secret fields.
    pub secrets: SecretMap,
    /// Host update marker, when the host supplied one.
    pub updated_at: Option<Timestamp>,
}

impl SettingsPayload {
    /// Creates a payload from its parts.
    #[must_use]
    pub fn new(json_data: impl Into<Vec<u8>>, secrets: SecretMap, updated_at: Option<Timestamp>) -> Self {
        Self {
            json_data: json_data.into(),
            secrets,
            updated_at,
        }
    }

    /// Returns true when the payload carries non-blank JSON or any non-blank secret.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !json_is_blank(&self.json_data) || self.secrets.has_any_value()
    }
}

// ============================================================================
// SECTION: Persisted Records
// ============================================================================

/// Snapshot of the host-supplied defaults for a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionedBaseline {
    /// Canonical non-secret JSON of the defaults.
    pub json_data: Vec<u8>,
    /// Secret fields of the defaults.
    pub secure_data: SecretMap,
    /// Timestamp the defaults carried.
    pub updated_at: Option<Timestamp>,
}

impl ProvisionedBaseline {
    /// Returns true when the baseline records any JSON or secrets.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.json_data.trim_ascii().is_empty() || !self.secure_data.is_empty()
    }
}

/// Durable settings row for one tenant.
///
/// # Invariants
/// - At most one record exists per tenant.
/// - Non-blank `secure_data` entries survive writes that omit them.
/// - Once recorded, `provisioned` changes only on an explicit rebaseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSettingsRecord {
    /// Canonical non-secret JSON blob.
    pub json_data: Vec<u8>,
    /// Secret fields.
    pub secure_data: SecretMap,
    /// Timestamp of the last accepted write.
    pub updated_at: Option<Timestamp>,
    /// Provisioned baseline, absent for rows written before baselines existed.
    pub provisioned: Option<ProvisionedBaseline>,
}

impl PersistedSettingsRecord {
    /// Returns the live settings as a payload.
    #[must_use]
    pub fn to_payload(&self) -> SettingsPayload {
        SettingsPayload {
            json_data: self.json_data.clone(),
            secrets: self.secure_data.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Returns true when the live settings carry non-blank JSON or any non-blank secret.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !json_is_blank(&self.json_data) || self.secure_data.has_any_value()
    }

    /// Returns the baseline when one has actually been recorded.
    #[must_use]
    pub fn recorded_baseline(&self) -> Option<&ProvisionedBaseline> {
        self.provisioned.as_ref().filter(|baseline| baseline.has_content())
    }
}

/// Everything a store needs to compute and upsert a record.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Settings chosen for write-back.
    pub candidate: SettingsPayload,
    /// Record loaded before reconciliation, if any.
    pub previous: Option<PersistedSettingsRecord>,
    /// Explicit replacement baseline; `None` keeps the recorded one.
    pub provisioned_override: Option<ProvisionedBaseline>,
    /// Caller-supplied "now", used when the candidate has no usable timestamp.
    pub saved_at: Timestamp,
}

impl SaveRequest {
    /// Creates a save request that keeps the recorded baseline.
    #[must_use]
    pub const fn new(
        candidate: SettingsPayload,
        previous: Option<PersistedSettingsRecord>,
        saved_at: Timestamp,
    ) -> Self {
        Self {
            candidate,
            previous,
            provisioned_override: None,
            saved_at,
        }
    }

    /// Replaces the recorded baseline with `baseline` on this write.
    #[must_use]
    pub fn with_provisioned(mut self, baseline: ProvisionedBaseline) -> Self {
        self.provisioned_override = Some(baseline);
        self
    }
}
