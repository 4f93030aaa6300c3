// crates/assetlog-core/src/interfaces/mod.rs
// ============================================================================
// Module: Assetlog Interfaces
// Description: Backend-agnostic seams for durable settings storage.
// Purpose: Let the gateway reconcile against any store implementation.
// Dependencies: crate::core, crate::runtime, thiserror
// ============================================================================

//! ## Overview
//! Stores persist one [`PersistedSettingsRecord`] per tenant. Saves go through
//! [`SettingsStore::save`], which derives the record (sticky secrets,
//! provisioned baseline) before handing it to the backend's atomic upsert.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::PersistedSettingsRecord;
use crate::core::SaveRequest;
use crate::core::TenantId;
use crate::runtime::build_persisted_record;

// ============================================================================
// SECTION: Settings Store
// ============================================================================

/// Settings store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store is not initialized or cannot be reached.
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
    /// A write failed.
    #[error("settings store persistence failed: {0}")]
    Persistence(String),
    /// A stored secret map or timestamp cannot be decoded.
    #[error("settings store decode error: {0}")]
    Decode(String),
    /// An upsert was refused because it would regress `updated_at`.
    #[error("settings store rejected stale write: {0}")]
    Stale(String),
    /// Input cannot be stored.
    #[error("settings store invalid data: {0}")]
    Invalid(String),
}

/// Record recovered from a row that failed strict decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalvagedRecord {
    /// Record with undecodable fields dropped.
    pub record: PersistedSettingsRecord,
    /// Names of the fields that were dropped.
    pub dropped: Vec<String>,
}

/// Durable per-tenant settings storage.
pub trait SettingsStore {
    /// Loads the record for a tenant; `Ok(None)` when no row exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store cannot be read and
    /// [`StoreError::Decode`] when the row cannot be decoded.
    fn load(&self, tenant_id: TenantId) -> Result<Option<PersistedSettingsRecord>, StoreError>;

    /// Loads the record for a tenant, dropping fields that fail to decode.
    ///
    /// Stores whose rows are always well-formed keep the default, which
    /// delegates to [`SettingsStore::load`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read at all.
    fn load_salvaged(&self, tenant_id: TenantId) -> Result<Option<SalvagedRecord>, StoreError> {
        Ok(self.load(tenant_id)?.map(|record| SalvagedRecord {
            record,
            dropped: Vec::new(),
        }))
    }

    /// Atomically inserts or replaces the tenant's record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Stale`] when the stored record is newer and
    /// [`StoreError::Persistence`] when the write fails.
    fn upsert(&self, tenant_id: TenantId, record: &PersistedSettingsRecord) -> Result<(), StoreError>;

    /// Lists tenants with stored records, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store cannot be read.
    fn tenants(&self) -> Result<Vec<TenantId>, StoreError>;

    /// Computes the record for `request` and upserts it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the upsert fails.
    fn save(&self, tenant_id: TenantId, request: &SaveRequest) -> Result<(), StoreError> {
        let record = build_persisted_record(request);
        self.upsert(tenant_id, &record)
    }
}

/// Shared, thread-safe store handle.
pub type SharedSettingsStore = Arc<dyn SettingsStore + Send + Sync>;
