// crates/assetlog-core/src/runtime/store.rs
// ============================================================================
// Module: Assetlog In-Memory Store
// Description: Simple in-memory settings store for tests and local tooling.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`SettingsStore`].
//! It enforces the same stale-write guard as the durable store: an upsert
//! whose `updated_at` is older than the stored one is refused. It is not
//! intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::PersistedSettingsRecord;
use crate::core::TenantId;
use crate::interfaces::SettingsStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory settings store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemorySettingsStore {
    /// Records keyed by tenant, protected by a mutex.
    records: Arc<Mutex<BTreeMap<TenantId, PersistedSettingsRecord>>>,
}

impl InMemorySettingsStore {
    /// Creates a new, empty in-memory settings store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn load(&self, tenant_id: TenantId) -> Result<Option<PersistedSettingsRecord>, StoreError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("settings store mutex poisoned".to_string()))?;
        Ok(guard.get(&tenant_id).cloned())
    }

    fn upsert(&self, tenant_id: TenantId, record: &PersistedSettingsRecord) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| StoreError::Persistence("settings store mutex poisoned".to_string()))?;
        if let Some(existing) = guard.get(&tenant_id)
            && let (Some(stored_at), Some(next_at)) = (existing.updated_at, record.updated_at)
            && next_at < stored_at
        {
            return Err(StoreError::Stale(format!(
                "tenant {tenant_id} stored at {stored_at}, write carries {next_at}"
            )));
        }
        guard.insert(tenant_id, record.clone());
        Ok(())
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("settings store mutex poisoned".to_string()))?;
        Ok(guard.keys().copied().collect())
    }
}
