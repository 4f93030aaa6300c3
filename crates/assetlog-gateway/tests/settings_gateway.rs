// crates/assetlog-gateway/tests/settings_gateway.rs
// ============================================================================
// Module: Settings Gateway Tests
// Description: End-to-end gateway behavior over healthy and failing stores.
// Purpose: Ensure instantiation always yields a config and degrades with
//          warnings instead of errors.
// ============================================================================

//! ## Overview
//! Drives [`SettingsGateway`] through the instantiation lifecycle and through
//! every degraded path: unavailable, slow, corrupt, racing, and cancelled.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use assetlog_core::InMemorySettingsStore;
use assetlog_core::PersistedSettingsRecord;
use assetlog_core::ReconcileOutcome;
use assetlog_core::SalvagedRecord;
use assetlog_core::SecretMap;
use assetlog_core::SettingsPayload;
use assetlog_core::SettingsStore;
use assetlog_core::SharedSettingsStore;
use assetlog_core::StoreError;
use assetlog_core::TenantId;
use assetlog_core::Timestamp;
use assetlog_gateway::GatewayWarning;
use assetlog_gateway::HealthReport;
use assetlog_gateway::HealthStatus;
use assetlog_gateway::LoadOutcome;
use assetlog_gateway::SettingsGateway;
use assetlog_store_sqlite::SqliteSettingsStore;
use assetlog_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const T0: &str = "2024-01-01T00:00:00Z";
const T1: &str = "2024-02-01T00:00:00Z";
const BASELINE_JSON: &str = r#"{"apiUrl":"https://x","bucketName":"b"}"#;

fn tenant(raw: u64) -> TenantId {
    TenantId::from_raw(raw).expect("nonzero tenant")
}

fn at(text: &str) -> Timestamp {
    Timestamp::parse(text).expect("timestamp")
}

fn now() -> Timestamp {
    at("2030-01-01T00:00:00Z")
}

fn payload(json: &str, secrets: &[(&str, &str)], updated_at: Option<&str>) -> SettingsPayload {
    SettingsPayload::new(json, secrets.iter().copied().collect::<SecretMap>(), updated_at.map(at))
}

fn baseline() -> SettingsPayload {
    payload(BASELINE_JSON, &[("apiKey", "k")], Some(T0))
}

fn gateway_over(store: SharedSettingsStore, timeout: Duration) -> SettingsGateway {
    SettingsGateway::new(store, timeout)
}

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

/// Store whose every call fails as unavailable.
struct UnavailableStore;

impl SettingsStore for UnavailableStore {
    fn load(&self, _: TenantId) -> Result<Option<PersistedSettingsRecord>, StoreError> {
        Err(StoreError::Unavailable("store not initialized".to_string()))
    }

    fn upsert(&self, _: TenantId, _: &PersistedSettingsRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store not initialized".to_string()))
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        Ok(Vec::new())
    }
}

/// Store that reads normally but fails every write.
struct ReadOnlyStore(InMemorySettingsStore);

impl SettingsStore for ReadOnlyStore {
    fn load(&self, tenant_id: TenantId) -> Result<Option<PersistedSettingsRecord>, StoreError> {
        self.0.load(tenant_id)
    }

    fn upsert(&self, _: TenantId, _: &PersistedSettingsRecord) -> Result<(), StoreError> {
        Err(StoreError::Persistence("disk full".to_string()))
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        self.0.tenants()
    }
}

/// Store whose reads block longer than any test timeout.
struct SlowStore(Duration);

impl SettingsStore for SlowStore {
    fn load(&self, _: TenantId) -> Result<Option<PersistedSettingsRecord>, StoreError> {
        std::thread::sleep(self.0);
        Ok(None)
    }

    fn upsert(&self, _: TenantId, _: &PersistedSettingsRecord) -> Result<(), StoreError> {
        Ok(())
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        Ok(Vec::new())
    }
}

/// Store whose row fails strict decoding but can be salvaged.
struct CorruptStore(Option<PersistedSettingsRecord>);

impl SettingsStore for CorruptStore {
    fn load(&self, _: TenantId) -> Result<Option<PersistedSettingsRecord>, StoreError> {
        Err(StoreError::Decode("decode secure_json_data: expected value".to_string()))
    }

    fn load_salvaged(&self, _: TenantId) -> Result<Option<SalvagedRecord>, StoreError> {
        Ok(self.0.clone().map(|record| SalvagedRecord {
            record,
            dropped: vec!["secure_json_data".to_string()],
        }))
    }

    fn upsert(&self, _: TenantId, _: &PersistedSettingsRecord) -> Result<(), StoreError> {
        panic!("salvaged rows must not be written back");
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        Ok(Vec::new())
    }
}

/// Store that loses every write race to a newer writer.
struct RacingStore(PersistedSettingsRecord);

impl SettingsStore for RacingStore {
    fn load(&self, _: TenantId) -> Result<Option<PersistedSettingsRecord>, StoreError> {
        Ok(Some(self.0.clone()))
    }

    fn upsert(&self, _: TenantId, _: &PersistedSettingsRecord) -> Result<(), StoreError> {
        Err(StoreError::Stale("stored record is newer".to_string()))
    }

    fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        Ok(Vec::new())
    }
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

#[tokio::test]
async fn instantiation_lifecycle_keeps_user_edits() {
    let store = InMemorySettingsStore::new();
    let gateway = gateway_over(Arc::new(store.clone()), Duration::from_secs(2));
    let tenant_id = tenant(99);

    let first = gateway.reconcile_at(tenant_id, baseline(), now(), never()).await;
    assert_eq!(first.outcome, LoadOutcome::Reconciled(ReconcileOutcome::FirstPersist));
    assert!(first.persisted);
    assert!(first.warnings.is_empty());
    assert_eq!(first.config.api_url, "https://x");
    let record = store.load(tenant_id).unwrap().expect("row for tenant 99");
    assert!(record.provisioned.is_some());

    let replay = gateway.reconcile_at(tenant_id, baseline(), now(), never()).await;
    assert_eq!(replay.outcome, LoadOutcome::Reconciled(ReconcileOutcome::ProvisionedReplay));
    assert!(!replay.persisted);

    let edit = payload(r#"{"apiUrl":"https://x","bucketName":"b2"}"#, &[], Some(T1));
    let edited = gateway.reconcile_at(tenant_id, edit, now(), never()).await;
    assert_eq!(edited.outcome, LoadOutcome::Reconciled(ReconcileOutcome::Updated));
    assert!(edited.persisted);
    assert_eq!(edited.config.storage.bucket, "b2");
    assert_eq!(edited.config.api_key.expose(), "k");

    let resent = gateway.reconcile_at(tenant_id, baseline(), now(), never()).await;
    assert_eq!(resent.outcome, LoadOutcome::Reconciled(ReconcileOutcome::ProvisionedReplay));
    assert!(!resent.persisted);
    assert_eq!(resent.config.storage.bucket, "b2");

    let empty = gateway.reconcile_at(tenant_id, payload("{}", &[], None), now(), never()).await;
    assert_eq!(empty.outcome, LoadOutcome::Reconciled(ReconcileOutcome::EmptyIncoming));
    assert_eq!(empty.config.storage.bucket, "b2");
    let record = store.load(tenant_id).unwrap().expect("record");
    assert_eq!(record.updated_at, Some(at(T1)));
}

#[tokio::test]
async fn oversized_upload_limit_is_clamped() {
    let gateway = gateway_over(Arc::new(InMemorySettingsStore::new()), Duration::from_secs(2));
    let incoming = payload(r#"{"maxUploadSizeMb":999999}"#, &[], Some(T0));
    let loaded = gateway.reconcile_and_load(tenant(1), incoming).await;
    assert_eq!(loaded.config.storage.max_upload_size_mb, 5120);
    assert_eq!(loaded.config.storage.max_upload_size_bytes, 5_368_709_120);
}

#[tokio::test]
async fn empty_first_run_yields_defaults_without_write() {
    let store = InMemorySettingsStore::new();
    let gateway = gateway_over(Arc::new(store.clone()), Duration::from_secs(2));
    let loaded = gateway.reconcile_and_load(tenant(2), SettingsPayload::default()).await;
    assert_eq!(loaded.outcome, LoadOutcome::Reconciled(ReconcileOutcome::NothingToPersist));
    assert!(!loaded.persisted);
    assert_eq!(loaded.config.storage.max_upload_size_mb, 25);
    assert!(store.load(tenant(2)).unwrap().is_none());
}

#[tokio::test]
async fn tenants_are_reconciled_independently() {
    let store = InMemorySettingsStore::new();
    let gateway = gateway_over(Arc::new(store.clone()), Duration::from_secs(2));
    let a = payload(r#"{"bucketName":"a"}"#, &[("apiKey", "ka")], Some(T0));
    let b = payload(r#"{"bucketName":"b"}"#, &[("apiKey", "kb")], Some(T0));
    let (left, right) = tokio::join!(
        gateway.reconcile_and_load(tenant(10), a),
        gateway.reconcile_and_load(tenant(11), b)
    );
    assert_eq!(left.config.storage.bucket, "a");
    assert_eq!(right.config.api_key.expose(), "kb");
    assert_eq!(store.tenants().unwrap(), vec![tenant(10), tenant(11)]);
}

#[tokio::test]
async fn sqlite_backed_gateway_survives_restart() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("assets.db");
    let open = || {
        let store = SqliteSettingsStore::new(SqliteStoreConfig::new(&path)).expect("store init");
        gateway_over(Arc::new(store), Duration::from_secs(2))
    };

    let gateway = open();
    gateway.reconcile_at(tenant(99), baseline(), now(), never()).await;
    let edit = payload(r#"{"apiUrl":"https://x","bucketName":"b2"}"#, &[], Some(T1));
    gateway.reconcile_at(tenant(99), edit, now(), never()).await;
    drop(gateway);

    let restarted = open();
    let loaded = restarted.reconcile_at(tenant(99), baseline(), now(), never()).await;
    assert_eq!(loaded.outcome, LoadOutcome::Reconciled(ReconcileOutcome::ProvisionedReplay));
    assert_eq!(loaded.config.storage.bucket, "b2");
    assert_eq!(loaded.config.api_key.expose(), "k");
}

// ============================================================================
// SECTION: Degraded Paths
// ============================================================================

#[tokio::test]
async fn unavailable_store_degrades_to_incoming() {
    let gateway = gateway_over(Arc::new(UnavailableStore), Duration::from_secs(2));
    let loaded = gateway.reconcile_at(tenant(5), baseline(), now(), never()).await;
    assert_eq!(loaded.outcome, LoadOutcome::IncomingOnly);
    assert!(!loaded.persisted);
    assert_eq!(loaded.config.storage.bucket, "b");
    assert_eq!(
        loaded.warnings,
        vec![GatewayWarning::StoreUnavailable("store not initialized".to_string())]
    );
}

#[tokio::test]
async fn storeless_gateway_degrades_to_incoming() {
    let gateway = SettingsGateway::unavailable(Duration::from_secs(2));
    let loaded = gateway.reconcile_at(tenant(5), baseline(), now(), never()).await;
    assert_eq!(loaded.outcome, LoadOutcome::IncomingOnly);
    assert!(!loaded.persisted);
    assert_eq!(loaded.config.api_key.expose(), "k");
    assert_eq!(
        loaded.warnings,
        vec![GatewayWarning::StoreUnavailable("settings store not initialized".to_string())]
    );
}

#[tokio::test]
async fn failed_write_keeps_effective_settings_in_memory() {
    let gateway =
        gateway_over(Arc::new(ReadOnlyStore(InMemorySettingsStore::new())), Duration::from_secs(2));
    let loaded = gateway.reconcile_at(tenant(5), baseline(), now(), never()).await;
    assert_eq!(loaded.outcome, LoadOutcome::Reconciled(ReconcileOutcome::FirstPersist));
    assert!(!loaded.persisted);
    assert_eq!(loaded.config.storage.bucket, "b");
    assert_eq!(loaded.warnings, vec![GatewayWarning::PersistenceFailed("disk full".to_string())]);
}

#[tokio::test]
async fn slow_store_times_out() {
    let gateway =
        gateway_over(Arc::new(SlowStore(Duration::from_millis(500))), Duration::from_millis(50));
    let loaded = gateway.reconcile_at(tenant(5), baseline(), now(), never()).await;
    assert_eq!(loaded.outcome, LoadOutcome::IncomingOnly);
    assert_eq!(loaded.config.storage.bucket, "b");
    assert_eq!(
        loaded.warnings,
        vec![GatewayWarning::StoreTimeout {
            operation: "load",
            timeout_ms: 50,
        }]
    );
}

#[tokio::test]
async fn cancellation_falls_back_to_incoming() {
    let gateway =
        gateway_over(Arc::new(SlowStore(Duration::from_millis(500))), Duration::from_secs(5));
    let cancel = tokio::time::sleep(Duration::from_millis(20));
    let loaded = gateway.reconcile_and_load_until(tenant(5), baseline(), cancel).await;
    assert_eq!(loaded.outcome, LoadOutcome::IncomingOnly);
    assert_eq!(loaded.warnings, vec![GatewayWarning::Cancelled]);
    assert_eq!(loaded.config.api_key.expose(), "k");
}

#[tokio::test]
async fn already_cancelled_call_skips_the_store() {
    let gateway = gateway_over(Arc::new(UnavailableStore), Duration::from_secs(2));
    let loaded = gateway.reconcile_at(tenant(5), baseline(), now(), std::future::ready(())).await;
    assert_eq!(loaded.warnings, vec![GatewayWarning::Cancelled]);
}

#[tokio::test]
async fn corrupt_row_uses_salvaged_record() {
    let salvaged = PersistedSettingsRecord {
        json_data: br#"{"bucketName":"kept"}"#.to_vec(),
        secure_data: SecretMap::new(),
        updated_at: Some(at(T0)),
        provisioned: None,
    };
    let gateway = gateway_over(Arc::new(CorruptStore(Some(salvaged))), Duration::from_secs(2));
    let loaded = gateway.reconcile_at(tenant(5), baseline(), now(), never()).await;
    assert_eq!(loaded.outcome, LoadOutcome::Salvaged);
    assert!(!loaded.persisted);
    assert_eq!(loaded.config.storage.bucket, "kept");
    assert!(matches!(loaded.warnings.as_slice(), [GatewayWarning::ConfigDecode(_)]));
}

#[tokio::test]
async fn unsalvageable_row_uses_empty_defaults() {
    let gateway = gateway_over(Arc::new(CorruptStore(None)), Duration::from_secs(2));
    let loaded = gateway.reconcile_at(tenant(5), baseline(), now(), never()).await;
    assert_eq!(loaded.outcome, LoadOutcome::Salvaged);
    assert_eq!(loaded.effective, SettingsPayload::default());
    assert!(loaded.config.storage.bucket.is_empty());
}

#[tokio::test]
async fn lost_write_race_is_reported() {
    let stored = PersistedSettingsRecord {
        json_data: br#"{"bucketName":"b"}"#.to_vec(),
        secure_data: SecretMap::new(),
        updated_at: Some(at(T0)),
        provisioned: None,
    };
    let gateway = gateway_over(Arc::new(RacingStore(stored)), Duration::from_secs(2));
    let edit = payload(r#"{"bucketName":"b2"}"#, &[], Some(T1));
    let loaded = gateway.reconcile_at(tenant(5), edit, now(), never()).await;
    assert_eq!(loaded.outcome, LoadOutcome::Reconciled(ReconcileOutcome::Updated));
    assert!(!loaded.persisted);
    assert_eq!(loaded.config.storage.bucket, "b2");
    assert!(matches!(loaded.warnings.as_slice(), [GatewayWarning::StaleWrite(_)]));
}

#[tokio::test]
async fn malformed_settings_json_uses_defaults_with_secrets() {
    let gateway = gateway_over(Arc::new(InMemorySettingsStore::new()), Duration::from_secs(2));
    let incoming = payload("{bad json", &[("gcsServiceAccount", "{}")], Some(T0));
    let loaded = gateway.reconcile_at(tenant(5), incoming, now(), never()).await;
    assert!(loaded.config.storage.bucket.is_empty());
    assert!(loaded.config.storage.has_credentials());
    assert!(matches!(loaded.warnings.as_slice(), [GatewayWarning::SettingsDecode(_)]));
}

// ============================================================================
// SECTION: Health
// ============================================================================

#[tokio::test]
async fn health_report_carries_gateway_warnings() {
    let gateway = gateway_over(Arc::new(UnavailableStore), Duration::from_secs(2));
    let loaded = gateway.reconcile_at(tenant(5), baseline(), now(), never()).await;
    let report = HealthReport::from_loaded(&loaded, false);
    assert_eq!(report.status, HealthStatus::PartiallyConfigured);
    assert_eq!(report.message, "storage service account not configured");
    assert_eq!(report.warnings, vec!["settings store unavailable: store not initialized".to_string()]);
}
