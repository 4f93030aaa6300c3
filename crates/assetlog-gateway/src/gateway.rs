// crates/assetlog-gateway/src/gateway.rs
// ============================================================================
// Module: Settings Gateway
// Description: Load, reconcile, write back, and derive tenant configuration.
// Purpose: Run once per instantiation without ever blocking or failing startup.
// Dependencies: assetlog-core, time, tokio, tracing
// ============================================================================

//! ## Overview
//! [`SettingsGateway`] is the facade the service calls when the host
//! instantiates it for a tenant. Each store call runs on the blocking pool
//! under the configured I/O timeout and races the caller's cancellation
//! future. Failures never propagate: the gateway falls back to the incoming
//! settings (or to a salvaged record when the stored row is corrupt) and
//! reports what happened as [`GatewayWarning`]s.
//!
//! A blocking store call that times out or is cancelled is detached, not
//! killed; it may still complete in the background. The store's monotonic
//! upsert keeps such late writes from regressing newer data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use assetlog_core::ReconcileOutcome;
use assetlog_core::SaveRequest;
use assetlog_core::SettingsPayload;
use assetlog_core::SettingsStore;
use assetlog_core::SharedSettingsStore;
use assetlog_core::StoreError;
use assetlog_core::TenantConfig;
use assetlog_core::TenantId;
use assetlog_core::Timestamp;
use assetlog_core::reconcile;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Non-fatal conditions collected while loading settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayWarning {
    /// The store could not be read; incoming settings used alone.
    #[error("settings store unavailable: {0}")]
    StoreUnavailable(String),
    /// The write-back failed; effective settings kept in memory only.
    #[error("settings write-back failed: {0}")]
    PersistenceFailed(String),
    /// The stored row could not be decoded.
    #[error("persisted settings could not be decoded: {0}")]
    ConfigDecode(String),
    /// The store refused the write-back because its record is newer.
    #[error("settings write-back skipped, stored record is newer: {0}")]
    StaleWrite(String),
    /// A store call exceeded the I/O timeout.
    #[error("settings store {operation} timed out after {timeout_ms} ms")]
    StoreTimeout {
        /// Store operation that timed out.
        operation: &'static str,
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// The caller cancelled the instantiation.
    #[error("settings reconciliation cancelled; using incoming settings")]
    Cancelled,
    /// The effective JSON blob is malformed; defaults substituted.
    #[error("settings json could not be decoded, using defaults: {0}")]
    SettingsDecode(String),
    /// The system clock could not produce a write timestamp.
    #[error("system clock unusable: {0}")]
    Clock(String),
}

/// How the effective settings were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The reconciliation engine ran against the stored record.
    Reconciled(ReconcileOutcome),
    /// The stored row was corrupt; its decodable fields were used.
    Salvaged,
    /// The store was unusable; incoming settings were used alone.
    IncomingOnly,
}

impl LoadOutcome {
    /// Returns the stable label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reconciled(outcome) => outcome.as_str(),
            Self::Salvaged => "salvaged",
            Self::IncomingOnly => "incoming_only",
        }
    }
}

/// Result of one instantiation.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    /// Derived configuration to run with.
    pub config: TenantConfig,
    /// Effective settings the config was derived from.
    pub effective: SettingsPayload,
    /// How the effective settings were obtained.
    pub outcome: LoadOutcome,
    /// True when a write-back reached the store.
    pub persisted: bool,
    /// Conditions worth logging or surfacing in health checks.
    pub warnings: Vec<GatewayWarning>,
}

/// Store operation labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreOp {
    /// Strict load.
    Load,
    /// Lenient load after a decode failure.
    LoadSalvaged,
    /// Write-back.
    Save,
}

impl StoreOp {
    /// Returns the operation label.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::LoadSalvaged => "load_salvaged",
            Self::Save => "save",
        }
    }
}

/// Failure of a bounded store call.
enum CallError {
    /// The store returned an error.
    Store(StoreError),
    /// The timeout elapsed.
    Timeout,
    /// The blocking task panicked or was cancelled by the runtime.
    Join(String),
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Per-instantiation settings facade over a [`SettingsStore`].
#[derive(Clone)]
pub struct SettingsGateway {
    /// Durable store; `None` when it could not be initialized.
    store: Option<SharedSettingsStore>,
    /// Upper bound for each store call.
    io_timeout: Duration,
}

impl SettingsGateway {
    /// Default store I/O timeout.
    pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(3);

    /// Creates a gateway over `store`.
    #[must_use]
    pub fn new(store: SharedSettingsStore, io_timeout: Duration) -> Self {
        Self {
            store: Some(store),
            io_timeout,
        }
    }

    /// Creates a gateway for a store that failed to initialize.
    ///
    /// Every instantiation degrades to the incoming settings with a
    /// [`GatewayWarning::StoreUnavailable`] warning.
    #[must_use]
    pub const fn unavailable(io_timeout: Duration) -> Self {
        Self {
            store: None,
            io_timeout,
        }
    }

    /// Returns the store I/O timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Reconciles `incoming` for `tenant_id` using the system clock.
    pub async fn reconcile_and_load(
        &self,
        tenant_id: TenantId,
        incoming: SettingsPayload,
    ) -> LoadedSettings {
        self.reconcile_and_load_until(tenant_id, incoming, std::future::pending()).await
    }

    /// Reconciles `incoming`, abandoning store work when `cancel` completes.
    pub async fn reconcile_and_load_until<C>(
        &self,
        tenant_id: TenantId,
        incoming: SettingsPayload,
        cancel: C,
    ) -> LoadedSettings
    where
        C: Future<Output = ()>,
    {
        match Timestamp::from_offset_date_time(OffsetDateTime::now_utc()) {
            Ok(now) => self.reconcile_at(tenant_id, incoming, now, cancel).await,
            Err(err) => finish(
                tenant_id,
                incoming,
                LoadOutcome::IncomingOnly,
                false,
                vec![GatewayWarning::Clock(err.to_string())],
            ),
        }
    }

    /// Reconciles `incoming` with `now` as the fallback write timestamp.
    pub async fn reconcile_at<C>(
        &self,
        tenant_id: TenantId,
        incoming: SettingsPayload,
        now: Timestamp,
        cancel: C,
    ) -> LoadedSettings
    where
        C: Future<Output = ()>,
    {
        let mut cancel = pin!(cancel);
        let mut warnings = Vec::new();

        let loaded = tokio::select! {
            biased;
            () = &mut cancel => {
                warnings.push(GatewayWarning::Cancelled);
                return finish(tenant_id, incoming, LoadOutcome::IncomingOnly, false, warnings);
            }
            loaded = self.call_store(move |store| store.load(tenant_id)) => loaded,
        };
        let persisted = match loaded {
            Ok(record) => record,
            Err(CallError::Store(StoreError::Decode(message))) => {
                warnings.push(GatewayWarning::ConfigDecode(message));
                return self.salvage(tenant_id, incoming, warnings, cancel).await;
            }
            Err(err) => {
                warnings.push(self.warning_for(StoreOp::Load, err));
                return finish(tenant_id, incoming, LoadOutcome::IncomingOnly, false, warnings);
            }
        };

        let result = reconcile(&incoming, persisted.as_ref());
        let mut written = false;
        if let Some(write_back) = result.write_back {
            let request = SaveRequest::new(write_back, persisted, now);
            let saved = tokio::select! {
                biased;
                () = &mut cancel => {
                    warnings.push(GatewayWarning::Cancelled);
                    return finish(tenant_id, incoming, LoadOutcome::IncomingOnly, false, warnings);
                }
                saved = self.call_store(move |store| store.save(tenant_id, &request)) => saved,
            };
            match saved {
                Ok(()) => written = true,
                Err(err) => warnings.push(self.warning_for(StoreOp::Save, err)),
            }
        }
        finish(
            tenant_id,
            result.effective,
            LoadOutcome::Reconciled(result.outcome),
            written,
            warnings,
        )
    }

    /// Falls back to the decodable parts of a corrupt row, else defaults.
    async fn salvage<C>(
        &self,
        tenant_id: TenantId,
        incoming: SettingsPayload,
        mut warnings: Vec<GatewayWarning>,
        cancel: Pin<&mut C>,
    ) -> LoadedSettings
    where
        C: Future<Output = ()>,
    {
        let salvaged = tokio::select! {
            biased;
            () = cancel => {
                warnings.push(GatewayWarning::Cancelled);
                return finish(tenant_id, incoming, LoadOutcome::IncomingOnly, false, warnings);
            }
            salvaged = self.call_store(move |store| store.load_salvaged(tenant_id)) => salvaged,
        };
        let effective = match salvaged {
            Ok(Some(salvaged)) => {
                tracing::warn!(
                    tenant = %tenant_id,
                    dropped = %salvaged.dropped.join(","),
                    "using salvaged settings record"
                );
                salvaged.record.to_payload()
            }
            Ok(None) => SettingsPayload::default(),
            Err(err) => {
                warnings.push(self.warning_for(StoreOp::LoadSalvaged, err));
                SettingsPayload::default()
            }
        };
        finish(tenant_id, effective, LoadOutcome::Salvaged, false, warnings)
    }

    /// Runs a store call on the blocking pool under the I/O timeout.
    async fn call_store<T, F>(&self, call: F) -> Result<T, CallError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SettingsStore) -> Result<T, StoreError> + Send + 'static,
    {
        let Some(store) = self.store.as_ref().map(Arc::clone) else {
            return Err(CallError::Store(StoreError::Unavailable(
                "settings store not initialized".to_string(),
            )));
        };
        let task = tokio::task::spawn_blocking(move || call(store.as_ref()));
        match tokio::time::timeout(self.io_timeout, task).await {
            Err(_) => Err(CallError::Timeout),
            Ok(Err(err)) => Err(CallError::Join(err.to_string())),
            Ok(Ok(result)) => result.map_err(CallError::Store),
        }
    }

    /// Maps a failed store call to a warning.
    fn warning_for(&self, operation: StoreOp, error: CallError) -> GatewayWarning {
        match error {
            CallError::Timeout => GatewayWarning::StoreTimeout {
                operation: operation.as_str(),
                timeout_ms: u64::try_from(self.io_timeout.as_millis()).unwrap_or(u64::MAX),
            },
            CallError::Join(message) => GatewayWarning::StoreUnavailable(format!(
                "{} task failed: {message}",
                operation.as_str()
            )),
            CallError::Store(StoreError::Decode(message)) => GatewayWarning::ConfigDecode(message),
            CallError::Store(StoreError::Stale(message)) => GatewayWarning::StaleWrite(message),
            CallError::Store(StoreError::Persistence(message)) => {
                GatewayWarning::PersistenceFailed(message)
            }
            CallError::Store(StoreError::Unavailable(message) | StoreError::Invalid(message)) => {
                if operation == StoreOp::Save {
                    GatewayWarning::PersistenceFailed(message)
                } else {
                    GatewayWarning::StoreUnavailable(message)
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Derives the tenant config and logs the result.
fn finish(
    tenant_id: TenantId,
    effective: SettingsPayload,
    outcome: LoadOutcome,
    persisted: bool,
    mut warnings: Vec<GatewayWarning>,
) -> LoadedSettings {
    let (config, decode_error) = TenantConfig::from_settings_lenient(&effective);
    if let Some(err) = decode_error {
        warnings.push(GatewayWarning::SettingsDecode(err.to_string()));
    }
    for warning in &warnings {
        tracing::warn!(tenant = %tenant_id, warning = %warning, "settings gateway degraded");
    }
    tracing::info!(
        tenant = %tenant_id,
        outcome = outcome.as_str(),
        persisted,
        secret_keys = effective.secrets.len(),
        "tenant settings loaded"
    );
    LoadedSettings {
        config,
        effective,
        outcome,
        persisted,
        warnings,
    }
}
