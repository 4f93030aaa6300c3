// crates/assetlog-core/src/core/mod.rs
// ============================================================================
// Module: Assetlog Core Types
// Description: Identifiers, timestamps, settings records, and derived config.
// Purpose: Provide stable, serializable types shared by stores and the gateway.
// Dependencies: serde, serde_json, serde_jcs, time
// ============================================================================

//! ## Overview
//! Core types describe the settings a host hands in, the record kept in
//! durable storage, and the [`TenantConfig`] the rest of the service runs
//! with. They are the single source of truth for every outer surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod canonical;
pub mod identifiers;
pub mod settings;
pub mod tenant_config;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use canonical::canonicalize_json;
pub use canonical::json_equal;
pub use canonical::json_is_blank;
pub use canonical::maps_equal;
pub use identifiers::ParseTenantIdError;
pub use identifiers::TenantId;
pub use settings::PersistedSettingsRecord;
pub use settings::ProvisionedBaseline;
pub use settings::SaveRequest;
pub use settings::SecretMap;
pub use settings::SecretValue;
pub use settings::SettingsPayload;
pub use tenant_config::API_KEY_SECRET;
pub use tenant_config::BYTES_PER_MEGABYTE;
pub use tenant_config::DEFAULT_MAX_UPLOAD_SIZE_MB;
pub use tenant_config::MAX_ALLOWED_UPLOAD_SIZE_MB;
pub use tenant_config::SERVICE_ACCOUNT_SECRET;
pub use tenant_config::StorageConfig;
pub use tenant_config::TenantConfig;
pub use tenant_config::TenantConfigError;
pub use tenant_config::clamp_upload_size_mb;
pub use time::Timestamp;
pub use time::TimestampError;
