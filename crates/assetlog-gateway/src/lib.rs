// crates/assetlog-gateway/src/lib.rs
// ============================================================================
// Module: Assetlog Gateway Library
// Description: Per-instantiation settings facade and request tenant resolution.
// Purpose: Turn host-supplied settings into a TenantConfig without ever failing startup.
// Dependencies: assetlog-core, base64, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! The gateway loads the tenant's persisted settings, reconciles them with
//! what the host supplied, writes back when warranted, and derives the
//! [`assetlog_core::TenantConfig`]. Store trouble of any kind (unavailable,
//! slow, corrupt, cancelled) degrades to warnings rather than errors.
//! The tenant resolver picks the tenant key for each request and is the
//! only component here that rejects input.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod gateway;
pub mod health;
pub mod tenant;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use gateway::GatewayWarning;
pub use gateway::LoadOutcome;
pub use gateway::LoadedSettings;
pub use gateway::SettingsGateway;
pub use health::HealthReport;
pub use health::HealthStatus;
pub use tenant::RequestContext;
pub use tenant::TenantError;
pub use tenant::resolve_tenant;
pub use tenant::tenant_from_token;
