// crates/assetlog-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Settings Store
// Description: Durable SettingsStore backend using SQLite WAL.
// Purpose: Provide production-grade persistence for tenant settings.
// Dependencies: assetlog-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`SettingsStore`] implementation that
//! keeps exactly one settings row per tenant. Writes are single-statement
//! upserts guarded against timestamp regression, so concurrent instantiations
//! for different tenants never interfere. Security posture: stored rows are
//! untrusted input and are decoded defensively.
//!
//! [`SettingsStore`]: assetlog_core::SettingsStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SCHEMA_VERSION;
pub use store::SqliteSettingsStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
