// crates/assetlog-config/src/lib.rs
// ============================================================================
// Module: Assetlog Config Library
// Description: Service configuration model and validation.
// Purpose: Single source of truth for assetlog.toml semantics.
// Dependencies: assetlog-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `assetlog-config` defines the configuration for the settings service: the
//! `SQLite` store location and tuning, the gateway I/O budget, the local
//! storage override, and the log filter. Loading is strict and fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
