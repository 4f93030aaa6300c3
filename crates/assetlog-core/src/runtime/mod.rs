// crates/assetlog-core/src/runtime/mod.rs
// ============================================================================
// Module: Assetlog Runtime
// Description: Reconciliation engine and in-memory store.
// Purpose: Provide the settings decision procedure and a reference store.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime helpers operate on core types. [`reconcile`] is pure; the
//! [`InMemorySettingsStore`] mirrors the durable store's upsert semantics for
//! tests and local tooling.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod reconcile;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use reconcile::ReconcileOutcome;
pub use reconcile::Reconciliation;
pub use reconcile::build_persisted_record;
pub use reconcile::merge;
pub use reconcile::reconcile;
pub use store::InMemorySettingsStore;
