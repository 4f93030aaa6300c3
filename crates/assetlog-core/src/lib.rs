// crates/assetlog-core/src/lib.rs
// ============================================================================
// Module: Assetlog Core Library
// Description: Public API surface for tenant settings reconciliation.
// Purpose: Expose settings types, canonicalization, reconciliation, and store interfaces.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Assetlog core decides, for every host-triggered instantiation, which tenant
//! configuration to run with and what (if anything) to write back to durable
//! storage. It is backend-agnostic: persistence plugs in through
//! [`SettingsStore`], and the core never performs I/O or reads the wall clock.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::SalvagedRecord;
pub use interfaces::SettingsStore;
pub use interfaces::SharedSettingsStore;
pub use interfaces::StoreError;
pub use runtime::InMemorySettingsStore;
pub use runtime::ReconcileOutcome;
pub use runtime::Reconciliation;
pub use runtime::build_persisted_record;
pub use runtime::merge;
pub use runtime::reconcile;
