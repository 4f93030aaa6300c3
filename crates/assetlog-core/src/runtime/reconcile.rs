// crates/assetlog-core/src/runtime/reconcile.rs
// ============================================================================
// Module: Assetlog Reconciliation Engine
// Description: Decision procedure between host-supplied and persisted settings.
// Purpose: Pick effective settings and the write-back candidate without losing secrets.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The host resupplies settings on every instantiation, sometimes stale,
//! partial, or reset to its static defaults. [`reconcile`] evaluates an
//! ordered decision list (first match wins):
//!
//! 1. No prior record: adopt non-empty incoming settings and write them as
//!    both the live record and the provisioned baseline.
//! 2. Incoming equals the provisioned baseline: the host replayed its
//!    defaults; keep the live record, never write.
//! 3. Incoming is empty: keep the live record.
//! 4. Incoming timestamp is missing/zero: keep the live record.
//! 5. Incoming is not strictly newer: keep the live record.
//! 6. Newer and the merge changes something: write the merged settings.
//! 7. Newer but the merge changes nothing: keep the live record.
//!
//! Whenever the live record is kept but carries no content while incoming
//! does, incoming is used for this run without a write (fallback).
//!
//! [`build_persisted_record`] derives the durable row for a write-back:
//! canonical JSON, sticky secrets, and a baseline that is recorded once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::PersistedSettingsRecord;
use crate::core::ProvisionedBaseline;
use crate::core::SaveRequest;
use crate::core::SettingsPayload;
use crate::core::Timestamp;
use crate::core::canonicalize_json;
use crate::core::json_equal;
use crate::core::json_is_blank;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Which reconciliation rule produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileOutcome {
    /// No prior record; incoming settings adopted and written.
    FirstPersist,
    /// No prior record and nothing to store.
    NothingToPersist,
    /// Incoming settings replay the provisioned baseline.
    ProvisionedReplay,
    /// Incoming settings carry no fields.
    EmptyIncoming,
    /// Incoming settings have no usable timestamp.
    AmbiguousTimestamp,
    /// Incoming settings are not newer than the live record.
    Stale,
    /// Incoming settings are newer but change nothing after merging.
    Unchanged,
    /// Incoming settings are a genuine update; merged result written.
    Updated,
    /// Live record is empty; incoming settings used without a write.
    Fallback,
}

impl ReconcileOutcome {
    /// Returns the stable label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstPersist => "first_persist",
            Self::NothingToPersist => "nothing_to_persist",
            Self::ProvisionedReplay => "provisioned_replay",
            Self::EmptyIncoming => "empty_incoming",
            Self::AmbiguousTimestamp => "ambiguous_timestamp",
            Self::Stale => "stale",
            Self::Unchanged => "unchanged",
            Self::Updated => "updated",
            Self::Fallback => "fallback",
        }
    }
}

/// Result of reconciling one instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Settings to run with for this instantiation.
    pub effective: SettingsPayload,
    /// Settings to persist, when a write is warranted.
    pub write_back: Option<SettingsPayload>,
    /// Rule that matched.
    pub outcome: ReconcileOutcome,
}

// ============================================================================
// SECTION: Reconciliation
// ============================================================================

/// Reconciles incoming host settings against the persisted record.
#[must_use]
pub fn reconcile(
    incoming: &SettingsPayload,
    persisted: Option<&PersistedSettingsRecord>,
) -> Reconciliation {
    let Some(persisted) = persisted else {
        return first_run(incoming);
    };
    if is_provisioned_replay(incoming, persisted) {
        return keep_persisted(incoming, persisted, ReconcileOutcome::ProvisionedReplay);
    }
    if !incoming.has_content() {
        return keep_persisted(incoming, persisted, ReconcileOutcome::EmptyIncoming);
    }
    let Some(incoming_at) = Timestamp::usable(incoming.updated_at) else {
        return keep_persisted(incoming, persisted, ReconcileOutcome::AmbiguousTimestamp);
    };
    if Timestamp::usable(persisted.updated_at).is_some_and(|persisted_at| incoming_at <= persisted_at) {
        return keep_persisted(incoming, persisted, ReconcileOutcome::Stale);
    }
    let merged = merge(incoming, persisted);
    if same_content(&merged, persisted) {
        return keep_persisted(incoming, persisted, ReconcileOutcome::Unchanged);
    }
    Reconciliation {
        effective: merged.clone(),
        write_back: Some(merged),
        outcome: ReconcileOutcome::Updated,
    }
}

/// Merges a genuine update onto the persisted record.
///
/// Non-secret JSON from `incoming` wins unless it is blank. Secrets from
/// `incoming` win when non-blank; absent or blank secrets keep the persisted
/// value. When incoming secrets are exactly the baseline's while the live
/// secrets were edited away from it, the live secrets are kept whole.
#[must_use]
pub fn merge(incoming: &SettingsPayload, persisted: &PersistedSettingsRecord) -> SettingsPayload {
    let json_data = if json_is_blank(&incoming.json_data) {
        persisted.json_data.clone()
    } else {
        incoming.json_data.clone()
    };
    let replayed_baseline_secrets = persisted.recorded_baseline().is_some_and(|baseline| {
        !baseline.secure_data.is_empty()
            && incoming.secrets.same_as(&baseline.secure_data)
            && !persisted.secure_data.same_as(&baseline.secure_data)
    });
    let secrets = if incoming.secrets.is_empty() || replayed_baseline_secrets {
        persisted.secure_data.clone()
    } else {
        let mut secrets = incoming.secrets.clone();
        secrets.retain_sticky_from(&persisted.secure_data);
        secrets
    };
    SettingsPayload {
        json_data,
        secrets,
        updated_at: Timestamp::usable(incoming.updated_at),
    }
}

/// Derives the durable record for a write-back.
///
/// The candidate's timestamp is used when usable, otherwise `saved_at`.
/// Secrets present in the previous record survive when the candidate omits
/// or blanks them. The baseline is an explicit override when given, else the
/// recorded one, else the previous live record, else the candidate itself.
#[must_use]
pub fn build_persisted_record(request: &SaveRequest) -> PersistedSettingsRecord {
    let candidate = &request.candidate;
    let updated_at = Timestamp::usable(candidate.updated_at).unwrap_or(request.saved_at);
    let json_data = canonicalize_json(&candidate.json_data);
    let mut secure_data = candidate.secrets.clone();
    if let Some(previous) = &request.previous {
        secure_data.retain_sticky_from(&previous.secure_data);
    }
    let provisioned = match (&request.provisioned_override, &request.previous) {
        (Some(baseline), _) => ProvisionedBaseline {
            json_data: canonicalize_json(&baseline.json_data),
            secure_data: baseline.secure_data.clone(),
            updated_at: baseline.updated_at,
        },
        (None, Some(previous)) => previous.recorded_baseline().cloned().unwrap_or_else(|| {
            ProvisionedBaseline {
                json_data: canonicalize_json(&previous.json_data),
                secure_data: previous.secure_data.clone(),
                updated_at: previous.updated_at,
            }
        }),
        (None, None) => ProvisionedBaseline {
            json_data: json_data.clone(),
            secure_data: secure_data.clone(),
            updated_at: Some(updated_at),
        },
    };
    PersistedSettingsRecord {
        json_data,
        secure_data,
        updated_at: Some(updated_at),
        provisioned: Some(provisioned),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Handles the no-prior-record case.
fn first_run(incoming: &SettingsPayload) -> Reconciliation {
    if incoming.has_content() {
        return Reconciliation {
            effective: incoming.clone(),
            write_back: Some(incoming.clone()),
            outcome: ReconcileOutcome::FirstPersist,
        };
    }
    Reconciliation {
        effective: SettingsPayload::default(),
        write_back: None,
        outcome: ReconcileOutcome::NothingToPersist,
    }
}

/// Keeps the live record, falling back to incoming when the record is empty.
fn keep_persisted(
    incoming: &SettingsPayload,
    persisted: &PersistedSettingsRecord,
    outcome: ReconcileOutcome,
) -> Reconciliation {
    if !persisted.has_content() && incoming.has_content() {
        return Reconciliation {
            effective: incoming.clone(),
            write_back: None,
            outcome: ReconcileOutcome::Fallback,
        };
    }
    Reconciliation {
        effective: persisted.to_payload(),
        write_back: None,
        outcome,
    }
}

/// Returns true when incoming settings equal the recorded baseline.
fn is_provisioned_replay(incoming: &SettingsPayload, persisted: &PersistedSettingsRecord) -> bool {
    persisted.recorded_baseline().is_some_and(|baseline| {
        json_equal(&incoming.json_data, &baseline.json_data)
            && incoming.secrets.same_as(&baseline.secure_data)
    })
}

/// Returns true when merged settings match the live record.
fn same_content(merged: &SettingsPayload, persisted: &PersistedSettingsRecord) -> bool {
    json_equal(&merged.json_data, &persisted.json_data)
        && merged.secrets.same_as(&persisted.secure_data)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
