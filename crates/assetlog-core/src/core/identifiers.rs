// crates/assetlog-core/src/core/identifiers.rs
// ============================================================================
// Module: Assetlog Identifiers
// Description: Tenant identifier used to key persisted settings.
// Purpose: Provide a strongly typed, non-zero tenant key with a stable wire form.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Tenants are host organizations. The host numbers them from 1; an org id of
//! zero means "no tenant" and can never be constructed as a [`TenantId`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Tenant (organization) identifier.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(NonZeroU64);

impl TenantId {
    /// Creates a new tenant identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a tenant identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Error returned when a tenant identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTenantIdError {
    /// The text is not a base-10 unsigned integer.
    #[error("tenant id is not a number: {0}")]
    NotNumeric(String),
    /// The value is zero.
    #[error("tenant id must be non-zero")]
    Zero,
}

impl FromStr for TenantId {
    type Err = ParseTenantIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let raw: u64 =
            trimmed.parse().map_err(|_| ParseTenantIdError::NotNumeric(trimmed.to_string()))?;
        Self::from_raw(raw).ok_or(ParseTenantIdError::Zero)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]

    use super::ParseTenantIdError;
    use super::TenantId;

    #[test]
    fn parse_accepts_trimmed_numbers() {
        let tenant: TenantId = " 42 ".parse().unwrap();
        assert_eq!(tenant.get(), 42);
        assert_eq!(tenant.to_string(), "42");
    }

    #[test]
    fn parse_rejects_zero_and_text() {
        assert_eq!("0".parse::<TenantId>(), Err(ParseTenantIdError::Zero));
        assert!(matches!("org-1".parse::<TenantId>(), Err(ParseTenantIdError::NotNumeric(_))));
        assert!(matches!("-5".parse::<TenantId>(), Err(ParseTenantIdError::NotNumeric(_))));
    }
}
