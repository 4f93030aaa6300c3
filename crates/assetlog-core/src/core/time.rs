// crates/assetlog-core/src/core/time.rs
// ============================================================================
// Module: Assetlog Time Model
// Description: Settings timestamps with a single canonical text form.
// Purpose: Persist and compare last-updated markers without precision loss.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! Settings timestamps are stored as fixed-precision UTC text
//! (`YYYY-MM-DDTHH:MM:SS.nnnnnnnnnZ`). The form sorts lexicographically in
//! time order, so the durable store can compare it inside SQL, and it
//! round-trips exactly. Parsing accepts any RFC 3339 value so rows written
//! with shorter fractions or explicit offsets still load.
//!
//! The core never reads wall-clock time; callers supply "now" explicitly.
//! Values at or before the Unix epoch are treated as unset, matching hosts
//! that send a zero time when they have no update marker.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest year representable in the canonical four-digit form.
const MAX_CANONICAL_YEAR: i32 = 9999;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp parsing and construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// Input text was empty.
    #[error("timestamp is empty")]
    Empty,
    /// Input text is not RFC 3339.
    #[error("invalid timestamp: {0}")]
    Invalid(String),
    /// Value falls outside the four-digit year range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// UTC settings timestamp with nanosecond precision.
///
/// # Invariants
/// - Always stored in UTC.
/// - Year is within `0 ..= 9999` so the canonical text stays fixed-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Builds a timestamp from any offset date-time, normalizing to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::OutOfRange`] when the year is outside
    /// `0 ..= 9999`.
    pub fn from_offset_date_time(value: OffsetDateTime) -> Result<Self, TimestampError> {
        let utc = value.to_offset(UtcOffset::UTC);
        if !(0 ..= MAX_CANONICAL_YEAR).contains(&utc.year()) {
            return Err(TimestampError::OutOfRange(format!("year {}", utc.year())));
        }
        Ok(Self(utc))
    }

    /// Builds a timestamp from Unix epoch nanoseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::OutOfRange`] when the value cannot be
    /// represented.
    pub fn from_unix_nanos(nanos: i128) -> Result<Self, TimestampError> {
        let value = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| TimestampError::OutOfRange(err.to_string()))?;
        Self::from_offset_date_time(value)
    }

    /// Parses an RFC 3339 timestamp (any fraction length, any offset).
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when the text is empty, malformed, or out
    /// of range.
    pub fn parse(text: &str) -> Result<Self, TimestampError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TimestampError::Empty);
        }
        let value = OffsetDateTime::parse(trimmed, &Rfc3339)
            .map_err(|err| TimestampError::Invalid(format!("{trimmed}: {err}")))?;
        Self::from_offset_date_time(value)
    }

    /// Returns the canonical fixed-precision UTC text form.
    #[must_use]
    pub fn to_canonical_string(self) -> String {
        let value = self.0;
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}Z",
            value.year(),
            u8::from(value.month()),
            value.day(),
            value.hour(),
            value.minute(),
            value.second(),
            value.nanosecond()
        )
    }

    /// Returns true when the timestamp is at or before the Unix epoch.
    #[must_use]
    pub fn is_unset(self) -> bool {
        self.0 <= OffsetDateTime::UNIX_EPOCH
    }

    /// Returns the timestamp as Unix epoch nanoseconds.
    #[must_use]
    pub fn unix_nanos(self) -> i128 {
        self.0.unix_timestamp_nanos()
    }

    /// Returns the underlying UTC date-time.
    #[must_use]
    pub const fn as_offset_date_time(self) -> OffsetDateTime {
        self.0
    }

    /// Filters out unset timestamps.
    #[must_use]
    pub fn usable(value: Option<Self>) -> Option<Self> {
        value.filter(|timestamp| !timestamp.is_unset())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
