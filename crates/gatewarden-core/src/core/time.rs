// gatewarden-core/src/core/time.rs
// ============================================================================
// Module: Timestamp
// Description: RFC-3339 UTC timestamps at second precision.
// Purpose: Keep wall-clock reads out of deterministic code paths — the
//          core never calls `OffsetDateTime::now_utc()` itself; callers
//          (HTTP handlers, orchestrator activities) supply the time.
// Dependencies: time::OffsetDateTime, time::format_description::well_known::Rfc3339
// ============================================================================

//! ## Overview
//! Every timestamp that enters a [`crate::core::artifact::CommitmentArtifact`]
//! or [`crate::core::model::Instance`] is an explicit argument, never an
//! ambient clock read. This keeps state-machine transitions and artifact
//! construction safe to call from deterministic workflow replay.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// An RFC-3339 UTC timestamp, truncated to second precision.
///
/// # Invariants
/// - Always renders with a `Z` UTC offset.
/// - Sub-second precision is discarded on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "timestamp_rfc3339")] OffsetDateTime);

impl Timestamp {
    /// Builds a timestamp from an explicit `OffsetDateTime`, truncating to
    /// second precision.
    #[must_use]
    pub fn from_offset_date_time(value: OffsetDateTime) -> Self {
        let truncated = value.replace_nanosecond(0).unwrap_or(value);
        Self(truncated)
    }

    /// Parses an RFC-3339 string.
    ///
    /// # Errors
    /// Returns an error if `value` is not a valid RFC-3339 timestamp.
    pub fn parse(value: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(value, &Rfc3339).map(Self::from_offset_date_time)
    }

    /// Renders this timestamp as an RFC-3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_owned())
    }

    /// The underlying `OffsetDateTime`.
    #[must_use]
    pub const fn as_offset_date_time(&self) -> OffsetDateTime {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

mod timestamp_rfc3339 {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rendered = value
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&rendered)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
    }
}
