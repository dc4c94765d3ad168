// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp helpers.
//!
//! Every persisted timestamp is an ISO-8601 UTC string with millisecond
//! precision. The fixed width makes lexicographic comparison on TEXT columns
//! chronological, which the sweep query and the gate's expiry check rely on.

use chrono::{DateTime, Duration, Utc};

use crate::error::MaitredError;

/// Format of every persisted timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC time in the canonical format.
pub fn now_iso() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time shifted by `seconds` (negative values look back).
pub fn now_offset_iso(seconds: i64) -> String {
    (Utc::now() + Duration::seconds(seconds))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Format an instant in the canonical format.
pub fn format_iso(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a canonical timestamp back into an instant.
pub fn parse_iso(ts: &str) -> Result<DateTime<Utc>, MaitredError> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MaitredError::Validation(format!("bad timestamp {ts:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_iso_has_fixed_width_and_parses() {
        let ts = now_iso();
        assert_eq!(ts.len(), 24, "got {ts}");
        assert!(ts.ends_with('Z'));
        parse_iso(&ts).unwrap();
    }

    #[test]
    fn lexicographic_order_matches_chronological_order() {
        let earlier = "2026-03-01T09:59:59.999Z";
        let later = "2026-03-01T10:00:00.000Z";
        assert!(earlier < later);
        assert!(parse_iso(earlier).unwrap() < parse_iso(later).unwrap());
    }

    #[test]
    fn offset_moves_in_both_directions() {
        let past = now_offset_iso(-3600);
        let now = now_iso();
        let future = now_offset_iso(3600);
        assert!(past < now);
        assert!(now < future);
    }

    #[test]
    fn malformed_timestamp_is_a_validation_error() {
        let err = parse_iso("yesterday-ish").unwrap_err();
        assert!(matches!(err, MaitredError::Validation(_)));
    }
}
