//! Expiration date parsing.
//!
//! Registries publish expiry either as a full RFC3339 timestamp or as a bare
//! calendar date. The precise form is tried first.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::WatchError;

const DATE_ONLY: &str = "%Y-%m-%d";

/// Parse a WHOIS expiration field into an instant.
///
/// Accepts strict RFC3339 (`2027-08-13T04:00:00Z`, offsets and fractional
/// seconds included) or a date-only `YYYY-MM-DD`, which means midnight UTC.
/// The date and time must be separated by an uppercase `T`.
pub fn parse_expiration(raw: &str) -> Result<DateTime<Utc>, WatchError> {
    let raw = raw.trim();

    // chrono also takes ' ' and 't' as the separator
    if raw.as_bytes().get(10) == Some(&b'T') {
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
            return Ok(timestamp.with_timezone(&Utc));
        }
    }

    NaiveDate::parse_from_str(raw, DATE_ONLY)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| {
            WatchError::parse_with_content(
                format!("unrecognised expiration date format '{}'", raw),
                raw,
            )
        })
}
