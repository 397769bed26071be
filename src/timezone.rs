//! US/Eastern clock helpers
//!
//! All "now" and "today" semantics are anchored to the library's local
//! time zone regardless of where the proxy runs.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Time zone every "today"/"now" decision is made in
pub const LIBRARY_TZ: Tz = chrono_tz::US::Eastern;

/// Current wall-clock time in US/Eastern
#[must_use]
pub fn now() -> DateTime<Tz> {
    Utc::now().with_timezone(&LIBRARY_TZ)
}

/// Calendar date of `at` in US/Eastern, formatted `YYYY-MM-DD`
#[must_use]
pub fn date_string<Z: TimeZone>(at: &DateTime<Z>) -> String {
    at.with_timezone(&LIBRARY_TZ).format("%Y-%m-%d").to_string()
}

/// Today's date in US/Eastern, formatted `YYYY-MM-DD`
#[must_use]
pub fn today() -> String {
    date_string(&now())
}

/// Parse an upstream ISO-8601 timestamp.
///
/// Offsets are honoured; naive values are read as US/Eastern wall clock.
/// Returns `None` for anything unparseable or for a wall-clock time that
/// does not exist in US/Eastern (spring-forward gap).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::<FixedOffset>::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(at) = DateTime::<FixedOffset>::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(at.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| LIBRARY_TZ.from_local_datetime(&naive).earliest())
        .map(|at| at.with_timezone(&Utc))
}
