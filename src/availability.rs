//! Space availability aggregation
//!
//! Folds per-location space listings into one summary per space group plus
//! overall counters. Listings are grouped by `groupId` but groups are not
//! guaranteed to be contiguous: when a group shows up again after another
//! group's items, accumulation resumes on the existing summary.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};

use crate::timezone::parse_timestamp;
use crate::upstream::{AvailabilityWindow, SpaceItem};

/// Key used for items that arrive before any item names a group
pub const UNGROUPED: &str = "";

/// Per-group availability counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    /// Group display name
    pub name: Option<String>,
    /// Windows open right now
    #[serde(serialize_with = "as_decimal_string")]
    pub available: u64,
    /// Windows seen
    #[serde(serialize_with = "as_decimal_string")]
    pub total: u64,
    /// Earliest window start, as sent by upstream
    pub next_available: Option<String>,
    #[serde(skip)]
    next_available_at: Option<DateTime<Utc>>,
}

impl GroupSummary {
    fn offer_next_available(&mut self, raw: &str, at: DateTime<Utc>) {
        if self.next_available_at.is_none_or(|current| current > at) {
            self.next_available = Some(raw.to_string());
            self.next_available_at = Some(at);
        }
    }
}

/// Aggregated availability for one or more locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    /// Summaries keyed by group id
    #[serde(flatten)]
    pub groups: BTreeMap<String, GroupSummary>,
    /// Sum of `available` over all groups
    pub overall_available: u64,
    /// Sum of `total` over all groups
    pub total: u64,
}

/// `from < now < to`, both bounds exclusive
#[must_use]
pub fn is_currently_available<Z: TimeZone>(
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
    now: &DateTime<Z>,
) -> bool {
    let now = now.with_timezone(&Utc);
    *from < now && now < *to
}

/// Whether a raw upstream window is open at `now`.
///
/// Windows with a missing or unparseable bound are never open.
#[must_use]
pub fn window_is_open<Z: TimeZone>(window: &AvailabilityWindow, now: &DateTime<Z>) -> bool {
    let from = window.from.as_deref().and_then(parse_timestamp);
    let to = window.to.as_deref().and_then(parse_timestamp);
    match (from, to) {
        (Some(from), Some(to)) => is_currently_available(&from, &to, now),
        _ => false,
    }
}

/// Streaming fold over space items.
///
/// `overall_available`/`overall_total` always equal the sums over the
/// stored groups plus the group in progress.
pub struct AvailabilityAggregator {
    now: DateTime<Utc>,
    groups: BTreeMap<String, GroupSummary>,
    current: Option<(String, GroupSummary)>,
    overall_available: u64,
    overall_total: u64,
}

impl AvailabilityAggregator {
    /// Start an empty fold evaluating availability at `now`
    pub fn new<Z: TimeZone>(now: &DateTime<Z>) -> Self {
        Self {
            now: now.with_timezone(&Utc),
            groups: BTreeMap::new(),
            current: None,
            overall_available: 0,
            overall_total: 0,
        }
    }

    /// Fold one item into the summary
    pub fn push(&mut self, item: &SpaceItem) {
        let current_id = self.current.as_ref().map(|(id, _)| id.as_str());
        let switching = match (item.group_id.as_deref(), current_id) {
            (Some(id), Some(current)) => id != current,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if item.group_id.is_none() && self.current.is_none() {
            self.current = Some((UNGROUPED.to_string(), GroupSummary::default()));
        }

        if switching {
            self.flush();
            let id = item.group_id.clone().unwrap_or_default();
            // a group seen earlier picks up where it left off
            let resumed = self.groups.remove(&id).unwrap_or_default();
            self.current = Some((id, resumed));
        }

        let Some((_, summary)) = self.current.as_mut() else {
            return;
        };
        if switching {
            if let Some(ref name) = item.group_name {
                summary.name = Some(name.clone());
            }
        }

        for window in item.availability.iter().flatten() {
            summary.total += 1;
            self.overall_total += 1;

            if window_is_open(window, &self.now) {
                summary.available += 1;
                self.overall_available += 1;
            }

            if let Some(raw) = window.from.as_deref() {
                if let Some(at) = parse_timestamp(raw) {
                    summary.offer_next_available(raw, at);
                }
            }
        }
    }

    /// Running `(overall_available, overall_total)`
    pub fn overall(&self) -> (u64, u64) {
        (self.overall_available, self.overall_total)
    }

    /// Flush the group in progress and return the result
    #[must_use]
    pub fn finish(mut self) -> AggregateResult {
        self.flush();
        AggregateResult {
            groups: self.groups,
            overall_available: self.overall_available,
            total: self.overall_total,
        }
    }

    fn flush(&mut self) {
        if let Some((id, summary)) = self.current.take() {
            self.groups.insert(id, summary);
        }
    }
}

/// Aggregate every location listing at `now`
#[must_use]
pub fn aggregate<Z: TimeZone>(listings: &[Vec<SpaceItem>], now: &DateTime<Z>) -> AggregateResult {
    let mut aggregator = AvailabilityAggregator::new(now);
    for item in listings.iter().flatten() {
        aggregator.push(item);
    }
    aggregator.finish()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_decimal_string<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}
