//! Today's opening hours from a raw `/hours/{lid}` response

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Status and last listed hour block for one date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursSummary {
    /// Upstream status, e.g. `open`, `closed`, `24hours`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Opening time of the last listed block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_from: Option<String>,
    /// Closing time of the last listed block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HoursRecord {
    #[serde(default, deserialize_with = "map_or_empty")]
    dates: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DateHours {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    hours: Option<Vec<HourBlock>>,
}

#[derive(Debug, Deserialize)]
struct HourBlock {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
}

/// Extract `today`'s status and hours from an hours response.
///
/// When a date lists several blocks the last one wins. A null or malformed
/// record, or a malformed entry for `today`, makes the whole result `None`.
/// Entries for other dates are never inspected. No matching date yields an
/// empty summary.
#[must_use]
pub fn extract_today_hours(response: &Value, today: &str) -> Option<HoursSummary> {
    let Value::Array(records) = response else {
        tracing::warn!("Hours response is not a list");
        return None;
    };

    let mut summary = HoursSummary::default();
    for record in records {
        if record.is_null() {
            return None;
        }
        let record: HoursRecord = match HoursRecord::deserialize(record) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed hours record");
                return None;
            }
        };

        let Some(date) = record.dates.get(today) else {
            continue;
        };
        let date = match DateHours::deserialize(date) {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!(error = %e, date = %today, "Malformed hours entry");
                return None;
            }
        };
        if let Some(ref status) = date.status {
            summary.status = Some(match status {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        for block in date.hours.iter().flatten() {
            if let Some(ref from) = block.from {
                summary.hours_from = Some(from.clone());
            }
            if let Some(ref to) = block.to {
                summary.hours_to = Some(to.clone());
            }
        }
    }

    Some(summary)
}

/// Upstream sends `[]` instead of `{}` for a record without dates
fn map_or_empty<'de, D>(deserializer: D) -> Result<HashMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Array(items) if items.is_empty() => Ok(HashMap::new()),
        Value::Null => Ok(HashMap::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected dates object, found {other}"
        ))),
    }
}
