//! Upstream LibApps data shapes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::Error;

/// A library location from `/space/locations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Upstream location id (`lid`)
    #[serde(rename = "lid", default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Display name, matched case-insensitively
    #[serde(default)]
    pub name: Option<String>,
}

impl Location {
    /// Whether this location's name contains `fragment`, ignoring case
    #[must_use]
    pub fn name_matches(&self, fragment: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(&fragment.to_lowercase()))
    }
}

/// Outcome of resolving a location query, decided once at the API boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLocation {
    /// A name query matched this location
    Single(Location),
    /// The full location list
    Many(Vec<Location>),
}

impl ResolvedLocation {
    /// Location ids in upstream order, skipping entries without one
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::Single(location) => location.id.as_deref().into_iter().collect(),
            Self::Many(locations) => locations.iter().filter_map(|l| l.id.as_deref()).collect(),
        }
    }
}

/// One reservable space from `/space/items/{lid}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceItem {
    /// Space id
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Location the space belongs to
    #[serde(default, alias = "lid", deserialize_with = "string_or_number")]
    pub location_id: Option<String>,
    /// Group (category) the space belongs to
    #[serde(default, deserialize_with = "string_or_number")]
    pub group_id: Option<String>,
    /// Human-readable group name
    #[serde(default)]
    pub group_name: Option<String>,
    /// Open windows; absent when availability wasn't requested
    #[serde(default)]
    pub availability: Option<Vec<AvailabilityWindow>>,
}

/// A `{from, to}` range during which a space can be booked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    /// Start, ISO-8601
    #[serde(default)]
    pub from: Option<String>,
    /// End, ISO-8601
    #[serde(default)]
    pub to: Option<String>,
}

impl AvailabilityWindow {
    /// Create a window from raw timestamps
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }
}

/// Which availability slice `/space/items` should include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AvailabilityMode {
    /// No availability data
    All,
    /// Only each space's next open window
    Next,
    /// Every window for today
    #[default]
    Full,
}

impl AvailabilityMode {
    /// Value of the `availability` query parameter, if any
    #[must_use]
    pub fn query_value(self, today: &str) -> Option<String> {
        match self {
            Self::All => None,
            Self::Next => Some("next_only".to_string()),
            Self::Full => Some(today.to_string()),
        }
    }
}

impl FromStr for AvailabilityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "none" => Ok(Self::All),
            "next" => Ok(Self::Next),
            "full" => Ok(Self::Full),
            _ => Err(Error::InvalidAvailability(s.to_string())),
        }
    }
}

impl fmt::Display for AvailabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Next => "next",
            Self::Full => "full",
        })
    }
}

/// Parse one location's raw listing; `None` if it isn't a list of items
#[must_use]
pub fn parse_listing(listing: &Value) -> Option<Vec<SpaceItem>> {
    match Vec::<SpaceItem>::deserialize(listing) {
        Ok(items) => Some(items),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed space listing");
            None
        }
    }
}

/// Upstream ids arrive as numbers or strings
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}
