//! Read-through LibApps service
//!
//! Resolves site names to upstream locations, fetches and caches space
//! listings and opening hours, and produces the aggregate views served by
//! the router. Each query shape has its own [`TtlCache`].

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::availability::{AggregateResult, aggregate};
use crate::cache::{CacheStatsSnapshot, TtlCache};
use crate::config::{CacheConfig, Config, SiteConfig, SitesConfig};
use crate::hours::{HoursSummary, extract_today_hours};
use crate::timezone;
use crate::upstream::{
    AvailabilityMode, Location, ResolvedLocation, UpstreamClient, parse_listing,
};
use crate::{Error, Result};

/// Proxy service shared by all requests
pub struct LibTools {
    upstream: UpstreamClient,
    sites: SitesConfig,
    /// Keyed by lowercased search name; `None` is the full list
    locations: TtlCache<Option<String>, ResolvedLocation>,
    details: TtlCache<(String, AvailabilityMode), Value>,
    hours_today: TtlCache<String, Option<HoursSummary>>,
}

impl LibTools {
    /// Build the service from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let upstream = UpstreamClient::from_config(&config.libapps)?;
        Ok(Self::new(upstream, config.sites.clone(), &config.cache))
    }

    /// Build the service around an existing upstream client
    #[must_use]
    pub fn new(upstream: UpstreamClient, sites: SitesConfig, cache: &CacheConfig) -> Self {
        Self {
            upstream,
            sites,
            locations: TtlCache::from_config(&cache.locations),
            details: TtlCache::from_config(&cache.details),
            hours_today: TtlCache::from_config(&cache.hours_today),
        }
    }

    /// Upstream client
    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    /// Configured sites
    pub fn sites(&self) -> &SitesConfig {
        &self.sites
    }

    fn site(&self, slug: &str) -> Result<&SiteConfig> {
        self.sites
            .iter()
            .find(|s| s.slug == slug)
            .ok_or_else(|| Error::UnknownSite(slug.to_string()))
    }

    /// Resolve a location name (case-insensitive substring), or list all
    /// locations when `name` is `None`
    pub async fn resolve_location(&self, name: Option<&str>) -> Result<ResolvedLocation> {
        let key = name.map(str::to_lowercase);
        if let Some(hit) = self.locations.get(&key) {
            return Ok(hit);
        }

        debug!(location = ?name, "Locations not cached");
        let raw = self.upstream.locations().await?.ok_or(Error::NoResponse)?;
        let locations: Vec<Location> = serde_json::from_value(raw).map_err(|e| {
            warn!(error = %e, "Malformed location list");
            Error::NoResponse
        })?;

        let resolved = match name {
            None => ResolvedLocation::Many(locations),
            Some(fragment) => locations
                .into_iter()
                .find(|l| l.name_matches(fragment))
                .map(ResolvedLocation::Single)
                .ok_or_else(|| Error::LocationNotFound(fragment.to_string()))?,
        };

        self.locations.insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Raw space listing for one location; `None` if upstream sent no JSON
    pub async fn location_details(
        &self,
        location_id: &str,
        mode: AvailabilityMode,
    ) -> Result<Option<Value>> {
        let key = (location_id.to_string(), mode);
        if let Some(hit) = self.details.get(&key) {
            return Ok(Some(hit));
        }

        debug!(location_id = %location_id, %mode, "Space listing not cached");
        let listing = self
            .upstream
            .space_items(location_id, mode, &timezone::today())
            .await?;
        if let Some(ref value) = listing {
            self.details.insert(key, value.clone());
        }
        Ok(listing)
    }

    /// Raw listings for every location matching a site's search name
    pub async fn site_details(&self, slug: &str, mode: AvailabilityMode) -> Result<Vec<Value>> {
        let site = self.site(slug)?;
        let search_name = site
            .search_name
            .as_deref()
            .ok_or_else(|| Error::UnknownSite(format!("{slug} has no space listing")))?;

        let resolved = self.resolve_location(Some(search_name)).await?;
        let mut listings = Vec::new();
        for location_id in resolved.ids() {
            if let Some(listing) = self.location_details(location_id, mode).await? {
                listings.push(listing);
            }
        }
        Ok(listings)
    }

    /// Aggregated next-available summary for a site, evaluated now
    pub async fn site_availability(&self, slug: &str) -> Result<AggregateResult> {
        let listings: Vec<_> = self
            .site_details(slug, AvailabilityMode::Next)
            .await?
            .iter()
            .filter_map(parse_listing)
            .collect();
        Ok(aggregate(&listings, &timezone::now()))
    }

    /// Today's hours for a site; `None` when upstream data is unusable
    pub async fn site_hours_today(&self, slug: &str) -> Result<Option<HoursSummary>> {
        let location_id = self.site(slug)?.hours_location_id.clone();
        if let Some(hit) = self.hours_today.get(&location_id) {
            return Ok(hit);
        }

        debug!(location_id = %location_id, "Hours not cached");
        let today = timezone::today();
        let summary = self
            .upstream
            .hours(&location_id, &today)
            .await?
            .and_then(|raw| extract_today_hours(&raw, &today));

        self.hours_today.insert(location_id, summary.clone());
        Ok(summary)
    }

    /// Statistics of every cache
    pub fn cache_stats(&self) -> CacheReport {
        CacheReport {
            locations: self.locations.stats(),
            details: self.details.stats(),
            hours_today: self.hours_today.stats(),
            token_refreshes: self.upstream.tokens().refresh_count(),
        }
    }
}

/// Cache statistics across the service
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    /// Location lookups
    pub locations: CacheStatsSnapshot,
    /// Space listings
    pub details: CacheStatsSnapshot,
    /// Hours today
    pub hours_today: CacheStatsSnapshot,
    /// Token exchanges attempted
    pub token_refreshes: u64,
}
