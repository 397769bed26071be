//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variables holding the upstream credentials
pub const ENV_BASE: &str = "LIBAPPS_BASE";
/// Environment variable holding the OAuth client id
pub const ENV_CLIENT: &str = "LIBAPPS_CLIENT";
/// Environment variable holding the OAuth client secret
pub const ENV_SECRET: &str = "LIBAPPS_SECRET";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before reading the environment.
    /// Paths support ~ expansion. `.env` in the working directory is always tried.
    pub env_files: Vec<String>,
    /// Outward server configuration
    pub server: ServerConfig,
    /// Upstream LibApps configuration
    pub libapps: LibAppsConfig,
    /// Per-query-shape cache configuration
    pub cache: CacheConfig,
    /// Library sites served under the mount path
    pub sites: SitesConfig,
}

impl Config {
    /// Load configuration from an optional YAML file plus the environment
    ///
    /// Order: YAML file, then `LIBAPPS_BASE`/`LIBAPPS_CLIENT`/`LIBAPPS_SECRET`,
    /// then `LIBTOOLS_*` variables (`__` separates nested keys).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Self::file_figment(path)?;

        // Env files must land in the process environment before it is read
        let mut env_files = vec![".env".to_string()];
        env_files.extend(
            figment
                .extract_inner::<Vec<String>>("env_files")
                .unwrap_or_default(),
        );
        load_env_files(&env_files);

        figment = figment
            .merge(
                Env::raw()
                    .only(&[ENV_BASE, ENV_CLIENT, ENV_SECRET])
                    .map(|key| {
                        let field = match key.as_str().to_ascii_uppercase().as_str() {
                            ENV_BASE => "base_url",
                            ENV_CLIENT => "client_id",
                            _ => "client_secret",
                        };
                        format!("libapps.{field}").into()
                    }),
            )
            .merge(Env::prefixed("LIBTOOLS_").split("__"));

        Self::from_figment(&figment)
    }

    /// Figment holding only the YAML file, if one is given
    pub fn file_figment(path: Option<&Path>) -> Result<Figment> {
        let Some(p) = path else {
            return Ok(Figment::new());
        };
        if !p.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        Ok(Figment::new().merge(Yaml::file(p)))
    }

    /// Extract and validate configuration from an assembled figment
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check required values; any missing credential is fatal
    pub fn validate(&self) -> Result<()> {
        for (value, name) in [
            (&self.libapps.base_url, ENV_BASE),
            (&self.libapps.client_id, ENV_CLIENT),
            (&self.libapps.client_secret, ENV_SECRET),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Missing environment variable: {name}"
                )));
            }
        }

        url::Url::parse(&self.libapps.base_url)
            .map_err(|e| Error::Config(format!("Invalid {ENV_BASE}: {e}")))?;

        if !self.server.mount_path.starts_with('/') {
            return Err(Error::Config(format!(
                "Mount path must start with '/': {}",
                self.server.mount_path
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for site in &self.sites.0 {
            if !seen.insert(site.slug.as_str()) {
                return Err(Error::Config(format!("Duplicate site: {}", site.slug)));
            }
        }

        Ok(())
    }

    /// Look up a site by its route slug
    #[must_use]
    pub fn site(&self, slug: &str) -> Option<&SiteConfig> {
        self.sites.0.iter().find(|s| s.slug == slug)
    }
}

/// Load environment files into the process environment.
/// Supports ~ expansion. Files that don't exist are silently skipped.
fn load_env_files(paths: &[String]) {
    for path_str in paths {
        let expanded = if path_str.starts_with('~') {
            if let Some(home) = dirs::home_dir() {
                path_str.replacen('~', &home.display().to_string(), 1)
            } else {
                path_str.clone()
            }
        } else {
            path_str.clone()
        };

        let path = Path::new(&expanded);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
            }
        } else {
            tracing::debug!("Env file not found (skipped): {expanded}");
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Path the site routes are mounted under
    pub mount_path: String,
    /// Outward request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            mount_path: "/api/libtools".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Upstream LibApps configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibAppsConfig {
    /// API base URL (`LIBAPPS_BASE`)
    pub base_url: String,
    /// OAuth client id (`LIBAPPS_CLIENT`)
    pub client_id: String,
    /// OAuth client secret (`LIBAPPS_SECRET`)
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Per-request timeout for upstream calls
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// How long an access token is reused. Kept below the upstream
    /// lifetime so tokens are refreshed early.
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
}

impl Default for LibAppsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout: Duration::from_secs(10),
            token_ttl: Duration::from_secs(3500),
        }
    }
}

/// Cache configuration, one entry per upstream query shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Location list and name lookups
    pub locations: CacheEntryConfig,
    /// Per-location space listings
    pub details: CacheEntryConfig,
    /// Per-location hours for today
    pub hours_today: CacheEntryConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            locations: CacheEntryConfig::new(32, Duration::from_secs(3600)),
            details: CacheEntryConfig::new(32, Duration::from_secs(60)),
            hours_today: CacheEntryConfig::new(32, Duration::from_secs(360)),
        }
    }
}

/// Capacity and freshness window of a single cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryConfig {
    /// Maximum number of entries
    pub capacity: usize,
    /// Time-to-live of each entry
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl CacheEntryConfig {
    /// Create a cache entry configuration
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl }
    }
}

/// A library site exposed as `{mount_path}/{slug}/...`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Route segment, e.g. `mckeldin`
    pub slug: String,
    /// Case-insensitive fragment matched against upstream location names.
    /// Sites without one only serve hours.
    #[serde(default)]
    pub search_name: Option<String>,
    /// Upstream location id used for opening hours
    pub hours_location_id: String,
}

impl SiteConfig {
    fn new(slug: &str, search_name: Option<&str>, hours_location_id: &str) -> Self {
        Self {
            slug: slug.to_string(),
            search_name: search_name.map(str::to_string),
            hours_location_id: hours_location_id.to_string(),
        }
    }
}

/// Ordered site table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SitesConfig(pub Vec<SiteConfig>);

impl Default for SitesConfig {
    fn default() -> Self {
        Self(vec![
            SiteConfig::new("mckeldin", Some("Mckeldin"), "13231"),
            SiteConfig::new("stem", Some("Stem"), "17168"),
            SiteConfig::new("makerspace", None, "25040"),
            SiteConfig::new("mspal", Some("Michelle Smith"), "17167"),
            SiteConfig::new("art", Some("Art Library"), "17166"),
        ])
    }
}

impl SitesConfig {
    /// Iterate over configured sites
    pub fn iter(&self) -> impl Iterator<Item = &SiteConfig> {
        self.0.iter()
    }
}

/// Duration serde helper accepting `"30s"`, `"5m"`, `"100ms"` or bare seconds
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Text(String),
    }

    /// Serialize Duration to human-readable string (e.g., "30s")
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize human-readable duration string or integer seconds
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = match RawDuration::deserialize(deserializer)? {
            RawDuration::Seconds(secs) => return Ok(Duration::from_secs(secs)),
            RawDuration::Text(s) => s,
        };
        let s = s.trim();

        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| Duration::from_secs(h * 3600))
                .map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
