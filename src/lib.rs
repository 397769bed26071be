//! LibTools - read-through proxy for the LibApps space-reservation API
//!
//! Authenticates once with client credentials, caches the bearer token, and
//! republishes room availability and opening hours for a fixed set of
//! library sites as simplified aggregates.
//!
//! # Features
//!
//! - **Token caching**: one client-credentials token reused until shortly
//!   before upstream expiry, cleared and retried once on rejection
//! - **Layered caching**: independent TTL caches for locations, space
//!   listings and hours-today
//! - **Availability aggregation**: per-group and overall counts with
//!   tolerance for groups that reappear out of order
//! - **Hours extraction**: today's status and hours in US/Eastern

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod availability;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hours;
pub mod oauth;
pub mod service;
pub mod timezone;
pub mod upstream;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
    }
}
