//! Configuration Module
//!
//! This module reads configuration values from environment variables, provides
//! sensible defaults, and validates them. Parsing goes through a variable lookup
//! function so tests never have to touch the process environment.

use crate::cache::DEFAULT_RETENTION_DAYS;
use crate::gate::DEFAULT_MARKERS;
use crate::geo::DEFAULT_UPSTREAM_URL;
use crate::service::CachePolicy;
use anyhow::Result;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub cache_dir: PathBuf,
    pub upstream_url: String,
    pub upstream_timeout: Option<Duration>,
    pub retention_days: i64,
    pub cache_failures: bool,
    pub cache_owner: Option<String>,
    pub ua_markers: Vec<String>,
    pub forwarded_header: Option<String>,
}

impl Config {
    /// Creates a new configuration by reading environment variables.
    /// If a variable is missing or empty, a default value is used.
    pub fn new() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Treat empty and whitespace-only values as unset.
        let var = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let bind = match var("GEOLOC_BIND") {
            Some(s) => s
                .parse::<SocketAddr>()
                .map_err(|e| anyhow::anyhow!("Invalid GEOLOC_BIND {:?}: {}", s, e))?,
            None => SocketAddr::from(([127, 0, 0, 1], 8080)),
        };

        let cache_dir = var("GEOLOC_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./cache"));

        let upstream_url = var("GEOLOC_UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());

        let upstream_timeout = var("GEOLOC_UPSTREAM_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);

        let retention_days = var("GEOLOC_RETENTION_DAYS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RETENTION_DAYS);

        if !(0..=3650).contains(&retention_days) {
            return Err(anyhow::anyhow!("Retention must be between 0 and 3650 days"));
        }

        let cache_failures = match var("GEOLOC_CACHE_FAILURES") {
            Some(s) => parse_bool(&s)
                .ok_or_else(|| anyhow::anyhow!("Invalid GEOLOC_CACHE_FAILURES {:?}", s))?,
            None => true,
        };

        let cache_owner = var("GEOLOC_CACHE_OWNER");

        let ua_markers: Vec<String> = match var("GEOLOC_UA_MARKERS") {
            Some(s) => s
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            None => DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        };

        if ua_markers.is_empty() {
            return Err(anyhow::anyhow!("At least one user agent marker is required"));
        }

        // Only a configured proxy header is trusted; otherwise the peer address is used.
        let forwarded_header = var("GEOLOC_FORWARDED_HEADER").map(|s| s.to_ascii_lowercase());

        Ok(Config {
            bind,
            cache_dir,
            upstream_url,
            upstream_timeout,
            retention_days,
            cache_failures,
            cache_owner,
            ua_markers,
            forwarded_header,
        })
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            retention_days: self.retention_days,
            cache_failures: self.cache_failures,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
