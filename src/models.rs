//! Data Models Module
//!
//! This module defines the data structures shared by the cache, the resolver and
//! the HTTP layer: the rounded `Location`, the upstream `IpApiResponse` and the
//! outcome of a cache lookup.
use serde::{Deserialize, Serialize};

/// Approximate position of an address, rounded to whole degrees.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub lat: i32,
    pub lon: i32,
}

impl Location {
    /// Rounds raw coordinates half away from zero.
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Location {
            lat: lat.round() as i32,
            lon: lon.round() as i32,
        }
    }
}

/// Body returned by `/json/<address>?fields=status,lat,lon`.
#[derive(Debug, Deserialize, Clone)]
pub struct IpApiResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

/// Outcome of scanning the day-directories for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// An entry exists; `None` means a failed resolution was cached.
    Hit(Option<Location>),
    Miss,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(Location::from_degrees(35.5, -139.5), Location { lat: 36, lon: -140 });
        assert_eq!(Location::from_degrees(35.49, 139.51), Location { lat: 35, lon: 140 });
        assert_eq!(Location::from_degrees(-0.4, 0.4), Location { lat: 0, lon: 0 });
    }

    #[test]
    fn test_location_json_shape() {
        let json = serde_json::to_string(&Location { lat: 35, lon: 139 }).unwrap();
        assert_eq!(json, r#"{"lat":35,"lon":139}"#);
        let none: Option<Location> = None;
        assert_eq!(serde_json::to_string(&none).unwrap(), "null");
    }
}
