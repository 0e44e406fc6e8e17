//! ipgeocache Library
//!
//! This library provides the core functionality for ipgeocache, including configuration,
//! error handling, address canonicalization, the access gate, the day-partitioned cache,
//! upstream geolocation and the HTTP endpoint.

pub mod config;
pub mod error;
pub mod models;
pub mod canonical;
pub mod gate;
pub mod store;
pub mod cache;
pub mod geo;
pub mod service;
pub mod server;


pub use canonical::{canonical_key, CanonicalKey};
pub use config::Config;
pub use error::{GeoError, Result};
pub use gate::AccessGate;
pub use geo::{IpApiResolver, Resolver};
pub use models::Location;
pub use service::{CachePolicy, GeoService};
pub use store::{DayStore, FsStore, MemoryStore};
