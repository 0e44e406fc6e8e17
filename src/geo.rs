//! Geolocation Module
//!
//! This module resolves an address to a rounded [`Location`] using the IP-API
//! service. Every failure, whether transport, decoding or a non-`success`
//! status, is reported as "no result" so callers handle absence uniformly.
use crate::error::{GeoError, Result};
use crate::models::{IpApiResponse, Location};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_UPSTREAM_URL: &str = "http://ip-api.com";
const SUCCESS_STATUS: &str = "success";

/// Something that can place an address on the map.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Option<Location>;
}

/// Resolver backed by `GET <base>/json/<address>?fields=status,lat,lon`.
#[derive(Debug, Clone)]
pub struct IpApiResolver {
    client: Client,
    base: Url,
}

impl IpApiResolver {
    /// Creates a resolver for the given base URL. Without a timeout the
    /// transport defaults apply.
    pub fn new(base: impl AsRef<str>, timeout: Option<Duration>) -> Result<Self> {
        let base = Url::parse(base.as_ref())
            .map_err(|e| GeoError::Upstream(format!("Invalid upstream URL: {}", e)))?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base,
        })
    }

    fn lookup_url(&self, address: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| GeoError::Upstream(format!("Upstream URL cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .push("json")
            .push(address);
        url.query_pairs_mut().append_pair("fields", "status,lat,lon");
        Ok(url)
    }

    /// Performs the lookup, surfacing the reason for a missing result.
    pub async fn lookup(&self, address: &str) -> Result<Location> {
        let url = self.lookup_url(address)?;
        let body = self.client.get(url).send().await?.text().await?;
        let raw: IpApiResponse = serde_json::from_str(&body)?;
        match raw {
            // a success without coordinates places the client at 0,0
            IpApiResponse {
                status: Some(status),
                lat,
                lon,
            } if status == SUCCESS_STATUS => {
                Ok(Location::from_degrees(lat.unwrap_or(0.0), lon.unwrap_or(0.0)))
            }
            IpApiResponse { status, .. } => Err(GeoError::Upstream(format!(
                "lookup for {} returned status {:?}",
                address, status
            ))),
        }
    }
}

#[async_trait]
impl Resolver for IpApiResolver {
    async fn resolve(&self, address: &str) -> Option<Location> {
        match self.lookup(address).await {
            Ok(location) => {
                info!("Successful geolocation lookup for IP: {}", address);
                Some(location)
            }
            Err(e) => {
                warn!("Geolocation lookup failed for IP {}: {}", address, e);
                None
            }
        }
    }
}
