//! IP geolocation: a TTL cache over the ip-api.com oracle, address→IP
//! extraction for the heterogeneous address formats in the rosters, and
//! quota-paced bulk lookups.

use std::{
    collections::HashMap,
    net::IpAddr,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use regex::Regex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::models::GeoLocation;

/// Timeout of a single oracle request.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields requested from the oracle.
const ORACLE_FIELDS: &str =
    "status,message,country,countryCode,region,regionName,city,zip,lat,lon,timezone,isp,org,as,query";

/// Errors from geolocation lookups.
#[derive(Debug, Error)]
pub enum GeoError {
    /// The oracle request failed at the transport level.
    #[error("geo lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The oracle answered with a non-success status.
    #[error("geo lookup failed: {0}")]
    LookupFailed(String),

    /// No IP could be extracted from the address.
    #[error("could not extract an IP from address: {0}")]
    NoIp(String),
}

struct CachedLocation {
    location: GeoLocation,
    cached_at: Instant,
}

/// A concurrent TTL cache in front of the geolocation oracle.
///
/// Cache hits are served without touching the oracle; misses fetch, cache,
/// and return. Bulk lookups are serialized at one request per pace interval
/// to stay inside the oracle's free-tier quota.
pub struct GeoCache {
    cache: DashMap<String, CachedLocation>,
    ttl: Duration,
    client: reqwest::Client,
    api_url: String,
    pace: Duration,
    ipv4_pattern: Regex,
}

impl GeoCache {
    /// Creates a cache against the given oracle base URL.
    pub fn new(api_url: String, ttl: Duration, pace: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self {
            cache: DashMap::new(),
            ttl,
            client,
            api_url,
            pace,
            ipv4_pattern: Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b")
                .expect("static IPv4 pattern is valid"),
        })
    }

    /// The interval between bulk-lookup requests.
    pub fn pace(&self) -> Duration {
        self.pace
    }

    /// Resolves an IP to a location, consulting the cache first.
    pub async fn get_location(&self, ip: &str) -> Result<GeoLocation, GeoError> {
        if let Some(cached) = self.cache.get(ip) {
            if cached.cached_at.elapsed() < self.ttl {
                return Ok(cached.location.clone());
            }
        }

        let url = format!("{}/{}?fields={}", self.api_url, ip, ORACLE_FIELDS);
        let geo = self.client.get(&url).send().await?.json::<GeoLocation>().await?;
        if geo.status != "success" {
            let detail = if geo.message.is_empty() { geo.status.clone() } else { geo.message.clone() };
            return Err(GeoError::LookupFailed(detail));
        }

        self.cache.insert(
            ip.to_string(),
            CachedLocation { location: geo.clone(), cached_at: Instant::now() },
        );
        tracing::debug!(ip, country = %geo.country, city = %geo.city, "resolved geo location");
        Ok(geo)
    }

    /// Extracts the IP from an address and resolves it to a location.
    pub async fn lookup_address(&self, address: &str) -> Result<GeoLocation, GeoError> {
        let ip = self
            .extract_ip(address)
            .await
            .ok_or_else(|| GeoError::NoIp(address.to_string()))?;
        self.get_location(&ip).await
    }

    /// Resolves many IPs, one request per pace interval. Returns whatever
    /// resolved before `cancel` fired; individual failures are logged and
    /// skipped.
    pub async fn bulk_get(
        &self,
        cancel: &CancellationToken,
        ips: &[String],
    ) -> HashMap<String, GeoLocation> {
        let mut results = HashMap::new();
        let mut ticker = tokio::time::interval(self.pace);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        for ip in ips {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(resolved = results.len(), "bulk geo lookup cancelled");
                    return results;
                }
                _ = ticker.tick() => {}
            }
            match self.get_location(ip).await {
                Ok(geo) => {
                    results.insert(ip.clone(), geo);
                }
                Err(e) => tracing::warn!(ip, error = %e, "failed to get geo location"),
            }
        }
        results
    }

    /// Extracts an IP from the address formats seen in rosters, in order:
    /// multiaddress IP literal, multiaddress DNS name, URL, `host:port`,
    /// and finally an IPv4 literal anywhere in the string. Returns `None`
    /// when nothing matches.
    pub async fn extract_ip(&self, address: &str) -> Option<String> {
        // /ip4/1.2.3.4/tcp/... and /ip6/::1/tcp/...
        if address.starts_with("/ip4/") || address.starts_with("/ip6/") {
            let parts: Vec<&str> = address.split('/').collect();
            if parts.len() >= 3 && parts[2].parse::<IpAddr>().is_ok() {
                return Some(parts[2].to_string());
            }
        }

        // /dns/example.org/tcp/... and /dns4/example.org/tcp/...
        if address.starts_with("/dns/") || address.starts_with("/dns4/") {
            let parts: Vec<&str> = address.split('/').collect();
            if parts.len() >= 3 {
                return resolve_host(parts[2]).await;
            }
        }

        // http://example.org:8080 and https://example.org
        if address.starts_with("http://") || address.starts_with("https://") {
            if let Ok(url) = Url::parse(address) {
                if let Some(host) = url.host_str() {
                    let host = host.trim_start_matches('[').trim_end_matches(']');
                    if host.parse::<IpAddr>().is_ok() {
                        return Some(host.to_string());
                    }
                    return resolve_host(host).await;
                }
            }
        }

        // example.org:50051
        if let Some((host, port)) = address.rsplit_once(':') {
            if port.chars().all(|c| c.is_ascii_digit()) && !host.is_empty() {
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.parse::<IpAddr>().is_ok() {
                    return Some(host.to_string());
                }
                if let Some(ip) = resolve_host(host).await {
                    return Some(ip);
                }
            }
        }

        // Last resort: an IPv4 literal anywhere in the string.
        if let Some(m) = self.ipv4_pattern.find(address) {
            if m.as_str().parse::<IpAddr>().is_ok() {
                return Some(m.as_str().to_string());
            }
        }

        None
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// `(total, valid)` entry counts; valid entries are within the TTL.
    pub fn stats(&self) -> (usize, usize) {
        let total = self.cache.len();
        let valid = self
            .cache
            .iter()
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .count();
        (total, valid)
    }
}

/// Resolves a hostname, preferring IPv4 addresses.
async fn resolve_host(host: &str) -> Option<String> {
    match tokio::net::lookup_host((host, 0u16)).await {
        Ok(addrs) => {
            let addrs: Vec<_> = addrs.collect();
            addrs
                .iter()
                .find(|a| a.is_ipv4())
                .or_else(|| addrs.first())
                .map(|a| a.ip().to_string())
        }
        Err(e) => {
            tracing::debug!(host, error = %e, "failed to resolve hostname");
            None
        }
    }
}
