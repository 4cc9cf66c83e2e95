//! Geo-IP resolution with a durable cache.
//!
//! The third-party lookup service rate-limits aggressively, so resolution
//! MUST be sequential: [`GeoResolver::resolve`] takes `&mut self`, which
//! makes concurrent resolution a compile error rather than a code-review
//! convention. The gossip cycle holds the resolver behind an async mutex
//! for the same reason.
//!
//! Successful lookups are persisted to the `geo_cache` table and never
//! expire. Failures return a sentinel that is NOT cached, so every later
//! cycle retries the lookup.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use podwatch_core::types::GeoInfo;
use podwatch_db::{Database, GeoQueries};

#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Cached, rate-limit-respecting geo-IP resolver.
pub struct GeoResolver {
    client: Client,
    /// Lookup URL prefix; the bare IP is appended. `None` disables
    /// outbound lookups (cache hits still resolve).
    url: Option<String>,
    timeout: Duration,
    db: Database,
}

impl GeoResolver {
    pub fn new(url: Option<String>, timeout: Duration, db: Database) -> Self {
        Self {
            client: Client::new(),
            url,
            timeout,
            db,
        }
    }

    /// Resolve one bare IP to a geo triple.
    ///
    /// Cache first; on a miss, one outbound lookup. Never fails: any
    /// problem yields [`GeoInfo::unknown`], uncached.
    pub async fn resolve(&mut self, ip: &str) -> GeoInfo {
        match self.db.with_connection(|conn| conn.get_geo(ip)) {
            Ok(Some(cached)) => {
                debug!(%ip, "geo cache hit");
                return cached;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(%ip, error = %e, "geo cache read failed");
                // Fall through to the remote lookup anyway.
            }
        }

        let Some(resolved) = self.lookup(ip).await else {
            return GeoInfo::unknown();
        };

        if let Err(e) = self.db.with_connection(|conn| conn.put_geo(ip, &resolved)) {
            warn!(%ip, error = %e, "geo cache write failed");
        }
        resolved
    }

    async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        let url = self.url.as_ref()?;
        let full = format!("{}/{}", url.trim_end_matches('/'), ip);

        let response = match self.client.get(&full).timeout(self.timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%ip, error = %e, "geo lookup failed");
                return None;
            }
        };

        let body: GeoResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(%ip, error = %e, "geo response malformed");
                return None;
            }
        };

        if body.status != "success" {
            debug!(%ip, status = %body.status, "geo lookup unsuccessful");
            return None;
        }

        Some(GeoInfo {
            country: body.country.unwrap_or_else(|| "Unknown".to_string()),
            lat: body.lat.unwrap_or(0.0),
            lon: body.lon.unwrap_or(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn cache_hit_makes_no_outbound_call() {
        let db = test_db();
        let cached = GeoInfo { country: "US".to_string(), lat: 1.0, lon: 2.0 };
        db.with_connection(|conn| conn.put_geo("10.0.0.1", &cached)).unwrap();

        // Lookups are disabled: if the cache were bypassed this would
        // return the Unknown sentinel instead of the cached triple.
        let mut resolver = GeoResolver::new(None, Duration::from_secs(1), db);
        assert_eq!(resolver.resolve("10.0.0.1").await, cached);
    }

    #[tokio::test]
    async fn miss_with_unreachable_endpoint_returns_uncached_sentinel() {
        let db = test_db();
        let mut resolver = GeoResolver::new(
            Some("http://127.0.0.1:1/geo".to_string()),
            Duration::from_secs(2),
            db.clone(),
        );

        assert_eq!(resolver.resolve("10.0.0.2").await, GeoInfo::unknown());
        // The sentinel must not have been cached.
        assert!(db.with_connection(|conn| conn.get_geo("10.0.0.2")).unwrap().is_none());
    }

    #[tokio::test]
    async fn disabled_lookup_returns_sentinel() {
        let mut resolver = GeoResolver::new(None, Duration::from_secs(1), test_db());
        assert_eq!(resolver.resolve("10.0.0.3").await, GeoInfo::unknown());
    }
}
