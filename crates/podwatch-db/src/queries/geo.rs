//! Durable geo-IP cache queries.
//!
//! One row per unique IP, written on the first successful lookup and read
//! forever after. Entries never expire; geo data for a fixed IP goes stale
//! slowly enough that the tradeoff is accepted. Failed lookups are NOT
//! cached, so future cycles retry them.

use rusqlite::{params, Connection, OptionalExtension};

use podwatch_core::types::GeoInfo;

use super::super::error::StoreError;

/// Queries against the `geo_cache` table.
pub trait GeoQueries {
    /// Cached geo triple for an IP, if one was ever resolved.
    fn get_geo(&self, ip: &str) -> Result<Option<GeoInfo>, StoreError>;

    /// Store (or overwrite) the geo triple for an IP.
    fn put_geo(&self, ip: &str, geo: &GeoInfo) -> Result<(), StoreError>;
}

impl GeoQueries for Connection {
    fn get_geo(&self, ip: &str) -> Result<Option<GeoInfo>, StoreError> {
        let geo = self
            .query_row(
                "SELECT country, lat, lon FROM geo_cache WHERE ip = ?1",
                params![ip],
                |row| {
                    Ok(GeoInfo {
                        country: row.get(0)?,
                        lat: row.get(1)?,
                        lon: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(geo)
    }

    fn put_geo(&self, ip: &str, geo: &GeoInfo) -> Result<(), StoreError> {
        self.execute(
            "INSERT OR REPLACE INTO geo_cache (ip, country, lat, lon) VALUES (?1, ?2, ?3, ?4)",
            params![ip, geo.country, geo.lat, geo.lon],
        )?;
        Ok(())
    }
}
