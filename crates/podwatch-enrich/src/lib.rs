//! # podwatch-enrich
//! Third-party enrichment clients: bulk credit balances and cached
//! geo-IP resolution. Both degrade to safe defaults on failure rather
//! than propagating errors into the reconciliation cycle.

pub mod credits;
pub mod geo;

pub use credits::CreditsClient;
pub use geo::GeoResolver;
