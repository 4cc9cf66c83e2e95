//! Pod address normalization.
//!
//! Pods are identified by bare IP; the gossip layer reports addresses in a
//! handful of shapes (`1.2.3.4`, `1.2.3.4:9001`, `1.2.3.4:6000`). Two forms
//! matter here:
//!
//! - the RPC form ([`normalize_for_rpc`]), used only to build outbound URLs;
//! - the canonical key ([`canonical_key`]), the bare IP, which is the only
//!   form ever persisted or used as a lookup key.
//!
//! Only IPv4 and hostname addresses are handled; the gossip layer does not
//! advertise IPv6.

use crate::constants::{DEFAULT_RPC_PORT, GOSSIP_PORT};

/// Split `host:port` if the suffix is a valid port number.
fn split_port(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    Some((host, port))
}

/// Rewrite an advertised address into the form used for outbound RPC URLs.
///
/// A gossip-port suffix is rewritten to the canonical RPC port; an address
/// with no port gets the RPC port appended; any other explicit port is kept
/// as-is. Never used for persisted identity.
pub fn normalize_for_rpc(address: &str) -> String {
    match split_port(address) {
        Some((host, port)) if port == GOSSIP_PORT => format!("{host}:{DEFAULT_RPC_PORT}"),
        Some(_) => address.to_string(),
        None => format!("{address}:{DEFAULT_RPC_PORT}"),
    }
}

/// Strip any port suffix, returning the bare IP.
///
/// This is the sole persisted identity of a pod and the only join key into
/// snapshot history.
pub fn canonical_key(address: &str) -> String {
    match split_port(address) {
        Some((host, _)) => host.to_string(),
        None => address.to_string(),
    }
}

/// True for addresses that cannot identify a pod: empty, or all-zero
/// (`0.0.0.0` and friends). Such records are dropped during preprocessing.
pub fn is_placeholder_ip(ip: &str) -> bool {
    if ip.is_empty() {
        return true;
    }
    ip.split('.').all(|octet| octet.chars().all(|c| c == '0') && !octet.is_empty())
}
