//! Address resolution for ICMP probing

use fleetwatch_shared::ResolveError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::net::lookup_host;

/// Resolve a configured address string to an IPv4 address.
///
/// Accepts IPv4 literals and hostnames. IPv6 literals are rejected and
/// hostnames that only resolve to IPv6 yield `NoIpv4`.
pub async fn resolve_ipv4(addr: &str) -> Result<Ipv4Addr, ResolveError> {
    let host = addr.trim();
    if host.is_empty() {
        return Err(ResolveError::Empty);
    }

    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    // TODO: probe IPv6 targets once the prober grows an ICMPv6 socket
    if host.trim_matches(|c| c == '[' || c == ']').parse::<Ipv6Addr>().is_ok() {
        return Err(ResolveError::Ipv6Unsupported(host.to_string()));
    }

    let addrs = lookup_host((host, 0))
        .await
        .map_err(|source| ResolveError::Lookup {
            addr: host.to_string(),
            source,
        })?;

    addrs
        .filter_map(|sa| match sa.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ResolveError::NoIpv4(host.to_string()))
}
