use std::net::IpAddr;

/// Addresses this machine may appear under in the peer roster: the API
/// host plus every local interface address.
///
/// Only used to hide our own entry from the roster. It cannot see through
/// NAT or tell apart two clients on one multi-homed host.
pub fn local_hosts(api_host: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = api_host
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        .into_iter()
        .collect();

    match if_addrs::get_if_addrs() {
        Ok(ifs) => out.extend(ifs.into_iter().map(|ifa| ifa.ip().to_string())),
        Err(e) => tracing::warn!("Could not list local interfaces: {}", e),
    }

    out.sort();
    out.dedup();
    out
}

/// Compare two host strings, treating equal IP addresses in different
/// spellings (`::1` vs `0:0::1`) as the same host.
pub fn same_host(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
