//! Client identity classification.
//!
//! Every request is reduced to an opaque identity string before any
//! quota or storage work happens. The prefix (`api:` or `ip:`) is part of
//! the stored key, so an API client and an IP client can never collide.
//!
//! Precedence: API credential header, then the left-most entry of the
//! forwarded-for header, then the transport peer address, then
//! `ip:unknown`. The left-most forwarded entry is trusted unconditionally;
//! deployments behind untrusted hops must strip or validate the header
//! upstream.

use std::net::IpAddr;

/// Identity prefix for API-credential clients.
pub const API_PREFIX: &str = "api:";

/// Identity prefix for address-derived clients.
pub const IP_PREFIX: &str = "ip:";

/// Fallback identity when no source of addressing is available.
pub const UNKNOWN: &str = "ip:unknown";

/// Build the client identity from the request-time sources, applying the
/// documented precedence.
pub fn client_id(
    api_key: Option<&str>,
    forwarded_for: Option<&str>,
    peer: Option<IpAddr>,
) -> String {
    if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
        return format!("{API_PREFIX}{key}");
    }

    if let Some(forwarded) = forwarded_for {
        // X-Forwarded-For may carry a hop chain; the left-most entry is
        // the original client.
        if let Some(first) = forwarded.split(',').next().map(str::trim)
            && !first.is_empty()
        {
            return format!("{IP_PREFIX}{first}");
        }
    }

    match peer {
        Some(addr) => format!("{IP_PREFIX}{addr}"),
        None => UNKNOWN.to_string(),
    }
}

/// Extract the API credential from an identity, if it is an `api:` one.
pub fn api_credential(client_id: &str) -> Option<&str> {
    client_id.strip_prefix(API_PREFIX)
}
