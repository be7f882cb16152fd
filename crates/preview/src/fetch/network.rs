// ABOUTME: Network guard refusing fetches that target private, loopback or link-local hosts.
// ABOUTME: Private names are refused in the client's DNS resolver; IP literals are checked up front.

use std::net::{IpAddr, SocketAddr};

use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use url::{Host, Url};

static PRIVATE_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    [
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "0.0.0.0/8",
    ]
    .iter()
    .filter_map(|net| net.parse().ok())
    .collect()
});

static PRIVATE_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    ["fc00::/7", "fe80::/10"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

/// Why a host was refused or could not be checked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostCheck {
    #[error("{0} resolves to a private address")]
    Private(String),
    #[error("DNS lookup failed for {host}: {message}")]
    Unresolved { host: String, message: String },
}

/// Check if an IP address is in a private/reserved range.
pub fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => ip.is_broadcast() || PRIVATE_V4.iter().any(|net| net.contains(ip)),
        IpAddr::V6(ip) => {
            if ip.is_loopback() || ip.is_unspecified() {
                return true;
            }
            if let Some(v4) = ip.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            PRIVATE_V6.iter().any(|net| net.contains(ip))
        }
    }
}

fn literal_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(ip) => Some(IpAddr::V4(ip)),
        Host::Ipv6(ip) => Some(IpAddr::V6(ip)),
        Host::Domain(_) => None,
    }
}

/// Refuse a URL whose host is a private IP literal. Never touches DNS.
///
/// IP literals bypass the resolver, so this is the check for them; domain
/// names are checked by `PublicResolver` when the connection is made.
pub fn ensure_public_literal(url: &Url) -> Result<(), HostCheck> {
    match literal_ip(url) {
        Some(ip) if is_private_ip(&ip) => Err(HostCheck::Private(
            url.host_str().unwrap_or_default().to_string(),
        )),
        _ => Ok(()),
    }
}

async fn resolve_public(host: &str, port: u16) -> Result<Vec<SocketAddr>, HostCheck> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| HostCheck::Unresolved {
            host: host.to_string(),
            message: e.to_string(),
        })?
        .collect();

    if addrs.iter().any(|addr| is_private_ip(&addr.ip())) {
        return Err(HostCheck::Private(host.to_string()));
    }
    Ok(addrs)
}

/// Resolve the URL host asynchronously and refuse it if any address is private.
///
/// Only needed for caller-supplied clients, which do not use `PublicResolver`.
pub async fn ensure_public(url: &Url) -> Result<(), HostCheck> {
    ensure_public_literal(url)?;
    match url.host() {
        Some(Host::Domain(host)) => {
            resolve_public(host, url.port_or_known_default().unwrap_or(80)).await?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// DNS resolver for the fetch client that refuses names resolving to private addresses.
///
/// Every connection (the first request and each redirect hop) resolves through
/// here, and the connection uses exactly the addresses that were checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicResolver;

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            // the connector fills in the port
            let addrs = resolve_public(&host, 0).await?;
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
