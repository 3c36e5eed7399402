//! SSRF guard: keeps the crawler away from loopback and internal networks
//!
//! A host is forbidden when it is `localhost`, a literal loopback / private /
//! link-local / unspecified address, or a name that resolves to one.
//! Resolution results are cached per host for the lifetime of the guard.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex, PoisonError};
use url::{Host, Url};

/// Resolves host names to addresses for the guard
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system DNS configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Checks hosts against internal address ranges, resolving names via DNS
pub struct HostGuard {
    enabled: bool,
    resolver: Arc<dyn HostResolver>,
    resolved: Mutex<HashMap<String, bool>>,
}

impl fmt::Debug for HostGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostGuard")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl HostGuard {
    /// Creates a guard using system DNS; a disabled guard allows every host
    pub fn new(enabled: bool) -> Self {
        Self::with_resolver(enabled, Arc::new(SystemResolver))
    }

    pub fn with_resolver(enabled: bool, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            enabled,
            resolver,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if the URL's host may be fetched
    ///
    /// Names that fail to resolve are allowed; the fetch itself will fail.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        if !self.enabled {
            return true;
        }

        let Some(host) = url.host() else {
            return false;
        };

        if is_forbidden_host(&host) {
            return false;
        }

        let Host::Domain(name) = host else {
            return true;
        };

        let key = name.to_ascii_lowercase();
        if let Some(allowed) = self.cached(&key) {
            return allowed;
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let allowed = match self.resolver.resolve(&key, port).await {
            Ok(addrs) => match addrs.into_iter().find(|ip| is_forbidden_ip(*ip)) {
                Some(ip) => {
                    tracing::warn!("Host {} resolves to internal address {}", key, ip);
                    false
                }
                None => true,
            },
            Err(e) => {
                tracing::debug!("DNS lookup for {} failed: {}", key, e);
                true
            }
        };

        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, allowed);

        allowed
    }

    fn cached(&self, host: &str) -> Option<bool> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .copied()
    }
}

/// Checks a parsed host without resolving it
pub fn is_forbidden_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            name == "localhost" || name.ends_with(".localhost")
        }
        Host::Ipv4(ip) => is_forbidden_ip(IpAddr::V4(*ip)),
        Host::Ipv6(ip) => is_forbidden_ip(IpAddr::V6(*ip)),
    }
}

/// Returns true for loopback, private, link-local and other internal addresses
pub fn is_forbidden_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_forbidden_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_forbidden_v4(v4),
            None => is_forbidden_v6(v6),
        },
    }
}

fn is_forbidden_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (64..128).contains(&b))
        // 0.0.0.0/8
        || a == 0
}

fn is_forbidden_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
}
