//! URL handling module for sitechunk
//!
//! This module provides URL normalization, the link filter that decides
//! which discovered URLs enter the frontier, and the SSRF host guard.

mod filter;
pub mod guard;
mod normalize;

pub use filter::{FilterDecision, Rejection, UrlFilter};
pub use guard::HostGuard;
pub use normalize::{normalize_parsed, normalize_url};

/// Lowercased host of a URL, used as the per-host scheduling key
///
/// Returns "unknown" for URLs without a host so they still share one
/// per-host budget.
pub fn host_key(url: &::url::Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host.to_ascii_lowercase(), port),
        (Some(host), None) => host.to_ascii_lowercase(),
        _ => "unknown".to_string(),
    }
}
