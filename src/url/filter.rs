use crate::config::FilterConfig;
use crate::url::guard::HostGuard;
use std::sync::Arc;
use crate::url::normalize::normalize_parsed;
use std::fmt;
use url::Url;

/// Why a discovered link was not followed
///
/// Rejections are expected control flow, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The href could not be resolved to a URL
    Malformed,
    /// The scheme is not http or https
    Scheme,
    /// The URL starts with an excluded protocol prefix
    Protocol,
    /// The host is loopback, private, or resolves to an internal address
    Ssrf,
    /// The URL matches none of the configured prefixes
    Prefix,
    /// The URL contains none of the include keywords
    Include,
    /// The URL contains an exclude keyword
    Exclude,
    /// The URL leaves the seed's host
    OffSite,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Malformed => "malformed",
            Self::Scheme => "scheme",
            Self::Protocol => "protocol",
            Self::Ssrf => "ssrf",
            Self::Prefix => "prefix",
            Self::Include => "include",
            Self::Exclude => "exclude",
            Self::OffSite => "off-site",
        };
        f.write_str(reason)
    }
}

/// Outcome of running a link through the filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accepted(Url),
    Rejected(Rejection),
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            Self::Accepted(_) => None,
        }
    }
}

/// Decides which discovered links are eligible for the frontier
///
/// Rules are applied in order and the first rejection wins:
/// resolution, scheme, excluded protocols, SSRF guard, prefixes,
/// include keywords, exclude keywords, and finally the same-site rule.
#[derive(Debug)]
pub struct UrlFilter {
    excluded_protocols: Vec<String>,
    start_with: Vec<String>,
    include_keywords: Vec<String>,
    exclude_keywords: Vec<String>,
    site_host: Option<String>,
    guard: Arc<HostGuard>,
}

impl UrlFilter {
    /// Builds a filter from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Filter rules
    /// * `seed` - The crawl seed; its host bounds the crawl when `stay_on_domain` is set
    /// * `guard` - SSRF guard, shared with the fetcher for redirect checks
    pub fn new(config: &FilterConfig, seed: &Url, guard: Arc<HostGuard>) -> Self {
        let site_host = if config.stay_on_domain {
            seed.host_str().map(str::to_ascii_lowercase)
        } else {
            None
        };

        Self {
            excluded_protocols: config
                .excluded_protocols
                .iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
            start_with: config.start_with.clone(),
            include_keywords: config.include_keywords.clone(),
            exclude_keywords: config.exclude_keywords.clone(),
            site_host,
            guard,
        }
    }

    /// Resolves `raw` against `base` and runs every rule
    pub async fn accept(&self, raw: &str, base: &Url) -> FilterDecision {
        let raw = raw.trim();

        let resolved = match base.join(raw) {
            Ok(url) => url,
            Err(_) => return FilterDecision::Rejected(Rejection::Malformed),
        };

        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            return FilterDecision::Rejected(Rejection::Scheme);
        }

        let url = normalize_parsed(resolved);
        if url.host_str().is_none() {
            return FilterDecision::Rejected(Rejection::Malformed);
        }

        if self.has_excluded_protocol(raw, &url) {
            return FilterDecision::Rejected(Rejection::Protocol);
        }

        if !self.guard.is_allowed(&url).await {
            return FilterDecision::Rejected(Rejection::Ssrf);
        }

        match self.check_rules(&url) {
            Some(rejection) => FilterDecision::Rejected(rejection),
            None => FilterDecision::Accepted(url),
        }
    }

    /// Applies only the SSRF guard; used for the seed, which bypasses keyword rules
    pub async fn allows_host(&self, url: &Url) -> bool {
        self.guard.is_allowed(url).await
    }

    fn has_excluded_protocol(&self, raw: &str, url: &Url) -> bool {
        let raw = raw.to_ascii_lowercase();
        self.excluded_protocols
            .iter()
            .any(|protocol| raw.starts_with(protocol.as_str()) || url.as_str().starts_with(protocol.as_str()))
    }

    /// Prefix, keyword and same-site rules, which need no network access
    fn check_rules(&self, url: &Url) -> Option<Rejection> {
        let text = url.as_str();

        if !self.start_with.is_empty()
            && !self
                .start_with
                .iter()
                .any(|prefix| text.starts_with(prefix.as_str()))
        {
            return Some(Rejection::Prefix);
        }

        if !self.include_keywords.is_empty()
            && !self
                .include_keywords
                .iter()
                .any(|keyword| text.contains(keyword.as_str()))
        {
            return Some(Rejection::Include);
        }

        if self
            .exclude_keywords
            .iter()
            .any(|keyword| text.contains(keyword.as_str()))
        {
            return Some(Rejection::Exclude);
        }

        if let Some(site) = &self.site_host {
            let same_site = url
                .host_str()
                .map(|host| host.eq_ignore_ascii_case(site))
                .unwrap_or(false);
            if !same_site {
                return Some(Rejection::OffSite);
            }
        }

        None
    }
}
