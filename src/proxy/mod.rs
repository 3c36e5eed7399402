//! Proxy providers
//!
//! A [`ProxyProvider`] is asked for a [`TransportConfig`] before every
//! physical request, which lets providers rotate proxies or rewrite the
//! request URL per attempt. The fetcher never needs to know which
//! provider it is talking to.

mod providers;

pub use providers::{BrightData, NoProxy, Oxylabs, ProxyList, ScraperApi};

use crate::config::ProxyConfig;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// How a single request should be sent
#[derive(Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// The URL to request (differs from the target for API-style providers)
    pub request_url: Url,

    /// Proxy URL, possibly carrying credentials
    pub proxy: Option<String>,
}

impl TransportConfig {
    /// A direct request to `url`
    pub fn direct(url: &Url) -> Self {
        Self {
            request_url: url.clone(),
            proxy: None,
        }
    }
}

// Proxy URLs and rewritten request URLs carry credentials
impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("request_host", &self.request_url.host_str())
            .field("proxied", &self.proxy.is_some())
            .finish()
    }
}

/// Supplies per-request transport configuration
pub trait ProxyProvider: Send + Sync {
    /// Returns how the request for `url` should be sent
    fn for_request(&self, url: &Url) -> TransportConfig;

    /// Short provider name for logging
    fn name(&self) -> &'static str;
}

/// Builds the provider described by the configuration
pub fn build_provider(config: &ProxyConfig) -> Arc<dyn ProxyProvider> {
    match config {
        ProxyConfig::None => Arc::new(NoProxy),
        ProxyConfig::List { proxies } => Arc::new(ProxyList::new(proxies.clone())),
        ProxyConfig::ScraperApi {
            api_key,
            render_js,
            country,
            premium,
        } => Arc::new(ScraperApi {
            api_key: api_key.clone(),
            render_js: *render_js,
            country: country.clone(),
            premium: *premium,
        }),
        ProxyConfig::BrightData {
            username,
            password,
            zone,
            country,
        } => Arc::new(BrightData::new(
            username.clone(),
            password.clone(),
            zone.clone(),
            country.clone(),
        )),
        ProxyConfig::Oxylabs {
            username,
            password,
            country,
        } => Arc::new(Oxylabs {
            username: username.clone(),
            password: password.clone(),
            country: country.clone(),
        }),
    }
}
