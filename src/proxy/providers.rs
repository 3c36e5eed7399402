use super::{ProxyProvider, TransportConfig};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

const SCRAPERAPI_ENDPOINT: &str = "http://api.scraperapi.com/";
const BRIGHTDATA_GATEWAY: &str = "brd.superproxy.io:22225";
const OXYLABS_GATEWAY: &str = "pr.oxylabs.io:7777";

/// Direct connection
#[derive(Debug, Default)]
pub struct NoProxy;

impl ProxyProvider for NoProxy {
    fn for_request(&self, url: &Url) -> TransportConfig {
        TransportConfig::direct(url)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Static proxy list, rotated round-robin per request
pub struct ProxyList {
    proxies: Vec<String>,
    next: AtomicUsize,
}

impl ProxyList {
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies,
            next: AtomicUsize::new(0),
        }
    }
}

impl ProxyProvider for ProxyList {
    fn for_request(&self, url: &Url) -> TransportConfig {
        if self.proxies.is_empty() {
            return TransportConfig::direct(url);
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.proxies.len();
        TransportConfig {
            request_url: url.clone(),
            proxy: Some(self.proxies[index].clone()),
        }
    }

    fn name(&self) -> &'static str {
        "list"
    }
}

/// ScraperAPI: the target URL is passed to the API endpoint as a parameter
pub struct ScraperApi {
    pub api_key: String,
    pub render_js: bool,
    pub country: Option<String>,
    pub premium: bool,
}

impl ProxyProvider for ScraperApi {
    fn for_request(&self, url: &Url) -> TransportConfig {
        let mut params: Vec<(&str, &str)> =
            vec![("api_key", self.api_key.as_str()), ("url", url.as_str())];
        if self.render_js {
            params.push(("render", "true"));
        }
        if let Some(country) = &self.country {
            params.push(("country_code", country.as_str()));
        }
        if self.premium {
            params.push(("premium", "true"));
        }

        match Url::parse_with_params(SCRAPERAPI_ENDPOINT, &params) {
            Ok(request_url) => TransportConfig {
                request_url,
                proxy: None,
            },
            Err(e) => {
                tracing::error!("Failed to build ScraperAPI request URL: {}", e);
                TransportConfig::direct(url)
            }
        }
    }

    fn name(&self) -> &'static str {
        "scraperapi"
    }
}

/// Bright Data residential/datacenter gateway
///
/// The session id is fixed for the provider's lifetime so that requests
/// keep the same exit IP.
pub struct BrightData {
    username: String,
    password: String,
    zone: String,
    country: Option<String>,
    session_id: u32,
}

impl BrightData {
    pub fn new(username: String, password: String, zone: String, country: Option<String>) -> Self {
        Self {
            username,
            password,
            zone,
            country,
            session_id: rand::thread_rng().gen_range(1_000_000..10_000_000),
        }
    }

    fn proxy_username(&self) -> String {
        let mut parts = vec![format!("{}-zone-{}", self.username, self.zone)];
        if let Some(country) = &self.country {
            parts.push(format!("country-{}", country));
        }
        parts.push(format!("session-{}", self.session_id));
        parts.join("-")
    }
}

impl ProxyProvider for BrightData {
    fn for_request(&self, url: &Url) -> TransportConfig {
        TransportConfig {
            request_url: url.clone(),
            proxy: Some(format!(
                "http://{}:{}@{}",
                self.proxy_username(),
                self.password,
                BRIGHTDATA_GATEWAY
            )),
        }
    }

    fn name(&self) -> &'static str {
        "brightdata"
    }
}

/// Oxylabs residential gateway
pub struct Oxylabs {
    pub username: String,
    pub password: String,
    pub country: Option<String>,
}

impl ProxyProvider for Oxylabs {
    fn for_request(&self, url: &Url) -> TransportConfig {
        let username = match &self.country {
            Some(country) => format!("{}-country-{}", self.username, country),
            None => self.username.clone(),
        };
        TransportConfig {
            request_url: url.clone(),
            proxy: Some(format!(
                "http://{}:{}@{}",
                username, self.password, OXYLABS_GATEWAY
            )),
        }
    }

    fn name(&self) -> &'static str {
        "oxylabs"
    }
}
