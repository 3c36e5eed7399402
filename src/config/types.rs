use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for a crawl run
///
/// Only `domain` is required; every section falls back to the defaults
/// documented on its fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScraperConfig {
    /// Seed URL the crawl starts from
    pub domain: String,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default, rename = "circuit-breaker")]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl ScraperConfig {
    /// Builds a configuration with defaults for everything except the seed
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            crawler: CrawlerConfig::default(),
            filter: FilterConfig::default(),
            http: HttpConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            content: ContentConfig::default(),
            output: OutputConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

/// Crawl traversal and scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed (None for unbounded, `"none"` in TOML)
    #[serde(deserialize_with = "deserialize_max_depth")]
    pub max_depth: Option<u32>,

    /// Maximum number of fetches in flight across all hosts
    pub concurrent_requests: u32,

    /// Maximum number of fetches in flight against one host
    pub connections_per_host: u32,

    /// Pause between dispatches to the same host, in seconds
    pub delay_between_requests: f64,
}

impl CrawlerConfig {
    pub fn delay_between_requests(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_requests)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(3),
            concurrent_requests: 10,
            connections_per_host: 5,
            delay_between_requests: 0.5,
        }
    }
}

fn deserialize_max_depth<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    struct DepthVisitor;

    impl<'de> de::Visitor<'de> for DepthVisitor {
        type Value = Option<u32>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a non-negative depth or \"none\"")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Option<u32>, E> {
            u32::try_from(v)
                .map(Some)
                .map_err(|_| E::custom(format!("max-depth must be between 0 and {}, got {v}", u32::MAX)))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Option<u32>, E> {
            u32::try_from(v)
                .map(Some)
                .map_err(|_| E::custom(format!("max-depth too large: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Option<u32>, E> {
            if v.eq_ignore_ascii_case("none") {
                Ok(None)
            } else {
                Err(E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }
    }

    deserializer.deserialize_any(DepthVisitor)
}

/// Rules deciding which discovered links are followed
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilterConfig {
    /// Follow only URLs containing at least one of these keywords
    pub include_keywords: Vec<String>,

    /// Never follow URLs containing any of these keywords
    pub exclude_keywords: Vec<String>,

    /// Follow only URLs starting with one of these prefixes
    pub start_with: Vec<String>,

    /// URL prefixes that are never followed
    pub excluded_protocols: Vec<String>,

    /// Stay on the seed's host
    pub stay_on_domain: bool,

    /// Reject URLs pointing at loopback, private or link-local addresses
    pub block_private_hosts: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            start_with: Vec::new(),
            excluded_protocols: vec![
                "mailto:".to_string(),
                "tel:".to_string(),
                "whatsapp:".to_string(),
            ],
            stay_on_domain: true,
            block_private_hosts: true,
        }
    }
}

/// HTTP request, timeout and retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct HttpConfig {
    /// Retries after the first attempt of a URL
    pub max_retries: u32,

    /// Base backoff delay in seconds (doubles every retry)
    pub base_delay: f64,

    /// Upper bound for any single backoff wait, in seconds
    pub max_backoff: f64,

    /// Per-request timeout in seconds
    pub timeout: f64,

    /// Fixed user agent; a browser user agent is rotated when unset
    pub user_agent: Option<String>,

    /// Largest page body read, in bytes; longer bodies are truncated
    pub max_body_size: usize,
}

impl HttpConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs_f64(self.base_delay)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.max_backoff)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: 1.0,
            max_backoff: 60.0,
            timeout: 30.0,
            user_agent: None,
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,

    /// Consecutive failed attempts that open the circuit
    pub threshold: u32,

    /// Failure ratio (0.0 - 1.0) that opens the circuit
    pub failure_rate: f64,

    /// Attempts required before the failure ratio is considered
    pub min_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 10,
            failure_rate: 0.5,
            min_requests: 10,
        }
    }
}

/// Text extraction and chunking configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContentConfig {
    pub split_length: SplitLength,

    /// CSS selector restricting extraction to one element
    pub target_selector: Option<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            split_length: SplitLength::Chars(2000),
            target_selector: None,
        }
    }
}

/// Maximum chunk length, or no splitting at all
///
/// Written in TOML either as a character count or as the string `"none"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitLength {
    Chars(usize),
    Unlimited,
}

impl SplitLength {
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Chars(n) => Some(*n),
            Self::Unlimited => None,
        }
    }
}

impl<'de> Deserialize<'de> for SplitLength {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SplitVisitor;

        impl<'de> de::Visitor<'de> for SplitVisitor {
            type Value = SplitLength;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a chunk length or \"none\"")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<SplitLength, E> {
                usize::try_from(v)
                    .map(SplitLength::Chars)
                    .map_err(|_| E::custom(format!("split-length must not be negative, got {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<SplitLength, E> {
                usize::try_from(v)
                    .map(SplitLength::Chars)
                    .map_err(|_| E::custom(format!("split-length too large: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<SplitLength, E> {
                if v.eq_ignore_ascii_case("none") {
                    Ok(SplitLength::Unlimited)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(SplitVisitor)
    }
}

/// Output location
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory every output file must stay inside (defaults to the working directory)
    pub root: Option<PathBuf>,

    /// CSV path relative to the root (defaults to `<seed host>/scraped_data.csv`)
    pub path: Option<PathBuf>,
}

/// Proxy transport configuration, one variant per provider
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProxyConfig {
    #[default]
    None,

    /// Static proxy URLs used round-robin
    List { proxies: Vec<String> },

    #[serde(rename_all = "kebab-case")]
    ScraperApi {
        api_key: String,
        #[serde(default)]
        render_js: bool,
        #[serde(default)]
        country: Option<String>,
        #[serde(default)]
        premium: bool,
    },

    BrightData {
        username: String,
        password: String,
        #[serde(default = "default_brightdata_zone")]
        zone: String,
        #[serde(default)]
        country: Option<String>,
    },

    Oxylabs {
        username: String,
        password: String,
        #[serde(default)]
        country: Option<String>,
    },
}

fn default_brightdata_zone() -> String {
    "residential".to_string()
}
