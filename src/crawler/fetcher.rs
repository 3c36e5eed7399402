//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients (one direct client, one per proxy URL)
//! - Per-attempt transport selection through the proxy provider
//! - User-agent rotation
//! - Following redirects, with every hop checked by the SSRF guard
//! - Retry with exponential backoff and `Retry-After`
//! - Reporting every physical attempt to the circuit breaker

use crate::config::HttpConfig;
use crate::crawler::breaker::CircuitBreaker;
use crate::crawler::retry::{parse_retry_after, AttemptFailure, RetryPolicy};
use crate::proxy::ProxyProvider;
use crate::url::HostGuard;
use crate::FetchError;
use futures_util::StreamExt;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderValue, ACCEPT, ACCEPT_LANGUAGE, LOCATION, RETRY_AFTER, USER_AGENT};
use reqwest::{redirect, Client, Proxy, Response, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// Browser user agents rotated per attempt when no fixed agent is configured
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// The URL that was requested
        url: Url,
        /// Final URL after redirects; links on the page resolve against it
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// The URL was given up on
    Failed { url: Url, error: FetchError },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A successful single attempt
struct Fetched {
    final_url: Url,
    status_code: u16,
    body: String,
}

/// A failed single attempt, with any server-requested wait
struct Failure {
    kind: AttemptFailure,
    retry_after: Option<Duration>,
}

impl From<AttemptFailure> for Failure {
    fn from(kind: AttemptFailure) -> Self {
        Self {
            kind,
            retry_after: None,
        }
    }
}

/// Fetches pages with retries, proxies and breaker accounting
pub struct Fetcher {
    /// Client for direct requests
    client: Client,

    /// Clients keyed by proxy URL, built on first use
    proxied: Mutex<HashMap<String, Client>>,

    provider: Arc<dyn ProxyProvider>,
    breaker: Arc<CircuitBreaker>,

    /// Checks every redirect target before it is requested
    guard: Arc<HostGuard>,

    policy: RetryPolicy,
    timeout: Duration,
    user_agent: Option<String>,
    max_body_size: usize,
}

impl Fetcher {
    /// Builds a fetcher from HTTP settings
    ///
    /// # Arguments
    ///
    /// * `config` - Timeout, retry, body size and user-agent settings
    /// * `provider` - Supplies the transport for each attempt
    /// * `breaker` - Receives one report per physical attempt
    /// * `guard` - Refuses redirects into loopback or private hosts
    pub fn new(
        config: &HttpConfig,
        provider: Arc<dyn ProxyProvider>,
        breaker: Arc<CircuitBreaker>,
        guard: Arc<HostGuard>,
    ) -> Result<Self, reqwest::Error> {
        let timeout = config.timeout();
        let client = build_http_client(timeout, None)?;

        Ok(Self {
            client,
            proxied: Mutex::new(HashMap::new()),
            provider,
            breaker,
            guard,
            policy: RetryPolicy::from_config(config),
            timeout,
            user_agent: config.user_agent.clone(),
            max_body_size: config.max_body_size,
        })
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Connection failure | Retry with backoff |
    /// | Timeout | Retry with backoff |
    /// | HTTP 5xx | Retry with backoff |
    /// | HTTP 429 | Retry after `Retry-After`, or backoff |
    /// | Other HTTP 4xx | Fail immediately |
    /// | Refused redirect | Fail immediately |
    /// | Breaker open | Fail immediately, no further attempts or sleeps |
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let max_attempts = self.policy.max_attempts();
        let mut last_status = None;

        for attempt in 1..=max_attempts {
            if let Err(source) = self.breaker.check() {
                return self.failed(
                    url,
                    FetchError::CircuitOpen {
                        url: url.to_string(),
                        source,
                    },
                );
            }

            let outcome = self.attempt(url).await;
            match outcome {
                Ok(fetched) => {
                    self.breaker.record_success();
                    return FetchResult::Success {
                        url: url.clone(),
                        final_url: fetched.final_url,
                        status_code: fetched.status_code,
                        body: fetched.body,
                    };
                }
                Err(failure) => {
                    self.breaker.record_failure();
                    if let Some(status) = failure.kind.status() {
                        last_status = Some(status);
                    }

                    if !failure.kind.is_retryable() {
                        tracing::debug!("Not retrying {}: {}", url, failure.kind);
                        return self.failed(url, terminal_error(url, &failure.kind));
                    }

                    if !self.policy.should_retry(&failure.kind, attempt) {
                        break;
                    }

                    let delay = match failure.retry_after {
                        Some(delay) => delay,
                        None => self.policy.backoff_delay(attempt),
                    };
                    tracing::warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:.1}s",
                        attempt,
                        max_attempts,
                        url,
                        failure.kind,
                        delay.as_secs_f64()
                    );

                    if let Err(source) = self.breaker.check() {
                        return self.failed(
                            url,
                            FetchError::CircuitOpen {
                                url: url.to_string(),
                                source,
                            },
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.failed(
            url,
            FetchError::ExhaustedRetries {
                url: url.to_string(),
                attempts: max_attempts,
                last_status,
            },
        )
    }

    /// One physical request, following redirects by hand
    async fn attempt(&self, url: &Url) -> Result<Fetched, Failure> {
        let transport = self.provider.for_request(url);
        let client = self.client_for(transport.proxy.as_deref()).map_err(|e| {
            AttemptFailure::Connection(format!("proxy setup failed: {}", describe_error(e)))
        })?;
        let user_agent = self.pick_user_agent();

        let mut current = transport.request_url.clone();
        let mut redirects = 0;
        let response = loop {
            let response = client
                .get(current.clone())
                .header(USER_AGENT, user_agent.as_str())
                .header(
                    ACCEPT,
                    HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
                )
                .header(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"))
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| Failure::from(classify_error(e)))?;

            let Some(next) = redirect_target(&current, &response) else {
                break response;
            };

            if redirects >= MAX_REDIRECTS {
                return Err(AttemptFailure::Redirect(format!(
                    "more than {} redirects",
                    MAX_REDIRECTS
                ))
                .into());
            }

            if !self.guard.is_allowed(&next).await {
                let host = next.host_str().unwrap_or_default().to_string();
                tracing::warn!("Refusing redirect from {} to internal host {}", url, host);
                return Err(AttemptFailure::Redirect(format!("internal host {}", host)).into());
            }

            tracing::debug!("Following redirect for {} to {}", url, next);
            redirects += 1;
            current = next;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Failure {
                kind: AttemptFailure::Status(status.as_u16()),
                retry_after: self.retry_after(&response, status),
            });
        }

        // API-style providers answer from their own endpoint; keep the target URL then
        let final_url = if transport.request_url == *url {
            current
        } else {
            url.clone()
        };
        let body = read_body(response, self.max_body_size, url)
            .await
            .map_err(Failure::from)?;

        Ok(Fetched {
            final_url,
            status_code: status.as_u16(),
            body,
        })
    }

    fn retry_after(&self, response: &Response, status: StatusCode) -> Option<Duration> {
        if status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, self.policy.max_delay()))
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
        let Some(proxy) = proxy else {
            return Ok(self.client.clone());
        };

        let mut clients = self.proxied.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_http_client(self.timeout, Some(proxy))?;
        clients.insert(proxy.to_string(), client.clone());
        Ok(client)
    }

    fn pick_user_agent(&self) -> String {
        match &self.user_agent {
            Some(agent) => agent.clone(),
            None => USER_AGENTS
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(USER_AGENTS[0])
                .to_string(),
        }
    }

    fn failed(&self, url: &Url, error: FetchError) -> FetchResult {
        if error.is_circuit_open() {
            tracing::debug!("{}", error);
        } else {
            tracing::warn!("{}", error);
        }
        FetchResult::Failed {
            url: url.clone(),
            error,
        }
    }
}

/// Builds an HTTP client
///
/// Redirects are not followed by the client; the fetcher follows them itself
/// so each hop passes the SSRF guard.
fn build_http_client(timeout: Duration, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(redirect::Policy::none())
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// The next URL to request if `response` is a followable redirect
fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let status = response.status();
    let followable = matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    );
    if !followable {
        return None;
    }

    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let next = current.join(location.trim()).ok()?;
    match next.scheme() {
        "http" | "https" => Some(next),
        _ => None,
    }
}

/// Reads at most `limit` bytes of the body
async fn read_body(response: Response, limit: usize, url: &Url) -> Result<String, AttemptFailure> {
    let mut stream = response.bytes_stream();
    let mut body = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify_error)?;
        let room = limit - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            tracing::warn!("Body of {} exceeds {} bytes, truncated", url, limit);
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn classify_error(error: reqwest::Error) -> AttemptFailure {
    if error.is_timeout() {
        AttemptFailure::Timeout
    } else {
        AttemptFailure::Connection(describe_error(error))
    }
}

/// Error text without the request URL, which may carry provider credentials
fn describe_error(error: reqwest::Error) -> String {
    let error = error.without_url();
    match std::error::Error::source(&error) {
        Some(source) => format!("{}: {}", error, source),
        None => error.to_string(),
    }
}

fn terminal_error(url: &Url, failure: &AttemptFailure) -> FetchError {
    match failure {
        AttemptFailure::Status(status) => FetchError::HttpStatus {
            url: url.to_string(),
            status: *status,
        },
        AttemptFailure::Timeout => FetchError::Timeout {
            url: url.to_string(),
        },
        AttemptFailure::Connection(message) => FetchError::Connection {
            url: url.to_string(),
            message: message.clone(),
        },
        AttemptFailure::Redirect(reason) => FetchError::Redirect {
            url: url.to_string(),
            reason: reason.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::proxy::{NoProxy, TransportConfig};
    use crate::url::guard::tests::StaticResolver;
    use std::sync::atomic::Ordering;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_config(max_retries: u32) -> HttpConfig {
        HttpConfig {
            max_retries,
            base_delay: 0.01,
            max_backoff: 0.05,
            timeout: 5.0,
            user_agent: None,
            max_body_size: 1024 * 1024,
        }
    }

    fn breaker(threshold: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            enabled: true,
            threshold,
            failure_rate: 1.0,
            min_requests: 1000,
        }))
    }

    fn fetcher(max_retries: u32, breaker: Arc<CircuitBreaker>) -> Fetcher {
        guarded_fetcher(max_retries, breaker, HostGuard::new(false))
    }

    fn guarded_fetcher(max_retries: u32, breaker: Arc<CircuitBreaker>, guard: HostGuard) -> Fetcher {
        Fetcher::new(
            &http_config(max_retries),
            Arc::new(NoProxy),
            breaker,
            Arc::new(guard),
        )
        .unwrap()
    }

    fn redirect_to(location: &str) -> ResponseTemplate {
        ResponseTemplate::new(302).insert_header("Location", location)
    }

    /// Routes every request through an API endpoint that carries a secret key
    struct KeyedApi;

    impl ProxyProvider for KeyedApi {
        fn for_request(&self, url: &Url) -> TransportConfig {
            let mut request_url = Url::parse("http://127.0.0.1:9/").unwrap();
            request_url
                .query_pairs_mut()
                .append_pair("api_key", "TOPSECRETKEY")
                .append_pair("url", url.as_str());
            TransportConfig {
                request_url,
                proxy: None,
            }
        }

        fn name(&self) -> &'static str {
            "keyed_api"
        }
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let breaker = breaker(10);
        let result = fetcher(3, breaker.clone()).fetch(&url(&server, "/page")).await;

        match result {
            FetchResult::Success {
                status_code, body, ..
            } => {
                assert_eq!(status_code, 200);
                assert_eq!(body, "<p>hello</p>");
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(breaker.snapshot().total_requests, 1);
    }

    #[tokio::test]
    async fn test_404_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let breaker = breaker(10);
        let result = fetcher(3, breaker.clone()).fetch(&url(&server, "/missing")).await;

        match result {
            FetchResult::Failed { error, .. } => {
                assert!(matches!(error, FetchError::HttpStatus { status: 404, .. }));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(breaker.snapshot().total_failures, 1);
    }

    #[tokio::test]
    async fn test_5xx_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let breaker = breaker(10);
        let result = fetcher(2, breaker.clone()).fetch(&url(&server, "/flaky")).await;

        match result {
            FetchResult::Failed { error, .. } => {
                assert!(matches!(
                    error,
                    FetchError::ExhaustedRetries {
                        attempts: 3,
                        last_status: Some(503),
                        ..
                    }
                ));
                assert_eq!(error.status_code(), Some(503));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        // One report per physical attempt
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.total_failures, 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recover"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recover"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let breaker = breaker(10);
        let result = fetcher(3, breaker.clone()).fetch(&url(&server, "/recover")).await;

        assert!(result.is_success());
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.total_failures, 1);
        assert_eq!(snapshot.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_429_respects_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let result = fetcher(1, breaker(10)).fetch(&url(&server, "/limited")).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_open_breaker_stops_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let breaker = breaker(2);
        let result = fetcher(5, breaker.clone()).fetch(&url(&server, "/down")).await;

        match result {
            FetchResult::Failed { error, .. } => assert!(error.is_circuit_open()),
            other => panic!("expected circuit open, got {:?}", other),
        }
        assert_eq!(breaker.snapshot().total_requests, 2);
    }

    #[tokio::test]
    async fn test_fixed_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(wiremock::matchers::header("user-agent", "sitechunk-test/1.0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = HttpConfig {
            user_agent: Some("sitechunk-test/1.0".to_string()),
            ..http_config(0)
        };
        let fetcher = Fetcher::new(
            &config,
            Arc::new(NoProxy),
            breaker(10),
            Arc::new(HostGuard::new(false)),
        )
        .unwrap();
        assert!(fetcher.fetch(&url(&server, "/ua")).await.is_success());
    }

    #[tokio::test]
    async fn test_connection_failure_classified() {
        let fetcher = fetcher(0, breaker(10));
        // Port 9 on localhost is not listening in test environments
        let result = fetcher
            .fetch(&Url::parse("http://127.0.0.1:9/").unwrap())
            .await;
        match result {
            FetchResult::Failed { error, .. } => {
                assert!(matches!(
                    error,
                    FetchError::ExhaustedRetries {
                        attempts: 1,
                        last_status: None,
                        ..
                    }
                ));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_terminal_error_mapping() {
        let url = Url::parse("https://example.com/").unwrap();
        assert!(matches!(
            terminal_error(&url, &AttemptFailure::Status(403)),
            FetchError::HttpStatus { status: 403, .. }
        ));
        assert!(matches!(
            terminal_error(&url, &AttemptFailure::Timeout),
            FetchError::Timeout { .. }
        ));
        assert!(matches!(
            terminal_error(&url, &AttemptFailure::Redirect("loop".to_string())),
            FetchError::Redirect { .. }
        ));
    }

    #[tokio::test]
    async fn test_relative_redirect_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(redirect_to("/new"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .expect(1)
            .mount(&server)
            .await;

        let breaker = breaker(10);
        let result = fetcher(0, breaker.clone()).fetch(&url(&server, "/old")).await;

        match result {
            FetchResult::Success {
                url: requested,
                final_url,
                body,
                ..
            } => {
                assert_eq!(requested.path(), "/old");
                assert_eq!(final_url.path(), "/new");
                assert_eq!(body, "moved");
            }
            other => panic!("expected success, got {:?}", other),
        }
        // The whole redirect chain is one attempt
        assert_eq!(breaker.snapshot().total_requests, 1);
    }

    #[tokio::test]
    async fn test_redirect_to_loopback_refused() {
        let public = MockServer::start().await;
        let internal = MockServer::start().await;
        let target = format!("http://127.0.0.1:{}/secret", internal.address().port());

        Mock::given(method("GET"))
            .and(path("/go"))
            .respond_with(redirect_to(&target))
            .expect(1)
            .mount(&public)
            .await;
        Mock::given(method("GET"))
            .and(path("/secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("metadata"))
            .expect(0)
            .mount(&internal)
            .await;

        let fetcher = guarded_fetcher(3, breaker(10), HostGuard::new(true));
        let result = fetcher.fetch(&url(&public, "/go")).await;

        match result {
            FetchResult::Failed { error, .. } => {
                assert!(matches!(error, FetchError::Redirect { .. }));
                assert!(error.to_string().contains("127.0.0.1"));
            }
            other => panic!("expected refused redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redirect_to_name_resolving_internally_refused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/go"))
            .respond_with(redirect_to("http://internal.test/admin"))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = Arc::new(StaticResolver::default().with("internal.test", "10.0.0.5"));
        let guard = HostGuard::with_resolver(true, resolver.clone());
        let result = guarded_fetcher(0, breaker(10), guard)
            .fetch(&url(&server, "/go"))
            .await;

        match result {
            FetchResult::Failed { error, .. } => {
                assert!(matches!(error, FetchError::Redirect { .. }));
            }
            other => panic!("expected refused redirect, got {:?}", other),
        }
        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(redirect_to("/loop"))
            .expect(MAX_REDIRECTS as u64 + 1)
            .mount(&server)
            .await;

        let result = fetcher(2, breaker(10)).fetch(&url(&server, "/loop")).await;
        match result {
            FetchResult::Failed { error, .. } => {
                assert!(matches!(error, FetchError::Redirect { .. }));
            }
            other => panic!("expected redirect failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_error_hides_request_url() {
        let fetcher = Fetcher::new(
            &http_config(0),
            Arc::new(KeyedApi),
            breaker(10),
            Arc::new(HostGuard::new(false)),
        )
        .unwrap();
        let target = Url::parse("https://example.com/page").unwrap();

        let failure = match fetcher.attempt(&target).await {
            Err(failure) => failure,
            Ok(_) => panic!("port 9 should refuse connections"),
        };
        assert!(matches!(failure.kind, AttemptFailure::Connection(_)));
        let text = failure.kind.to_string();
        assert!(!text.contains("TOPSECRETKEY"), "leaked key: {}", text);
        assert!(!text.contains("api_key"), "leaked query: {}", text);

        let error = terminal_error(&target, &failure.kind);
        assert!(!error.to_string().contains("TOPSECRETKEY"));
    }

    #[tokio::test]
    async fn test_long_body_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(5000)))
            .expect(1)
            .mount(&server)
            .await;

        let config = HttpConfig {
            max_body_size: 100,
            ..http_config(0)
        };
        let fetcher = Fetcher::new(
            &config,
            Arc::new(NoProxy),
            breaker(10),
            Arc::new(HostGuard::new(false)),
        )
        .unwrap();

        match fetcher.fetch(&url(&server, "/big")).await {
            FetchResult::Success { body, .. } => assert_eq!(body, "x".repeat(100)),
            other => panic!("expected success, got {:?}", other),
        }
    }
}
