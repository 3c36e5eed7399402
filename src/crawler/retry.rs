//! Retry classification and exponential backoff
//!
//! One logical fetch is up to `max_retries + 1` physical attempts. After the
//! k-th failed attempt (k >= 1) the fetcher sleeps
//!
//! ```text
//! delay = min(base_delay * 2^(k-1) + jitter, max_delay)
//! ```
//!
//! where `jitter` is uniform in `[0, min(base_delay, 1s))`. A 429 response
//! carrying `Retry-After` overrides the computed delay for that attempt.

use crate::config::HttpConfig;
use rand::Rng;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Upper bound on the jitter added to a backoff delay
const MAX_JITTER: Duration = Duration::from_secs(1);

/// Why a single physical attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// DNS, connect, TLS or body-read failure
    Connection(String),

    /// The request exceeded the configured timeout
    Timeout,

    /// The server answered with a non-success status
    Status(u16),

    /// A redirect was not followed
    Redirect(String),
}

impl AttemptFailure {
    /// Returns true if another attempt may succeed
    ///
    /// | Failure | Retried |
    /// |---------|---------|
    /// | Connection | yes |
    /// | Timeout | yes |
    /// | 429 | yes |
    /// | 5xx | yes |
    /// | other 4xx | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Status(status) => *status == 429 || (500..600).contains(status),
            Self::Redirect(_) => false,
        }
    }

    /// The HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(status) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(message) => write!(f, "connection failed: {}", message),
            Self::Timeout => f.write_str("timed out"),
            Self::Status(status) => write!(f, "HTTP {}", status),
            Self::Redirect(reason) => write!(f, "redirect refused: {}", reason),
        }
    }
}

/// Retry limits and backoff parameters for the fetcher
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(config.max_retries, config.base_delay(), config.max_backoff())
    }

    /// Total physical attempts allowed for one URL
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns true if `failure` on attempt number `attempt` (1-indexed) should be retried
    pub fn should_retry(&self, failure: &AttemptFailure, attempt: u32) -> bool {
        failure.is_retryable() && attempt < self.max_attempts()
    }

    /// Delay to sleep after the `retry`-th failure (1-indexed)
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.delay_with_jitter(retry, self.jitter())
    }

    fn delay_with_jitter(&self, retry: u32, jitter: Duration) -> Duration {
        let exponent = retry.saturating_sub(1).min(62) as i32;
        let exponential = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        let total = exponential + jitter.as_secs_f64();
        Duration::from_secs_f64(total.min(self.max_delay.as_secs_f64()))
    }

    fn jitter(&self) -> Duration {
        let cap = self.base_delay.min(MAX_JITTER);
        if cap.is_zero() {
            return Duration::ZERO;
        }
        let micros = rand::thread_rng().gen_range(0..cap.as_micros() as u64);
        Duration::from_micros(micros)
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts integer seconds or an HTTP date. The result is capped at `cap`;
/// dates in the past yield zero. Returns `None` for unparseable values.
pub fn parse_retry_after(value: &str, cap: Duration) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<i64>() {
        if seconds < 0 {
            tracing::debug!("Ignoring negative Retry-After value {}", seconds);
            return None;
        }
        return Some(Duration::from_secs(seconds as u64).min(cap));
    }

    let when = httpdate::parse_http_date(value).ok()?;
    let delay = when
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Some(delay.min(cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(60))
    }

    #[test]
    fn test_retryable_failures() {
        assert!(AttemptFailure::Connection("refused".to_string()).is_retryable());
        assert!(AttemptFailure::Timeout.is_retryable());
        assert!(AttemptFailure::Status(429).is_retryable());
        assert!(AttemptFailure::Status(500).is_retryable());
        assert!(AttemptFailure::Status(503).is_retryable());
        assert!(!AttemptFailure::Redirect("too many redirects".to_string()).is_retryable());
    }

    #[test]
    fn test_terminal_client_errors() {
        for status in [400, 401, 403, 404, 410, 451] {
            assert!(
                !AttemptFailure::Status(status).is_retryable(),
                "{} should not be retried",
                status
            );
        }
    }

    #[test]
    fn test_max_attempts() {
        assert_eq!(policy().max_attempts(), 6);
        let none = RetryPolicy::new(0, Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(none.max_attempts(), 1);
        assert!(!none.should_retry(&AttemptFailure::Timeout, 1));
    }

    #[test]
    fn test_should_retry_stops_at_limit() {
        let policy = policy();
        assert!(policy.should_retry(&AttemptFailure::Status(503), 1));
        assert!(policy.should_retry(&AttemptFailure::Status(503), 5));
        assert!(!policy.should_retry(&AttemptFailure::Status(503), 6));
        assert!(!policy.should_retry(&AttemptFailure::Status(404), 1));
    }

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let policy = policy();
        assert_eq!(policy.delay_with_jitter(1, Duration::ZERO), Duration::from_secs(1));
        assert_eq!(policy.delay_with_jitter(2, Duration::ZERO), Duration::from_secs(2));
        assert_eq!(policy.delay_with_jitter(3, Duration::ZERO), Duration::from_secs(4));
        assert_eq!(policy.delay_with_jitter(4, Duration::ZERO), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = policy();
        assert_eq!(policy.delay_with_jitter(7, Duration::ZERO), Duration::from_secs(60));
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(60));
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(60));
        for _ in 0..100 {
            let delay = policy.backoff_delay(2);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay < Duration::from_millis(600));
        }
    }

    #[test]
    fn test_max_delay_never_below_base() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(policy.max_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let cap = Duration::from_secs(60);
        assert_eq!(parse_retry_after("7", cap), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(" 0 ", cap), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("3600", cap), Some(cap));
        assert_eq!(parse_retry_after("-5", cap), None);
        assert_eq!(parse_retry_after("soon", cap), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let cap = Duration::from_secs(60);
        let past = "Wed, 21 Oct 2015 07:28:00 GMT";
        assert_eq!(parse_retry_after(past, cap), Some(Duration::ZERO));

        let future = httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(30));
        let delay = parse_retry_after(&future, cap).unwrap();
        assert!(delay <= Duration::from_secs(30));
        assert!(delay >= Duration::from_secs(28));
    }
}
