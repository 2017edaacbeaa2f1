// Exponential backoff for transient PokeAPI failures
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently to re-send a failed request
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// The first failure is final
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based): 1s, 2s, 4s... capped at `max_delay_ms`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(ms.min(self.max_delay_ms as f64) as u64)
    }
}

/// Run `operation` until it succeeds, fails for good, or retries run out.
///
/// `should_retry` decides whether an error is worth another attempt; a 404 for
/// an unknown name or a body that won't parse comes back on the first try.
pub async fn with_retry<F, Fut, T, E, R>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut retry = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if retry > 0 {
                    debug!("Succeeded on retry {}", retry);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !should_retry(&err) || retry >= config.max_retries {
            if retry > 0 {
                warn!("Giving up after {} retries: {}", retry, err);
            }
            return Err(err);
        }

        retry += 1;
        let delay = config.delay_for(retry);
        warn!(
            "{} (retry {}/{} in {:?})",
            err, retry, config.max_retries, delay
        );
        tokio::time::sleep(delay).await;
    }
}

/// 5xx, 408 and 429 mean "try again later"
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error()
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times with `message`, then returns the attempt count
    async fn flaky(calls: &AtomicU32, failures: u32, message: &'static str) -> Result<u32, &'static str> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(message)
        } else {
            Ok(n)
        }
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        assert_eq!(config.delay_for(10), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = with_retry(&RetryConfig::default(), || flaky(&calls, 2, "503"), |_| true).await;

        assert_eq!(result, Ok(3));
        // 1s + 2s of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_retries_run_out() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 2,
            ..RetryConfig::default()
        };

        let result = with_retry(&config, || flaky(&calls, u32::MAX, "503"), |_| true).await;

        assert_eq!(result, Err("503"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result = with_retry(
            &RetryConfig::default(),
            || flaky(&calls, u32::MAX, "404"),
            |err| *err != "404",
        )
        .await;

        assert_eq!(result, Err("404"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_tries_once() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryConfig::none(), || flaky(&calls, 1, "503"), |_| true).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retryable_statuses() {
        use reqwest::StatusCode;
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::REQUEST_TIMEOUT,
        ] {
            assert!(is_retryable_status(status), "{}", status);
        }
        for status in [StatusCode::NOT_FOUND, StatusCode::BAD_REQUEST] {
            assert!(!is_retryable_status(status), "{}", status);
        }
    }
}
