use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use log::{warn, info, debug};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// `max_attempts` is used up. The last error is returned unchanged.
pub async fn retry_with_exponential_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    operation: F,
) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = config.base_delay;
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("Operation succeeded on attempt {}", attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt >= max_attempts {
                    warn!("Operation failed after {} attempts: {}", max_attempts, e);
                    return Err(e);
                }

                if !is_transient_error(&e) {
                    debug!("Attempt {} failed with non-transient error, not retrying: {}", attempt, e);
                    return Err(e);
                }

                debug!("Attempt {} failed transiently, retrying in {:?}: {}", attempt, delay, e);
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(
                    Duration::from_millis((delay.as_millis() as f64 * config.backoff_multiplier) as u64),
                    config.max_delay,
                );
                attempt += 1;
            }
        }
    }
}

/// Markers of failures worth another attempt: transport trouble, HTTP
/// 429/5xx gateway statuses and the retryable Firestore status names.
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "temporar",
    "too many requests",
    "service unavailable",
    "bad gateway",
    "internal server error",
    "http 429",
    "http 500",
    "http 502",
    "http 503",
    "http 504",
    "unavailable",
    "deadline_exceeded",
    "resource_exhausted",
    "aborted",
];

pub fn is_transient_error<E: Display>(error: &E) -> bool {
    let text = error.to_string().to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| text.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retry_success_on_second_attempt() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result = retry_with_exponential_backoff(&fast_config(), || {
            let count_clone = attempt_count_clone.clone();
            async move {
                let count = count_clone.fetch_add(1, Ordering::SeqCst);
                if count == 0 {
                    Err(anyhow::anyhow!("Temporary failure"))
                } else {
                    Ok("success")
                }
            }
        }).await;

        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_non_transient_error() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<&str, _> = retry_with_exponential_backoff(&fast_config(), || {
            let count_clone = attempt_count_clone.clone();
            async move {
                count_clone.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("HTTP 403 Forbidden: permission denied"))
            }
        }).await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result: Result<(), _> = retry_with_exponential_backoff(&fast_config(), || {
            let count_clone = attempt_count_clone.clone();
            async move {
                count_clone.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("HTTP 503 Service Unavailable"))
            }
        }).await;

        assert!(result.unwrap_err().to_string().contains("503"));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient_error(&"Network error: connection reset"));
        assert!(is_transient_error(&"HTTP 429 Too Many Requests"));
        assert!(is_transient_error(&"HTTP 503: {\"status\": \"UNAVAILABLE\"}"));
        assert!(is_transient_error(&"RESOURCE_EXHAUSTED: quota"));
        assert!(!is_transient_error(&"HTTP 404 Not Found"));
        assert!(!is_transient_error(&"HTTP 403: PERMISSION_DENIED"));
    }
}
