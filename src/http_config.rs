//! HTTP client configuration module
//!
//! Centralized timeouts and retry policies for the clients that talk to the
//! remote event store.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Total request timeout
    pub timeout: Duration,
    /// Maximum number of attempts per request
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(45),
            max_retries: 3,
            base_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection reads issued by the polling listener
    pub fn firestore_listen() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            base_retry_delay: Duration::from_millis(1000),
            max_retry_delay: Duration::from_secs(20),
            backoff_multiplier: 2.0,
        }
    }

    /// Single-document writes; these are never retried
    pub fn firestore_write() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            max_retries: 1,
            base_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Build a reqwest client with this configuration
    pub fn build_client(&self) -> Result<Client, reqwest::Error> {
        ClientBuilder::new()
            .user_agent(concat!("eventlisting/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(2)
            .build()
    }

    pub fn to_retry_config(&self) -> crate::utils::retry::RetryConfig {
        crate::utils::retry::RetryConfig {
            max_attempts: self.max_retries,
            base_delay: self.base_retry_delay,
            max_delay: self.max_retry_delay,
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_preset_never_retries() {
        assert_eq!(HttpConfig::firestore_write().to_retry_config().max_attempts, 1);
    }

    #[test]
    fn test_listen_preset_retries() {
        let retry = HttpConfig::firestore_listen().to_retry_config();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_build_client() {
        assert!(HttpConfig::default().build_client().is_ok());
    }
}
