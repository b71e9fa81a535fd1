//! Session client configuration
//!
//! Defaults are compile-time constants; the request timeout honors the
//! `TABLEBOUND_REQUEST_TIMEOUT_MS` environment override so deployments can
//! tune it without a rebuild.

use std::time::Duration;

use url::Url;

/// Default request timeout when the env override is absent.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

/// How often the scheduler fires registered background-sync triggers.
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Environment variable overriding the request timeout, in milliseconds.
pub const REQUEST_TIMEOUT_ENV: &str = "TABLEBOUND_REQUEST_TIMEOUT_MS";

/// Configuration for one [`SessionClient`](crate::SessionClient).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base for the session socket, e.g. `ws://play.example.com`.
    pub ws_base: Url,
    /// Base for the REST fallback endpoints, e.g. `http://play.example.com`.
    pub http_base: Url,
    /// Timeout applied to each REST request.
    pub request_timeout: Duration,
    /// Interval of the background-sync scheduler tick.
    pub sync_interval: Duration,
}

impl SessionConfig {
    pub fn new(ws_base: Url, http_base: Url) -> Self {
        Self {
            ws_base,
            http_base,
            request_timeout: request_timeout_from_env(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

fn request_timeout_from_env() -> Duration {
    std::env::var(REQUEST_TIMEOUT_ENV)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new(
            Url::parse("ws://localhost:8080").expect("ws url"),
            Url::parse("http://localhost:8080").expect("http url"),
        );
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert!(config.request_timeout >= Duration::from_secs(1));
    }
}
