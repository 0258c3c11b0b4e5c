use crate::timeout::DEFAULT_IDLE_TIMEOUT;
use std::time::Duration;

/// Default GraphQL HTTP endpoint.
pub const DEFAULT_HTTP_URL: &str = "http://127.0.0.1:8000/graphql/";

/// Default GraphQL WebSocket endpoint.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/graphql/";

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// GraphQL HTTP endpoint for listing & historical queries
    pub http_url: String,
    /// GraphQL WebSocket endpoint for the push subscription
    pub ws_url: String,
    /// Timeout applied to every HTTP query
    pub request_timeout: Duration,
    /// Ping interval to keep the push connection alive
    pub ping_interval: Duration,
    /// Delay before re-opening a dropped push subscription
    pub reconnect_delay: Duration,
    /// Push stream is considered dead after this long without any frame
    pub idle_timeout: Duration,
    /// Buffer size of the push update & fetch result channels
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            http_url: DEFAULT_HTTP_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            channel_buffer_size: 1000,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with custom endpoints
    pub fn new(http_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            http_url: http_url.into(),
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    /// Read endpoints from `SPREAD_HTTP_URL` & `SPREAD_WS_URL` (defaults otherwise)
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("SPREAD_HTTP_URL").unwrap_or_else(|_| DEFAULT_HTTP_URL.to_string()),
            std::env::var("SPREAD_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string()),
        )
    }

    /// Set HTTP request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set push stream idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = FeedConfig::new("https://spreads.local/graphql/", "wss://spreads.local/graphql/")
            .with_request_timeout(Duration::from_secs(3))
            .with_ping_interval(Duration::from_secs(15))
            .with_reconnect_delay(Duration::from_secs(5))
            .with_idle_timeout(Duration::from_secs(60))
            .with_channel_buffer_size(500);

        assert_eq!(config.http_url, "https://spreads.local/graphql/");
        assert_eq!(config.ws_url, "wss://spreads.local/graphql/");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.channel_buffer_size, 500);
    }

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.http_url, "http://127.0.0.1:8000/graphql/");
        assert_eq!(config.ws_url, "ws://127.0.0.1:8000/graphql/");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.channel_buffer_size, 1000);
    }
}
