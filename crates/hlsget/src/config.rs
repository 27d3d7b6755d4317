use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::proxy::ProxyConfig;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Connect timeout used when no overall timeout is configured
const FALLBACK_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configurable options for the HTTP transport
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for the entire HTTP request (zero disables it)
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,

    /// Skip TLS certificate and hostname verification.
    ///
    /// Security relevant: only for endpoints with broken certificate chains.
    pub danger_accept_invalid_certs: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
            danger_accept_invalid_certs: false,
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> crate::builder::DownloaderConfigBuilder {
        crate::builder::DownloaderConfigBuilder::new()
    }

    /// Connect timeout actually applied to the client.
    ///
    /// Mirrors the overall timeout, falling back to 60 seconds when the overall
    /// timeout is disabled.
    pub fn effective_connect_timeout(&self) -> Duration {
        if !self.connect_timeout.is_zero() {
            self.connect_timeout
        } else if !self.timeout.is_zero() {
            self.timeout
        } else {
            FALLBACK_CONNECT_TIMEOUT
        }
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_timeout_falls_back() {
        let mut config = DownloaderConfig {
            timeout: Duration::ZERO,
            connect_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.effective_connect_timeout(), Duration::from_secs(60));

        config.timeout = Duration::from_secs(12);
        assert_eq!(config.effective_connect_timeout(), Duration::from_secs(12));

        config.connect_timeout = Duration::from_secs(5);
        assert_eq!(config.effective_connect_timeout(), Duration::from_secs(5));
    }
}
