use reqwest::Proxy;
use serde::{Deserialize, Serialize};

/// Proxy configuration types
#[derive(Debug, Clone, PartialEq, Eq, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    /// HTTP proxy
    Http,
    /// HTTPS proxy
    Https,
    /// SOCKS5 proxy
    Socks5,
}

impl ProxyType {
    /// Map a proxy type name from a configuration file.
    ///
    /// Anything that is not `http` or `https` is treated as SOCKS5.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "http" => ProxyType::Http,
            "https" => ProxyType::Https,
            _ => ProxyType::Socks5,
        }
    }
}

/// Proxy authentication type
#[derive(Debug, Clone)]
pub struct ProxyAuth {
    /// Username for proxy authentication
    pub username: String,
    /// Password for proxy authentication
    pub password: String,
}

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    /// Type of proxy (HTTP, HTTPS, SOCKS5)
    pub proxy_type: ProxyType,
    /// Authentication for the proxy (optional)
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    /// Build a proxy configuration from a `{type, host, port}` descriptor.
    pub fn from_host_port(proxy_type: ProxyType, host: &str, port: u16) -> Self {
        Self {
            url: format!("{}:{port}", host.trim()),
            proxy_type,
            auth: None,
        }
    }
}

/// Build a reqwest Proxy object from our proxy configuration
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy, String> {
    let proxy_url = &config.url;

    // reqwest needs a scheme; bare host:port descriptors get one matching the type
    let mut proxy = match config.proxy_type {
        ProxyType::Http => {
            let url = with_scheme(proxy_url, &["http://"], "http://");
            Proxy::all(&url).map_err(|e| format!("Invalid HTTP proxy URL: {e}"))?
        }
        ProxyType::Https => {
            let url = with_scheme(proxy_url, &["https://", "http://"], "https://");
            Proxy::all(&url).map_err(|e| format!("Invalid HTTPS proxy URL: {e}"))?
        }
        ProxyType::Socks5 => {
            let url = with_scheme(proxy_url, &["socks5://", "socks5h://"], "socks5://");
            Proxy::all(&url).map_err(|e| format!("Invalid SOCKS5 proxy URL: {e}"))?
        }
    };

    // Add authentication if provided
    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}

fn with_scheme(url: &str, accepted: &[&str], default_scheme: &str) -> String {
    if accepted.iter().any(|scheme| url.starts_with(scheme)) {
        url.to_string()
    } else {
        format!("{default_scheme}{url}")
    }
}
