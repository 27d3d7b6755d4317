use hlsget_engine::{
    DownloaderConfig, HlsConfig, MergeStrategy, ProxyConfig, ProxyType,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::error::AppError;
use crate::utils::{
    expand_name, extract_filename_from_path, extract_filename_from_url, is_url, parse_headers,
};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
const DEFAULT_DOWNLOAD_PATH: &str = "downloads";
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// On-disk JSON configuration. Every field is optional; the command line wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub download_path: Option<String>,
    pub thread_count: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub retry_count: Option<u32>,
    pub user_agent: Option<String>,
    pub proxy: ProxySection,
    pub video: VideoSection,
    /// `false` disables certificate verification
    pub tls_verify: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySection {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub proxy_type: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSection {
    pub url: String,
    pub baseurl: String,
    pub output_name: String,
}

impl FileConfig {
    /// Read `path`. A missing file is only an error when it is not the default one.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() && path == Path::new(DEFAULT_CONFIG_FILE) {
            info!("No {DEFAULT_CONFIG_FILE} found, using command line settings only");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| AppError::Config(format!("Invalid {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// Where the playlist comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistSource {
    Url(String),
    File(PathBuf),
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub source: PlaylistSource,
    pub output_name: String,
    pub download_path: PathBuf,
    pub base_url: Option<String>,
    pub concurrency: usize,
    pub retry_count: u32,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub headers: Vec<String>,
    pub proxy: Option<ProxyConfig>,
    pub use_system_proxy: bool,
    pub accept_invalid_certs: bool,
    pub merge_strategy: MergeStrategy,
    pub keep_segments: bool,
}

impl ProgramConfig {
    /// Merge the JSON file with command-line overrides and validate the result.
    pub fn resolve(args: &CliArgs, file: FileConfig) -> Result<Self, AppError> {
        let input = args
            .input
            .clone()
            .or_else(|| non_empty(&file.video.url))
            .ok_or_else(|| {
                AppError::Config(
                    "No playlist given: pass a URL or file, or set video.url".to_string(),
                )
            })?;

        let source = if is_url(&input) {
            PlaylistSource::Url(input)
        } else {
            PlaylistSource::File(PathBuf::from(input))
        };

        let derived = match &source {
            PlaylistSource::Url(url) => extract_filename_from_url(url)?,
            PlaylistSource::File(path) => extract_filename_from_path(path),
        };
        let output_name = match args
            .output_name
            .clone()
            .or_else(|| non_empty(&file.video.output_name))
        {
            Some(template) => expand_name(&template, &derived),
            None => derived,
        };

        let (proxy, use_system_proxy) = resolve_proxy(args, &file.proxy)?;

        let config = Self {
            source,
            output_name,
            download_path: args.output_dir.clone().unwrap_or_else(|| {
                PathBuf::from(
                    file.download_path
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DOWNLOAD_PATH.to_string()),
                )
            }),
            base_url: args
                .base_url
                .clone()
                .or_else(|| non_empty(&file.video.baseurl)),
            concurrency: args
                .concurrency
                .or(file.thread_count)
                .unwrap_or(DEFAULT_CONCURRENCY),
            retry_count: args
                .retries
                .or(file.retry_count)
                .unwrap_or(DEFAULT_RETRY_COUNT),
            timeout: Duration::from_secs(
                args.timeout
                    .or(file.timeout_seconds)
                    .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            ),
            user_agent: args
                .user_agent
                .clone()
                .or_else(|| file.user_agent.as_deref().and_then(non_empty)),
            headers: args.headers.clone(),
            proxy,
            use_system_proxy,
            accept_invalid_certs: args.insecure || file.tls_verify == Some(false),
            merge_strategy: args.merge_strategy(),
            keep_segments: args.keep_segments,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.concurrency == 0 {
            return Err(AppError::Config(
                "Concurrency (thread_count) must be at least 1".to_string(),
            ));
        }
        if self.retry_count == 0 {
            return Err(AppError::Config(
                "Retry count must be at least 1".to_string(),
            ));
        }
        if self.download_path.as_os_str().is_empty() {
            return Err(AppError::Config("Download path is empty".to_string()));
        }
        Ok(())
    }

    /// Engine configuration for this run.
    pub fn hls_config(&self) -> HlsConfig {
        let mut builder = DownloaderConfig::builder()
            .with_timeout(self.timeout)
            .with_connect_timeout(Duration::ZERO)
            .with_headers(parse_headers(&self.headers))
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        if let Some(user_agent) = &self.user_agent {
            builder = builder.with_user_agent(user_agent);
        }
        builder = match &self.proxy {
            Some(proxy) => builder.with_proxy(proxy.clone()),
            None => builder.with_system_proxy(self.use_system_proxy),
        };

        let mut hls = HlsConfig::builder()
            .with_base_config(builder.build())
            .download_path(&self.download_path)
            .download_concurrency(self.concurrency)
            .segment_retry_count(self.retry_count)
            .merge_strategy(self.merge_strategy)
            .keep_segments(self.keep_segments);
        if let Some(base_url) = &self.base_url {
            hls = hls.base_url(base_url);
        }
        hls.build()
    }
}

fn resolve_proxy(
    args: &CliArgs,
    section: &ProxySection,
) -> Result<(Option<ProxyConfig>, bool), AppError> {
    if args.no_proxy {
        info!("All proxy settings disabled (--no-proxy flag)");
        return Ok((None, false));
    }

    if let Some(address) = &args.proxy {
        let proxy_type = args.proxy_type.unwrap_or(ProxyType::Http);
        if address.trim().is_empty() {
            return Err(AppError::Config("Proxy address is empty".to_string()));
        }
        return Ok((
            Some(ProxyConfig {
                url: address.trim().to_string(),
                proxy_type,
                auth: None,
            }),
            false,
        ));
    }

    if section.enabled {
        if section.host.trim().is_empty() {
            return Err(AppError::Config(
                "Proxy is enabled but proxy.host is empty".to_string(),
            ));
        }
        if section.port == 0 {
            warn!(host = %section.host, "Proxy port is 0");
        }
        let proxy_type = args
            .proxy_type
            .unwrap_or_else(|| ProxyType::from_name(&section.proxy_type));
        return Ok((
            Some(ProxyConfig::from_host_port(
                proxy_type,
                &section.host,
                section.port,
            )),
            false,
        ));
    }

    Ok((None, true))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
