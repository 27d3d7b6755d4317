use clap::Parser;
use hlsget_engine::{MergeStrategy, ProxyType};
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Resumable HLS (M3U8) downloader",
    long_about = "Downloads every segment of an HLS playlist with bounded concurrency,\n\
                  decrypts AES-128 segments, and merges them into a single .ts file.\n\
                  \n\
                  The playlist can be a URL or a local .m3u8 file. Settings are read from\n\
                  a JSON configuration file and can be overridden on the command line.\n\
                  Interrupted runs resume: segments already on disk are not downloaded again."
)]
pub struct CliArgs {
    /// Playlist URL or local playlist file
    #[arg(help = "Playlist URL or path to a local .m3u8 file (overrides video.url)")]
    pub input: Option<String>,

    /// JSON configuration file
    #[arg(
        short,
        long,
        default_value = "config.json",
        help = "Path to the JSON configuration file (ignored when the default file is absent)"
    )]
    pub config: PathBuf,

    /// Output directory for segments and the merged file
    #[arg(
        short,
        long,
        help = "Directory where segments and the merged file are written (overrides download_path)"
    )]
    pub output_dir: Option<PathBuf>,

    /// Output file name without extension
    #[arg(
        short = 'n',
        long = "name",
        help = "Name of the merged file, without the .ts extension (default: derived from the input)"
    )]
    pub output_name: Option<String>,

    /// Prefix for relative playlist references
    #[arg(
        long,
        help = "Base URL prepended to relative segment and key references"
    )]
    pub base_url: Option<String>,

    /// Number of concurrent segment downloads
    #[arg(
        long,
        help = "Maximum number of concurrent segment downloads (overrides thread_count)"
    )]
    pub concurrency: Option<usize>,

    /// Attempts per segment
    #[arg(
        long,
        help = "Number of download attempts per segment, the first one included (overrides retry_count)"
    )]
    pub retries: Option<u32>,

    /// Overall timeout in seconds
    #[arg(
        long,
        help = "Overall timeout in seconds for HTTP requests, 0 for none (overrides timeout_seconds)"
    )]
    pub timeout: Option<u64>,

    /// User agent for every request
    #[arg(long, help = "User-Agent header sent with every request")]
    pub user_agent: Option<String>,

    /// Proxy address (host:port or URL)
    #[arg(
        long,
        help = "Proxy server for downloads (e.g., \"127.0.0.1:1080\" or \"http://proxy:8080\")"
    )]
    pub proxy: Option<String>,

    /// Proxy type
    #[arg(
        long,
        value_enum,
        help = "Proxy type (default: the configuration file's proxy.type, else http)"
    )]
    pub proxy_type: Option<ProxyType>,

    /// Disable all proxy settings for downloads
    #[arg(
        long,
        help = "Disable all proxy settings (configuration file and system proxy)"
    )]
    pub no_proxy: bool,

    /// Skip TLS certificate verification
    #[arg(
        long,
        help = "Accept invalid TLS certificates (insecure, use only for trusted hosts)"
    )]
    pub insecure: bool,

    /// Custom HTTP headers for download requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Keep segment files after merging
    #[arg(
        long,
        help = "Keep segment files after merging so a rerun downloads nothing"
    )]
    pub keep_segments: bool,

    /// Merge into a temporary file and rename on success
    #[arg(
        long,
        help = "Merge into a .part file and keep all segments if merging fails"
    )]
    pub transactional_merge: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Show progress bars for operations
    #[arg(
        short = 'P',
        long = "progress",
        default_value = "false",
        help = "Show a progress bar while segments download"
    )]
    pub show_progress: bool,
}

impl CliArgs {
    pub fn merge_strategy(&self) -> MergeStrategy {
        if self.transactional_merge {
            MergeStrategy::Transactional
        } else {
            MergeStrategy::BestEffort
        }
    }
}
