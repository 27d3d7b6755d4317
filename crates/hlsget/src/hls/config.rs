use std::path::PathBuf;
use std::time::Duration;

use crate::DownloaderConfig;
use crate::hls::output::MergeStrategy;

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    /// Base downloader configuration
    pub base: DownloaderConfig,
    pub playlist_config: HlsPlaylistConfig,
    pub scheduler_config: HlsSchedulerConfig,
    pub fetcher_config: HlsFetcherConfig,
    pub decryption_config: HlsDecryptionConfig,
    pub output_config: HlsOutputConfig,
}

// --- Playlist Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsPlaylistConfig {
    /// Prefix joined onto relative segment and key references.
    /// When unset, the network flow derives it from the playlist URL.
    pub base_url: Option<String>,
}

// --- Scheduler Configuration ---
#[derive(Debug, Clone)]
pub struct HlsSchedulerConfig {
    pub download_concurrency: usize, // Batch size, and the cap on in-flight fetches
}

impl Default for HlsSchedulerConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 4,
        }
    }
}

// --- Fetcher Configuration ---
#[derive(Debug, Clone)]
pub struct HlsFetcherConfig {
    /// Total attempts per segment, the first one included
    pub max_segment_retries: u32,
    pub segment_retry_delay: Duration, // Fixed interval, never exponential
}

impl Default for HlsFetcherConfig {
    fn default() -> Self {
        Self {
            max_segment_retries: 3,
            segment_retry_delay: Duration::from_secs(3),
        }
    }
}

// --- Decryption Configuration ---
#[derive(Debug, Clone)]
pub struct HlsDecryptionConfig {
    pub read_chunk_size: usize, // Read buffer size while decrypting a segment file
}

impl Default for HlsDecryptionConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 64 * 1024,
        }
    }
}

// --- Output Configuration ---
#[derive(Debug, Clone)]
pub struct HlsOutputConfig {
    /// Directory holding the segment files and the merged output
    pub download_path: PathBuf,
    pub merge_strategy: MergeStrategy,
    /// Leave segment files on disk after merging
    pub keep_segments: bool,
}

impl Default for HlsOutputConfig {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("downloads"),
            merge_strategy: MergeStrategy::default(),
            keep_segments: false,
        }
    }
}

impl HlsConfig {
    pub fn builder() -> HlsConfigBuilder {
        HlsConfigBuilder::new()
    }
}

/// Builder for HLS pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct HlsConfigBuilder {
    config: HlsConfig,
}

impl HlsConfigBuilder {
    /// Create a new HLS config builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HlsConfig::default(),
        }
    }

    pub fn with_base_config(mut self, base_config: DownloaderConfig) -> Self {
        self.config.base = base_config;
        self
    }

    // --- HLS PlaylistConfig methods ---

    /// Set the prefix for relative playlist references.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.config.playlist_config.base_url = if base_url.is_empty() {
            None
        } else {
            Some(base_url)
        };
        self
    }

    // --- HLS SchedulerConfig methods ---

    /// Set maximum concurrent segment downloads.
    pub fn download_concurrency(mut self, concurrency: usize) -> Self {
        self.config.scheduler_config.download_concurrency = concurrency;
        self
    }

    // --- HLS FetcherConfig methods ---

    /// Set the number of attempts for downloading a segment.
    pub fn segment_retry_count(mut self, retries: u32) -> Self {
        self.config.fetcher_config.max_segment_retries = retries;
        self
    }

    /// Set the fixed delay between segment download attempts.
    pub fn segment_retry_delay(mut self, delay: Duration) -> Self {
        self.config.fetcher_config.segment_retry_delay = delay;
        self
    }

    // --- HLS OutputConfig methods ---

    /// Set the working directory for segments and the merged output.
    pub fn download_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_config.download_path = path.into();
        self
    }

    /// Set how segments are merged into the output file.
    pub fn merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.config.output_config.merge_strategy = strategy;
        self
    }

    /// Keep segment files after a successful merge.
    pub fn keep_segments(mut self, keep: bool) -> Self {
        self.config.output_config.keep_segments = keep;
        self
    }

    pub fn build(self) -> HlsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = HlsConfig::default();
        assert_eq!(config.fetcher_config.max_segment_retries, 3);
        assert_eq!(config.fetcher_config.segment_retry_delay, Duration::from_secs(3));
        assert_eq!(config.scheduler_config.download_concurrency, 4);
        assert_eq!(config.output_config.merge_strategy, MergeStrategy::BestEffort);
        assert!(config.playlist_config.base_url.is_none());
    }

    #[test]
    fn empty_base_url_is_unset() {
        let config = HlsConfig::builder().base_url("").build();
        assert!(config.playlist_config.base_url.is_none());

        let config = HlsConfig::builder().base_url("http://h/p/").build();
        assert_eq!(config.playlist_config.base_url.as_deref(), Some("http://h/p/"));
    }
}
