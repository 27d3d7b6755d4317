//! # hlsget
//!
//! A library for downloading HLS (M3U8) video-on-demand playlists into a
//! single output file.
//!
//! ## Features
//!
//! - Minimal M3U8 parsing with `#EXT-X-KEY` AES-128 metadata
//! - Batched, bounded-concurrency segment downloads with fixed-interval retries
//! - Resumable runs: completed segment files are never fetched twice
//! - Chunked AES-128-CBC decryption with PKCS#7 padding validation
//! - Ordered reassembly with best-effort or transactional merge

pub mod builder;
pub mod config;
pub mod downloader;
pub mod error;
pub mod hls;
pub mod proxy;

pub use builder::DownloaderConfigBuilder;
pub use config::DownloaderConfig;
pub use error::DownloadError;

// Re-export downloader utilities
pub use downloader::create_client;

// Re-export the pipeline entry points
pub use hls::{
    HlsConfig, HlsConfigBuilder, HlsDownloaderError, HlsPipeline, MergeStrategy, OnEvent,
    PipelineEvent, RunState, RunSummary,
};

// Re-export proxy utilities
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
