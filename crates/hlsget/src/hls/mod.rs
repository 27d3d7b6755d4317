// HLS download pipeline: parse -> resolve key -> fetch in batches -> merge

pub mod config;
pub mod coordinator;
pub mod decryption;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod output;
pub mod playlist;
pub mod retry;
pub mod scheduler;
#[cfg(test)]
mod test_support;
pub mod transport;

// Re-exports for easier access
pub use config::{HlsConfig, HlsConfigBuilder};
pub use coordinator::{HlsPipeline, RunSummary};
pub use error::HlsDownloaderError;
pub use events::{OnEvent, PipelineEvent, RunState};
pub use output::MergeStrategy;
pub use playlist::{EncryptionInfo, Playlist, parse_playlist};
pub use transport::{HttpTransport, ReqwestTransport};
