use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, Clone)]
pub enum HlsDownloaderError {
    #[error("Not an M3U8 playlist: missing #EXTM3U header")]
    NotAPlaylist,
    #[error("Playlist contains no segments")]
    EmptyPlaylist,
    #[error("Playlist error: {0}")]
    PlaylistError(String),
    #[error("Key fetch error for {uri}: {reason}")]
    KeyFetchError { uri: String, reason: String },
    #[error("Segment fetch error: {0}")]
    SegmentFetchError(String),
    #[error("Giving up on {url} after {attempts} attempt(s): {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
    #[error("Batch failed: segment {index} ({url}) was not downloaded: {reason}")]
    BatchFailed {
        index: usize,
        url: String,
        reason: String,
    },
    #[error("Decryption error: {0}")]
    DecryptionError(String),
    #[error("Merge failed at {}: {source}", .path.display())]
    MergeError {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },
    #[error("Network error: {source}")]
    NetworkError {
        #[from]
        source: Arc<reqwest::Error>,
    },
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: Arc<std::io::Error>,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl HlsDownloaderError {
    pub fn merge(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HlsDownloaderError::MergeError {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn key_fetch(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        HlsDownloaderError::KeyFetchError {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}

// Manual implementation of From<reqwest::Error> for HlsDownloaderError
// because of the Arc wrapping.
impl From<reqwest::Error> for HlsDownloaderError {
    fn from(err: reqwest::Error) -> Self {
        HlsDownloaderError::NetworkError {
            source: Arc::new(err),
        }
    }
}

// Manual implementation of From<std::io::Error> for HlsDownloaderError
impl From<std::io::Error> for HlsDownloaderError {
    fn from(err: std::io::Error) -> Self {
        HlsDownloaderError::IoError {
            source: Arc::new(err),
        }
    }
}
