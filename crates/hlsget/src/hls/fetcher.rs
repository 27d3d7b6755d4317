// HLS Segment Fetcher: downloads one segment to a temporary file with fixed-interval retries,
// then promotes it to its destination (decrypting on the way when the run is encrypted).

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;
use crate::hls::decryption::{SegmentKey, decrypt_file};
use crate::hls::retry::{RetryAction, RetryPolicy, retry_with_backoff};
use crate::hls::transport::HttpTransport;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tracing::{debug, warn};

/// One unit of fetch work. The index fixes the segment's place in the merged output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTask {
    pub source_url: String,
    pub destination_path: PathBuf,
    pub sequence_index: usize,
}

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    /// Download `task` to its destination path, returning the bytes written there.
    async fn download_segment(&self, task: &SegmentTask) -> Result<u64, HlsDownloaderError>;
}

pub struct SegmentFetcher {
    transport: Arc<dyn HttpTransport>,
    config: Arc<HlsConfig>,
    key: Option<Arc<SegmentKey>>,
}

impl SegmentFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: Arc<HlsConfig>,
        key: Option<Arc<SegmentKey>>,
    ) -> Self {
        Self {
            transport,
            config,
            key,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.fetcher_config.max_segment_retries,
            self.config.fetcher_config.segment_retry_delay,
        )
    }

    async fn attempt(&self, task: &SegmentTask, tmp: &Path, attempt: u32) -> RetryAction<u64> {
        // A destination we cannot write to will not get better with retries.
        let mut file = match File::create(tmp).await {
            Ok(file) => file,
            Err(e) => return RetryAction::Fail(HlsDownloaderError::from(e)),
        };

        let fetched = self
            .transport
            .fetch_to_writer(&task.source_url, &mut file)
            .await;
        drop(file);

        let outcome = match fetched {
            Ok(status) if status == StatusCode::OK => self.promote(tmp, task).await,
            Ok(status) => Err(HlsDownloaderError::SegmentFetchError(format!(
                "HTTP {status} for {}",
                task.source_url
            ))),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(bytes) => {
                debug!(
                    url = %task.source_url,
                    index = task.sequence_index,
                    attempt = attempt + 1,
                    bytes,
                    "Segment downloaded"
                );
                RetryAction::Success(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(tmp).await;
                RetryAction::Retry(e)
            }
        }
    }

    /// Move a fully fetched temporary file into place.
    ///
    /// An empty result is never promoted: a zero-length segment file reads as
    /// incomplete everywhere else.
    async fn promote(&self, tmp: &Path, task: &SegmentTask) -> Result<u64, HlsDownloaderError> {
        if tokio::fs::metadata(tmp).await?.len() == 0 {
            return Err(HlsDownloaderError::SegmentFetchError(format!(
                "Empty body for {}",
                task.source_url
            )));
        }

        let destination = &task.destination_path;
        let written = match &self.key {
            Some(key) => {
                let written = decrypt_file(
                    tmp,
                    destination,
                    key,
                    self.config.decryption_config.read_chunk_size,
                )
                .await?;
                if let Err(e) = tokio::fs::remove_file(tmp).await {
                    warn!(path = %tmp.display(), error = %e, "Failed to remove temporary segment file");
                }
                written
            }
            None => {
                tokio::fs::rename(tmp, destination).await?;
                tokio::fs::metadata(destination).await?.len()
            }
        };

        if written == 0 {
            let _ = tokio::fs::remove_file(destination).await;
            return Err(HlsDownloaderError::SegmentFetchError(format!(
                "Decrypted segment is empty for {}",
                task.source_url
            )));
        }
        Ok(written)
    }
}

#[async_trait]
impl SegmentDownloader for SegmentFetcher {
    async fn download_segment(&self, task: &SegmentTask) -> Result<u64, HlsDownloaderError> {
        let tmp = temp_path(&task.destination_path);
        let policy = self.retry_policy();
        retry_with_backoff(&policy, &task.source_url, |attempt| {
            self.attempt(task, &tmp, attempt)
        })
        .await
    }
}

/// `segment_3.ts` -> `segment_3.ts.tmp`
pub fn temp_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::test_support::{MockTransport, encrypt};
    use std::time::Duration;

    fn config(dir: &Path) -> Arc<HlsConfig> {
        Arc::new(
            HlsConfig::builder()
                .download_path(dir)
                .segment_retry_count(3)
                .segment_retry_delay(Duration::from_millis(10))
                .build(),
        )
    }

    fn task(dir: &Path, url: &str, index: usize) -> SegmentTask {
        SegmentTask {
            source_url: url.to_string(),
            destination_path: dir.join(format!("segment_{index}.ts")),
            sequence_index: index,
        }
    }

    #[tokio::test]
    async fn downloads_and_promotes_plain_segment() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new().route("http://h/0.ts", &b"segment-zero"[..]));
        let fetcher = SegmentFetcher::new(transport.clone(), config(dir.path()), None);
        let task = task(dir.path(), "http://h/0.ts", 0);

        let written = fetcher.download_segment(&task).await.unwrap();
        assert_eq!(written, 12);
        assert_eq!(
            tokio::fs::read(&task.destination_path).await.unwrap(),
            b"segment-zero"
        );
        assert!(!temp_path(&task.destination_path).exists());
        assert_eq!(transport.requests_for("http://h/0.ts"), 1);
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let dir = tempfile::tempdir().unwrap();
        let transport =
            Arc::new(MockTransport::new().route_flaky("http://h/1.ts", 2, &b"payload"[..]));
        let fetcher = SegmentFetcher::new(transport.clone(), config(dir.path()), None);
        let task = task(dir.path(), "http://h/1.ts", 1);

        fetcher.download_segment(&task).await.unwrap();
        assert_eq!(transport.requests_for("http://h/1.ts"), 3);
        assert!(task.destination_path.exists());
    }

    #[tokio::test]
    async fn exhausts_after_configured_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            MockTransport::new().route_status("http://h/2.ts", StatusCode::SERVICE_UNAVAILABLE),
        );
        let fetcher = SegmentFetcher::new(transport.clone(), config(dir.path()), None);
        let task = task(dir.path(), "http://h/2.ts", 2);

        let err = fetcher.download_segment(&task).await.unwrap_err();
        match err {
            HlsDownloaderError::Exhausted {
                url,
                attempts,
                last_error,
            } => {
                assert_eq!(url, "http://h/2.ts");
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(transport.requests_for("http://h/2.ts"), 3);
        assert!(!task.destination_path.exists());
        assert!(!temp_path(&task.destination_path).exists());
    }

    #[tokio::test]
    async fn decrypts_encrypted_segment() {
        let dir = tempfile::tempdir().unwrap();
        let key = SegmentKey::new(*b"0123456789abcdef", None);
        let plain = b"transport stream packet data".repeat(50);
        let transport = Arc::new(
            MockTransport::new().route("http://h/3.ts", encrypt(&plain, &key.key, &key.iv)),
        );
        let fetcher = SegmentFetcher::new(transport, config(dir.path()), Some(Arc::new(key)));
        let task = task(dir.path(), "http://h/3.ts", 3);

        let written = fetcher.download_segment(&task).await.unwrap();
        assert_eq!(written, plain.len() as u64);
        assert_eq!(tokio::fs::read(&task.destination_path).await.unwrap(), plain);
        assert!(!temp_path(&task.destination_path).exists());
    }

    #[tokio::test]
    async fn corrupt_ciphertext_is_retried_like_a_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let key = SegmentKey::new(*b"0123456789abcdef", None);
        let transport = Arc::new(MockTransport::new().route("http://h/4.ts", vec![9u8; 31]));
        let fetcher =
            SegmentFetcher::new(transport.clone(), config(dir.path()), Some(Arc::new(key)));
        let task = task(dir.path(), "http://h/4.ts", 4);

        let err = fetcher.download_segment(&task).await.unwrap_err();
        assert!(matches!(err, HlsDownloaderError::Exhausted { .. }));
        assert_eq!(transport.requests_for("http://h/4.ts"), 3);
        assert!(!task.destination_path.exists());
    }

    #[tokio::test]
    async fn empty_body_is_retried_and_never_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new().route("http://h/6.ts", Vec::<u8>::new()));
        let fetcher = SegmentFetcher::new(transport.clone(), config(dir.path()), None);
        let task = task(dir.path(), "http://h/6.ts", 6);

        let err = fetcher.download_segment(&task).await.unwrap_err();
        match err {
            HlsDownloaderError::Exhausted {
                url, last_error, ..
            } => {
                assert_eq!(url, "http://h/6.ts");
                assert!(last_error.contains("http://h/6.ts"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(transport.requests_for("http://h/6.ts"), 3);
        assert!(!task.destination_path.exists());
        assert!(!temp_path(&task.destination_path).exists());
    }

    #[tokio::test]
    async fn padding_only_ciphertext_is_not_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let key = SegmentKey::new(*b"0123456789abcdef", None);
        let transport =
            Arc::new(MockTransport::new().route("http://h/7.ts", encrypt(b"", &key.key, &key.iv)));
        let fetcher =
            SegmentFetcher::new(transport.clone(), config(dir.path()), Some(Arc::new(key)));
        let task = task(dir.path(), "http://h/7.ts", 7);

        let err = fetcher.download_segment(&task).await.unwrap_err();
        assert!(matches!(err, HlsDownloaderError::Exhausted { .. }));
        assert_eq!(transport.requests_for("http://h/7.ts"), 3);
        assert!(!task.destination_path.exists());
    }

    #[tokio::test]
    async fn unwritable_destination_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockTransport::new().route("http://h/5.ts", &b"x"[..]));
        let fetcher = SegmentFetcher::new(transport.clone(), config(dir.path()), None);
        let task = task(&dir.path().join("missing"), "http://h/5.ts", 5);

        let err = fetcher.download_segment(&task).await.unwrap_err();
        assert!(matches!(err, HlsDownloaderError::IoError { .. }));
        assert_eq!(transport.total_requests(), 0);
    }
}
