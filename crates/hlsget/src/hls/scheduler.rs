// HLS Segment Scheduler: runs fetch tasks in contiguous batches, at most `concurrency` at a time.

use crate::hls::HlsDownloaderError;
use crate::hls::coordinator::is_segment_complete;
use crate::hls::events::{OnEvent, PipelineEvent, emit};
use crate::hls::fetcher::{SegmentDownloader, SegmentTask};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct BatchScheduler {
    downloader: Arc<dyn SegmentDownloader>,
    concurrency: usize,
    on_event: Option<OnEvent>,
}

impl BatchScheduler {
    pub fn new(downloader: Arc<dyn SegmentDownloader>, concurrency: usize) -> Self {
        Self {
            downloader,
            concurrency: concurrency.max(1),
            on_event: None,
        }
    }

    pub fn with_event_handler(mut self, on_event: Option<OnEvent>) -> Self {
        self.on_event = on_event;
        self
    }

    /// Fetch every task, batch by batch, in the given order.
    ///
    /// A batch is complete when all of its fetches have finished. It passes
    /// only if every destination file is then present and non-empty; the first
    /// incomplete one fails the run and later batches never start. Returns the number of
    /// tasks processed.
    pub async fn run(&self, tasks: &[SegmentTask]) -> Result<usize, HlsDownloaderError> {
        let total = tasks.len();
        let mut processed = 0;

        for (batch_no, batch) in tasks.chunks(self.concurrency).enumerate() {
            debug!(batch = batch_no + 1, size = batch.len(), "Starting batch");
            let failures = self.fetch_batch(batch).await;

            for task in batch {
                if !is_segment_complete(&task.destination_path).await {
                    let reason = failures
                        .get(&task.sequence_index)
                        .cloned()
                        .unwrap_or_else(|| "destination file missing or empty after fetch".to_string());
                    return Err(HlsDownloaderError::BatchFailed {
                        index: task.sequence_index,
                        url: task.source_url.clone(),
                        reason,
                    });
                }
            }

            processed += batch.len();
            info!(processed, total, "Batch completed ({processed}/{total})");
            emit(
                self.on_event.as_ref(),
                PipelineEvent::BatchCompleted { processed, total },
            );
        }

        Ok(processed)
    }

    /// Run one batch to completion, collecting failure reasons by segment index.
    async fn fetch_batch(&self, batch: &[SegmentTask]) -> HashMap<usize, String> {
        let mut in_flight: FuturesUnordered<_> = batch
            .iter()
            .map(|task| {
                let downloader = Arc::clone(&self.downloader);
                async move { (task, downloader.download_segment(task).await) }
            })
            .collect();

        let mut failures = HashMap::new();
        while let Some((task, result)) = in_flight.next().await {
            match result {
                Ok(bytes) => emit(
                    self.on_event.as_ref(),
                    PipelineEvent::SegmentDownloaded {
                        index: task.sequence_index,
                        bytes,
                    },
                ),
                Err(e) => {
                    error!(
                        url = %task.source_url,
                        index = task.sequence_index,
                        error = %e,
                        "Segment download failed"
                    );
                    failures.insert(task.sequence_index, e.to_string());
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Writes the destination file unless the index is scripted to fail.
    #[derive(Default)]
    struct FakeDownloader {
        fail: Vec<usize>,
        /// Report success without writing anything
        lie: Vec<usize>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        started: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SegmentDownloader for FakeDownloader {
        async fn download_segment(&self, task: &SegmentTask) -> Result<u64, HlsDownloaderError> {
            self.started.lock().unwrap().push(task.sequence_index);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail.contains(&task.sequence_index) {
                return Err(HlsDownloaderError::Exhausted {
                    url: task.source_url.clone(),
                    attempts: 3,
                    last_error: "HTTP 500".to_string(),
                });
            }
            if !self.lie.contains(&task.sequence_index) {
                tokio::fs::write(&task.destination_path, b"data").await?;
            }
            Ok(4)
        }
    }

    fn tasks(dir: &Path, count: usize) -> Vec<SegmentTask> {
        (0..count)
            .map(|i| SegmentTask {
                source_url: format!("http://h/{i}.ts"),
                destination_path: dir.join(format!("segment_{i}.ts")),
                sequence_index: i,
            })
            .collect()
    }

    #[tokio::test]
    async fn failing_batch_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = tasks(dir.path(), 5);
        let downloader = Arc::new(FakeDownloader {
            fail: vec![3],
            ..Default::default()
        });
        let scheduler = BatchScheduler::new(downloader.clone(), 2);

        let err = scheduler.run(&tasks).await.unwrap_err();
        match err {
            HlsDownloaderError::BatchFailed { index, url, reason } => {
                assert_eq!(index, 3);
                assert_eq!(url, "http://h/3.ts");
                assert!(reason.contains("HTTP 500"));
            }
            other => panic!("expected BatchFailed, got {other:?}"),
        }

        for i in 0..3 {
            assert!(tasks[i].destination_path.exists(), "segment {i} should exist");
        }
        assert!(!tasks[3].destination_path.exists());
        assert!(!tasks[4].destination_path.exists());
        assert!(!downloader.started.lock().unwrap().contains(&4));
    }

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = tasks(dir.path(), 7);
        let downloader = Arc::new(FakeDownloader::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let on_event: OnEvent = Arc::new(move |event: PipelineEvent| sink.lock().unwrap().push(event));

        let processed = BatchScheduler::new(downloader.clone(), 3)
            .with_event_handler(Some(on_event))
            .run(&tasks)
            .await
            .unwrap();

        assert_eq!(processed, 7);
        assert!(downloader.max_in_flight.load(Ordering::SeqCst) <= 3);
        let progress: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::BatchCompleted { processed, total } => Some((*processed, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(3, 7), (6, 7), (7, 7)]);
    }

    #[tokio::test]
    async fn verdict_is_decided_by_file_presence() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = tasks(dir.path(), 2);
        let downloader = Arc::new(FakeDownloader {
            lie: vec![1],
            ..Default::default()
        });

        let err = BatchScheduler::new(downloader, 4)
            .run(&tasks)
            .await
            .unwrap_err();
        assert!(matches!(err, HlsDownloaderError::BatchFailed { index: 1, .. }));
    }

    #[tokio::test]
    async fn stale_empty_file_does_not_pass_a_failed_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = tasks(dir.path(), 3);
        tokio::fs::write(&tasks[1].destination_path, b"").await.unwrap();
        let downloader = Arc::new(FakeDownloader {
            fail: vec![1],
            ..Default::default()
        });

        let err = BatchScheduler::new(downloader, 3)
            .run(&tasks)
            .await
            .unwrap_err();
        match err {
            HlsDownloaderError::BatchFailed { index, reason, .. } => {
                assert_eq!(index, 1);
                assert!(reason.contains("HTTP 500"));
            }
            other => panic!("expected BatchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_task_list_is_a_no_op() {
        let downloader = Arc::new(FakeDownloader::default());
        let processed = BatchScheduler::new(downloader, 0).run(&[]).await.unwrap();
        assert_eq!(processed, 0);
    }
}
