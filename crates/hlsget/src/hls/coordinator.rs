// HLS Pipeline Coordinator: drives one run from playlist text to merged output file.
//
// Parsed -> TasksPlanned -> Fetching -> Merged -> Done, with Failed reachable from any state.
// Segments already complete on disk are never fetched again, which makes reruns resume.

use crate::DownloadError;
use crate::hls::config::HlsConfig;
use crate::hls::decryption::{KeyResolver, SegmentKey};
use crate::hls::events::{OnEvent, PipelineEvent, RunState, emit};
use crate::hls::fetcher::{SegmentDownloader, SegmentFetcher, SegmentTask};
use crate::hls::output::SegmentAssembler;
use crate::hls::playlist::{PlaylistLoader, derive_base_url, parse_playlist};
use crate::hls::scheduler::BatchScheduler;
use crate::hls::transport::{HttpTransport, ReqwestTransport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::HlsDownloaderError;

const DEFAULT_OUTPUT_NAME: &str = "output";

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_segments: usize,
    /// Segments found complete on disk and not fetched
    pub skipped: usize,
    pub fetched: usize,
    pub output_path: PathBuf,
    pub bytes_written: u64,
}

/// Fetch work plus the full merge order for one playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    pub tasks: Vec<SegmentTask>,
    /// Every segment path, in playlist order, skipped ones included
    pub merge_order: Vec<PathBuf>,
    pub skipped: Vec<usize>,
}

/// `{download_path}/segment_{index}.ts`
pub fn segment_path(download_path: &Path, index: usize) -> PathBuf {
    download_path.join(format!("segment_{index}.ts"))
}

/// A segment is complete when its file exists and is not empty.
pub async fn is_segment_complete(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Split segment URLs into fetch tasks and already-complete segments.
pub async fn plan_tasks(segments: &[String], download_path: &Path) -> TaskPlan {
    let mut plan = TaskPlan {
        tasks: Vec::new(),
        merge_order: Vec::with_capacity(segments.len()),
        skipped: Vec::new(),
    };

    for (index, url) in segments.iter().enumerate() {
        let path = segment_path(download_path, index);
        if is_segment_complete(&path).await {
            plan.skipped.push(index);
        } else {
            plan.tasks.push(SegmentTask {
                source_url: url.clone(),
                destination_path: path.clone(),
                sequence_index: index,
            });
        }
        plan.merge_order.push(path);
    }
    plan
}

pub struct HlsPipeline {
    config: Arc<HlsConfig>,
    transport: Arc<dyn HttpTransport>,
    on_event: Option<OnEvent>,
}

impl HlsPipeline {
    /// Build a pipeline talking HTTP through reqwest, configured from `config.base`.
    pub fn new(config: HlsConfig) -> Result<Self, DownloadError> {
        let transport = ReqwestTransport::from_config(&config.base)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: HlsConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            on_event: None,
        }
    }

    pub fn with_event_handler(mut self, on_event: OnEvent) -> Self {
        self.on_event = Some(on_event);
        self
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    /// Download the playlist at `url`, then fetch and merge its segments.
    pub async fn download_from_url(
        &self,
        url: &str,
        output_name: &str,
    ) -> Result<RunSummary, HlsDownloaderError> {
        let result = self.run_remote(url, output_name).await;
        self.finish(result)
    }

    /// Load a playlist from a local file, then fetch and merge its segments.
    pub async fn download_from_file(
        &self,
        path: &Path,
        output_name: &str,
    ) -> Result<RunSummary, HlsDownloaderError> {
        let result = self.run_local(path, output_name).await;
        self.finish(result)
    }

    async fn run_remote(
        &self,
        url: &str,
        output_name: &str,
    ) -> Result<RunSummary, HlsDownloaderError> {
        info!(url, "Downloading playlist");
        let text = PlaylistLoader::new(Arc::clone(&self.transport))
            .load_remote(url)
            .await?;
        let base_url = match &self.config.playlist_config.base_url {
            Some(base) => base.clone(),
            None => derive_base_url(url).unwrap_or_default(),
        };
        debug!(base_url, "Resolved base URL");
        self.run_playlist(&text, &base_url, output_name).await
    }

    async fn run_local(
        &self,
        path: &Path,
        output_name: &str,
    ) -> Result<RunSummary, HlsDownloaderError> {
        info!(path = %path.display(), "Reading playlist file");
        let text = PlaylistLoader::new(Arc::clone(&self.transport))
            .load_local(path)
            .await?;
        let base_url = self
            .config
            .playlist_config
            .base_url
            .clone()
            .unwrap_or_default();
        self.run_playlist(&text, &base_url, output_name).await
    }

    fn finish(
        &self,
        result: Result<RunSummary, HlsDownloaderError>,
    ) -> Result<RunSummary, HlsDownloaderError> {
        match &result {
            Ok(summary) => {
                self.set_state(RunState::Done);
                info!(
                    total = summary.total_segments,
                    skipped = summary.skipped,
                    fetched = summary.fetched,
                    bytes = summary.bytes_written,
                    output = %summary.output_path.display(),
                    "Download finished"
                );
            }
            Err(e) => {
                self.set_state(RunState::Failed);
                error!(error = %e, "Download failed");
            }
        }
        result
    }

    fn set_state(&self, state: RunState) {
        debug!(?state, "Pipeline state changed");
        emit(self.on_event.as_ref(), PipelineEvent::StateChanged(state));
    }

    async fn run_playlist(
        &self,
        text: &str,
        base_url: &str,
        output_name: &str,
    ) -> Result<RunSummary, HlsDownloaderError> {
        let playlist = parse_playlist(text, base_url)?;
        self.set_state(RunState::Parsed);
        info!(
            segments = playlist.len(),
            encrypted = playlist.is_encrypted(),
            "Playlist parsed"
        );

        let key: Option<Arc<SegmentKey>> = match &playlist.encryption {
            Some(info) => Some(Arc::new(
                KeyResolver::new(Arc::clone(&self.transport))
                    .resolve(info)
                    .await?,
            )),
            None => None,
        };

        let download_path = &self.config.output_config.download_path;
        tokio::fs::create_dir_all(download_path).await?;

        let plan = plan_tasks(&playlist.segments, download_path).await;
        for &index in &plan.skipped {
            emit(
                self.on_event.as_ref(),
                PipelineEvent::SegmentSkipped { index },
            );
        }
        self.set_state(RunState::TasksPlanned);
        info!(
            to_fetch = plan.tasks.len(),
            skipped = plan.skipped.len(),
            "Tasks planned"
        );

        self.set_state(RunState::Fetching);
        let fetcher: Arc<dyn SegmentDownloader> = Arc::new(SegmentFetcher::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.config),
            key,
        ));
        let fetched = BatchScheduler::new(fetcher, self.config.scheduler_config.download_concurrency)
            .with_event_handler(self.on_event.clone())
            .run(&plan.tasks)
            .await?;

        let output_path = output_path(download_path, output_name);
        let bytes_written = SegmentAssembler::new(
            self.config.output_config.merge_strategy,
            self.config.output_config.keep_segments,
        )
        .merge(&plan.merge_order, &output_path)
        .await?;
        self.set_state(RunState::Merged);
        emit(
            self.on_event.as_ref(),
            PipelineEvent::Merged {
                path: output_path.clone(),
                bytes: bytes_written,
            },
        );

        Ok(RunSummary {
            total_segments: playlist.len(),
            skipped: plan.skipped.len(),
            fetched,
            output_path,
            bytes_written,
        })
    }
}

fn output_path(download_path: &Path, output_name: &str) -> PathBuf {
    let name = output_name.trim();
    let name = if name.is_empty() {
        DEFAULT_OUTPUT_NAME
    } else {
        name
    };
    download_path.join(format!("{name}.ts"))
}
