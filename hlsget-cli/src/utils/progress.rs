use hlsget_engine::{PipelineEvent, RunState};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

fn segment_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} segments")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Renders pipeline events as a single segment progress bar.
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
    skipped: Arc<AtomicUsize>,
    bytes: Arc<AtomicU64>,
}

impl ProgressManager {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(segment_style());
        Self::with_bar(bar)
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            skipped: Arc::new(AtomicUsize::new(0)),
            bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn handle_event(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::StateChanged(RunState::Fetching) => {
                self.bar.enable_steady_tick(Duration::from_millis(500));
                self.bar.set_message("Downloading segments");
            }
            PipelineEvent::StateChanged(RunState::Done) => {
                self.bar.finish_with_message(format!(
                    "Finished: {} bytes downloaded, {} segments reused",
                    self.bytes.load(Ordering::Relaxed),
                    self.skipped.load(Ordering::Relaxed)
                ));
            }
            PipelineEvent::StateChanged(RunState::Failed) => {
                self.bar.abandon_with_message("Failed");
            }
            PipelineEvent::StateChanged(_) => {}
            PipelineEvent::SegmentSkipped { .. } => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            PipelineEvent::SegmentDownloaded { index, bytes } => {
                self.bytes.fetch_add(bytes, Ordering::Relaxed);
                self.bar.set_message(format!("Segment {index} done ({bytes} bytes)"));
            }
            PipelineEvent::BatchCompleted { processed, total } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(processed as u64);
            }
            PipelineEvent::Merged { path, bytes } => {
                self.bar
                    .set_message(format!("Merged {bytes} bytes into {}", path.display()));
            }
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}
