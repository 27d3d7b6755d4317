use std::path::PathBuf;
use std::sync::Arc;

/// Lifecycle of a single pipeline run.
///
/// `Failed` is reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Parsed,
    TasksPlanned,
    Fetching,
    Merged,
    Done,
    Failed,
}

/// Advisory notifications emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StateChanged(RunState),
    /// Segment already complete on disk; it will not be fetched.
    SegmentSkipped { index: usize },
    SegmentDownloaded { index: usize, bytes: u64 },
    BatchCompleted { processed: usize, total: usize },
    Merged { path: PathBuf, bytes: u64 },
}

/// Callback receiving pipeline events. Must be cheap; it runs on fetch workers.
pub type OnEvent = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

pub(crate) fn emit(on_event: Option<&OnEvent>, event: PipelineEvent) {
    if let Some(callback) = on_event {
        callback(event);
    }
}
