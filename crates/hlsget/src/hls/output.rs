// HLS Output: concatenates downloaded segment files, in playlist order, into the final file.

use crate::hls::HlsDownloaderError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

/// How a merge treats the output and the segment files when something goes wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum MergeStrategy {
    /// Write straight into the output and delete each segment once copied.
    /// A failure leaves the partial output and the consumed segments gone.
    #[default]
    BestEffort,
    /// Write to `{output}.part` and rename on success. Segments are deleted
    /// only after the rename; a failure keeps them and removes the part file.
    Transactional,
}

pub struct SegmentAssembler {
    strategy: MergeStrategy,
    keep_segments: bool,
}

impl SegmentAssembler {
    pub fn new(strategy: MergeStrategy, keep_segments: bool) -> Self {
        Self {
            strategy,
            keep_segments,
        }
    }

    /// Concatenate `segments` into `output` in the given order. Returns the
    /// number of bytes written.
    pub async fn merge(
        &self,
        segments: &[PathBuf],
        output: &Path,
    ) -> Result<u64, HlsDownloaderError> {
        let written = match self.strategy {
            MergeStrategy::BestEffort => self.merge_in_place(segments, output).await?,
            MergeStrategy::Transactional => self.merge_staged(segments, output).await?,
        };
        info!(
            path = %output.display(),
            segments = segments.len(),
            bytes = written,
            "Segments merged"
        );
        Ok(written)
    }

    async fn merge_in_place(
        &self,
        segments: &[PathBuf],
        output: &Path,
    ) -> Result<u64, HlsDownloaderError> {
        let mut writer = create_output(output).await?;
        let mut written = 0u64;
        for segment in segments {
            written += append_segment(&mut writer, segment, output).await?;
            writer
                .flush()
                .await
                .map_err(|e| HlsDownloaderError::merge(output, e))?;
            if !self.keep_segments {
                remove_segment(segment).await;
            }
        }
        Ok(written)
    }

    async fn merge_staged(
        &self,
        segments: &[PathBuf],
        output: &Path,
    ) -> Result<u64, HlsDownloaderError> {
        let part = part_path(output);
        let result = async {
            let mut writer = create_output(&part).await?;
            let mut written = 0u64;
            for segment in segments {
                written += append_segment(&mut writer, segment, &part).await?;
            }
            writer
                .flush()
                .await
                .map_err(|e| HlsDownloaderError::merge(&part, e))?;
            Ok::<_, HlsDownloaderError>(written)
        }
        .await;

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, output)
            .await
            .map_err(|e| HlsDownloaderError::merge(output, e))?;

        if !self.keep_segments {
            for segment in segments {
                remove_segment(segment).await;
            }
        }
        Ok(written)
    }
}

async fn create_output(path: &Path) -> Result<BufWriter<File>, HlsDownloaderError> {
    let file = File::create(path)
        .await
        .map_err(|e| HlsDownloaderError::merge(path, e))?;
    Ok(BufWriter::new(file))
}

async fn append_segment(
    writer: &mut BufWriter<File>,
    segment: &Path,
    output: &Path,
) -> Result<u64, HlsDownloaderError> {
    let mut reader = File::open(segment)
        .await
        .map_err(|e| HlsDownloaderError::merge(segment, e))?;
    let copied = tokio::io::copy(&mut reader, writer)
        .await
        .map_err(|e| HlsDownloaderError::merge(output, e))?;
    debug!(segment = %segment.display(), bytes = copied, "Segment appended");
    Ok(copied)
}

async fn remove_segment(segment: &Path) {
    if let Err(e) = tokio::fs::remove_file(segment).await {
        warn!(path = %segment.display(), error = %e, "Failed to delete merged segment");
    }
}

fn part_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
