//! Final muxing step.

use crate::error::CompositionError;
use crate::ffmpeg;
use crate::media::MediaCandidate;
use crate::{logi, logok, logw};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct ComposedVideo {
    pub path: PathBuf,
    /// Probed after publishing; `None` when the probe tool is unavailable.
    pub duration_secs: Option<f64>,
}

#[async_trait]
pub trait Compositor: Send + Sync {
    async fn compose(
        &self,
        video: &MediaCandidate,
        narration: &Path,
        background: &MediaCandidate,
    ) -> Result<ComposedVideo, CompositionError>;
}

/// Muxes with the `ffmpeg` binary.
///
/// The tool writes to a hidden temporary file inside `output_dir`; only a
/// successful run is renamed to its final, per-request unique name. A failed
/// run leaves nothing behind.
pub struct FfmpegCompositor {
    ffmpeg: String,
    ffprobe: String,
    output_dir: PathBuf,
}

impl FfmpegCompositor {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn compose(
        &self,
        video: &MediaCandidate,
        narration: &Path,
        background: &MediaCandidate,
    ) -> Result<ComposedVideo, CompositionError> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(CompositionError::Prepare)?;

        let partial = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".mp4")
            .tempfile_in(&self.output_dir)
            .map_err(CompositionError::Prepare)?;
        let final_path = self.output_dir.join(unique_output_name());

        let args = ffmpeg::mux_args(&self.ffmpeg, &video.url, narration, &background.url, partial.path());
        logi(format!(
            "Composing video ({}) + narration + background ({}) -> {}",
            video.url,
            background.url,
            final_path.display()
        ));
        ffmpeg::run_cmd(&args).await?;

        let written = fs::metadata(partial.path()).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(CompositionError::Publish {
                path: final_path.display().to_string(),
                reason: "muxer produced an empty file".to_string(),
            });
        }

        partial
            .persist_noclobber(&final_path)
            .map_err(|e| CompositionError::Publish {
                path: final_path.display().to_string(),
                reason: e.error.to_string(),
            })?;

        let duration_secs = match ffmpeg::ffprobe_duration_seconds(&self.ffprobe, &final_path).await {
            Ok(d) => Some(d),
            Err(err) => {
                logw(format!("Could not probe {}: {}", final_path.display(), err));
                None
            }
        };

        logok(format!("Video written: {}", final_path.display()));
        Ok(ComposedVideo {
            path: final_path,
            duration_secs,
        })
    }
}

/// `video_<utc timestamp>_<random hex>.mp4`, unique across concurrent requests.
pub fn unique_output_name() -> String {
    format!(
        "video_{}_{:08x}.mp4",
        Utc::now().format("%Y%m%d_%H%M%S"),
        rand::random::<u32>()
    )
}
