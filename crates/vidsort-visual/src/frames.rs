// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Result, VisualError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

const FFMPEG_COMMAND: &str = "ffmpeg";
const FFPROBE_COMMAND: &str = "ffprobe";

/// Relative positions at which still frames are sampled. 5% and 10%
/// usually land on title cards and opening credits, 50% on the cast
/// in a typical scene, 90% on the end credits.
const FRAME_POSITIONS: [f64; 4] = [0.05, 0.10, 0.50, 0.90];

/// Grabs still frames from a video file for OCR and face recognition.
#[derive(Debug, Clone, Default)]
pub struct FrameGrabber;

impl FrameGrabber {
    pub fn new() -> Self {
        Self
    }

    /// Extract one JPEG per sample position into `work_dir`. Positions
    /// that fail to decode are skipped; an empty result is valid and
    /// means the container is unreadable past its header.
    pub async fn extract(&self, video: &Path, work_dir: &Path) -> Result<Vec<PathBuf>> {
        let duration = self.probe_duration(video).await?;

        let mut frames = Vec::with_capacity(FRAME_POSITIONS.len());
        for (index, position) in FRAME_POSITIONS.iter().enumerate() {
            let timestamp = duration * position;
            let out = work_dir.join(format!("frame_{:02}.jpg", index));

            match self.grab_one(video, timestamp, &out).await {
                Ok(()) => frames.push(out),
                Err(e) => {
                    debug!(
                        target: "visual",
                        "frame at {:.1}s failed: {}",
                        timestamp, e
                    );
                }
            }
        }

        Ok(frames)
    }

    async fn probe_duration(&self, video: &Path) -> Result<f64> {
        let output = Command::new(FFPROBE_COMMAND)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(video)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisualError::FfprobeFailed(stderr.trim().to_string()));
        }

        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .map_err(|e| VisualError::FfprobeFailed(format!("unparseable duration: {}", e)))
    }

    async fn grab_one(&self, video: &Path, timestamp: f64, out: &Path) -> Result<()> {
        trace!(target: "visual", "frame at {:.1}s -> {}", timestamp, out.display());

        let output = Command::new(FFMPEG_COMMAND)
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.1}", timestamp))
            .arg("-i")
            .arg(video)
            .arg("-vframes")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg(out)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisualError::FfmpegFailed(stderr.trim().to_string()));
        }

        Ok(())
    }
}
