// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{AudioError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

const FFMPEG_COMMAND: &str = "ffmpeg";
const FFPROBE_COMMAND: &str = "ffprobe";

/// Extracts short mono WAV segments from a video file for transcription.
///
/// Segments are spread across the runtime so that opening logos, mid-film
/// dialogue and end credits all contribute. The first and last 5% of the
/// file are skipped; credits music and distributor idents transcribe badly.
#[derive(Debug, Clone)]
pub struct SegmentExtractor {
    segment_count: usize,
    segment_secs: u32,
}

impl SegmentExtractor {
    pub fn new(segment_count: usize, segment_secs: u32) -> Self {
        Self {
            segment_count,
            segment_secs,
        }
    }

    /// Probe the container for its duration in seconds.
    pub async fn probe_duration(&self, video: &Path) -> Result<f64> {
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
            return Err(AudioError::FfprobeFailed(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|e| AudioError::FfprobeFailed(format!("unparseable duration: {}", e)))
    }

    /// Extract segments into `work_dir`, returning the paths of the WAV
    /// files that were written. Files too short for even one segment yield
    /// a single segment starting at zero.
    pub async fn extract(&self, video: &Path, work_dir: &Path) -> Result<Vec<PathBuf>> {
        let duration = self.probe_duration(video).await?;
        let starts = self.segment_starts(duration);

        debug!(
            target: "audio",
            "extracting {} segment(s) from {}",
            starts.len(),
            video.display()
        );

        let mut paths = Vec::with_capacity(starts.len());
        for (index, start) in starts.into_iter().enumerate() {
            let out = work_dir.join(format!("segment_{:02}.wav", index));
            self.extract_one(video, start, &out).await?;
            paths.push(out);
        }

        Ok(paths)
    }

    async fn extract_one(&self, video: &Path, start: f64, out: &Path) -> Result<()> {
        trace!(target: "audio", "segment at {:.1}s -> {}", start, out.display());

        let output = Command::new(FFMPEG_COMMAND)
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.1}", start))
            .arg("-i")
            .arg(video)
            .arg("-t")
            .arg(self.segment_secs.to_string())
            .arg("-vn")
            .arg("-ac")
            .arg("1")
            .arg("-ar")
            .arg("16000")
            .arg(out)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AudioError::FfmpegFailed(stderr.trim().to_string()));
        }

        Ok(())
    }

    /// Start offsets spread evenly over the middle 90% of the runtime.
    fn segment_starts(&self, duration: f64) -> Vec<f64> {
        let usable_start = duration * 0.05;
        let usable_end = (duration * 0.95) - f64::from(self.segment_secs);

        if usable_end <= usable_start || self.segment_count <= 1 {
            return vec![0.0];
        }

        let span = usable_end - usable_start;
        let step = span / (self.segment_count - 1) as f64;
        (0..self.segment_count)
            .map(|i| usable_start + step * i as f64)
            .collect()
    }
}
