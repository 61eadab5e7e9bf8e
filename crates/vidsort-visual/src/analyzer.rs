// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::Result;
use crate::faces::FaceRecognizer;
use crate::frames::FrameGrabber;
use crate::ocr::TextRecognizer;
use crate::title_guess::guess_title;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vidsort_domain::VisualReport;

/// Reports scoring at or below this carry no usable signal.
const MIN_REPORT_CONFIDENCE: f32 = 0.3;

const TEXT_WEIGHT: f32 = 0.5;
const ACTOR_WEIGHT: f32 = 0.3;
const TITLE_GUESS_WEIGHT: f32 = 0.2;

/// Samples frames from a video and scores what it can see in them.
pub struct VisualAnalyzer {
    frames: FrameGrabber,
    ocr: Option<Arc<dyn TextRecognizer>>,
    faces: Option<Arc<dyn FaceRecognizer>>,
}

impl VisualAnalyzer {
    /// Either recognizer may be absent; the corresponding signal then
    /// simply never contributes.
    pub fn new(
        ocr: Option<Arc<dyn TextRecognizer>>,
        faces: Option<Arc<dyn FaceRecognizer>>,
    ) -> Self {
        Self {
            frames: FrameGrabber::new(),
            ocr,
            faces,
        }
    }

    /// True when at least one recognizer is configured; callers skip the
    /// frame extraction cost entirely otherwise.
    pub fn has_recognizers(&self) -> bool {
        self.ocr.is_some() || self.faces.is_some()
    }

    /// Sample frames and build a report. Returns `Ok(None)` when the
    /// combined signal is too weak to be worth anything downstream.
    pub async fn analyze(&self, video: &Path, work_dir: &Path) -> Result<Option<VisualReport>> {
        let frames = self.frames.extract(video, work_dir).await?;
        if frames.is_empty() {
            debug!(target: "visual", "no frames decoded from {}", video.display());
            return Ok(None);
        }

        let mut detected_text = String::new();
        let mut actors: Vec<String> = Vec::new();

        for frame in &frames {
            if let Some(ocr) = &self.ocr {
                match ocr.recognize(frame).await {
                    Ok(text) if !text.is_empty() => {
                        detected_text.push_str(&text);
                        detected_text.push('\n');
                    }
                    Ok(_) => {}
                    Err(e) => warn!(target: "visual", "OCR failed on frame: {}", e),
                }
            }

            if let Some(faces) = &self.faces {
                match faces.identify(frame).await {
                    Ok(names) => {
                        for name in names {
                            if !actors.contains(&name) {
                                actors.push(name);
                            }
                        }
                    }
                    Err(e) => warn!(target: "visual", "face recognition failed on frame: {}", e),
                }
            }
        }

        let title_guess = guess_title(&detected_text);
        let confidence = score(!detected_text.trim().is_empty(), !actors.is_empty(), title_guess.is_some());

        if confidence <= MIN_REPORT_CONFIDENCE {
            debug!(target: "visual", "visual signal too weak ({:.2})", confidence);
            return Ok(None);
        }

        info!(
            target: "visual",
            "visual report: confidence {:.2}, {} actor(s), title guess {:?}",
            confidence,
            actors.len(),
            title_guess
        );

        Ok(Some(VisualReport {
            detected_text: detected_text.trim().to_string(),
            actors,
            title_guess,
            confidence,
        }))
    }
}

fn score(has_text: bool, has_actors: bool, has_title_guess: bool) -> f32 {
    let mut confidence = 0.0;
    if has_text {
        confidence += TEXT_WEIGHT;
    }
    if has_actors {
        confidence += ACTOR_WEIGHT;
    }
    if has_title_guess {
        confidence += TITLE_GUESS_WEIGHT;
    }
    confidence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_signal_scores_one() {
        assert!((score(true, true, true) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn text_alone_clears_the_floor() {
        assert!(score(true, false, false) > MIN_REPORT_CONFIDENCE);
    }

    #[test]
    fn actors_alone_do_not_clear_the_floor() {
        // 0.3 is not strictly above the 0.3 floor
        assert!(score(false, true, false) <= MIN_REPORT_CONFIDENCE);
    }

    #[test]
    fn no_signal_scores_zero() {
        assert_eq!(score(false, false, false), 0.0);
    }
}
