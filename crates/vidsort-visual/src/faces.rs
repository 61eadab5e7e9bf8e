// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Result, VisualError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const FACE_RECOGNITION_COMMAND: &str = "face_recognition";

/// Identification of known people in a still frame.
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    /// Names of known people recognized in the image.
    async fn identify(&self, image: &Path) -> Result<Vec<String>>;
}

/// CLI wrapper around the `face_recognition` tool.
///
/// The tool compares faces in a frame against a directory of reference
/// portraits (one image per person, filename = person name) and prints
/// `frame,name` lines. Matching uses an embedding distance tolerance; a
/// higher configured confidence means a tighter tolerance.
#[derive(Debug, Clone)]
pub struct FaceRecognitionCli {
    known_faces_dir: PathBuf,
    min_confidence: f32,
}

impl FaceRecognitionCli {
    pub fn new(known_faces_dir: impl Into<PathBuf>, min_confidence: f32) -> Self {
        Self {
            known_faces_dir: known_faces_dir.into(),
            min_confidence,
        }
    }

    pub async fn is_available() -> bool {
        Command::new("which")
            .arg(FACE_RECOGNITION_COMMAND)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Embedding-distance tolerance derived from the configured
    /// confidence floor.
    fn tolerance(&self) -> f32 {
        (1.0 - self.min_confidence).clamp(0.0, 1.0)
    }
}

#[async_trait]
impl FaceRecognizer for FaceRecognitionCli {
    async fn identify(&self, image: &Path) -> Result<Vec<String>> {
        let output = Command::new(FACE_RECOGNITION_COMMAND)
            .arg("--tolerance")
            .arg(format!("{:.2}", self.tolerance()))
            .arg(&self.known_faces_dir)
            .arg(image)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisualError::FaceRecognitionFailed(
                stderr.trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let names = parse_matches(&stdout);
        debug!(
            target: "visual",
            "faces in {}: {:?}",
            image.display(),
            names
        );
        Ok(names)
    }
}

/// Parse the tool's `frame,name` output lines, dropping its sentinel
/// non-matches.
fn parse_matches(stdout: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in stdout.lines() {
        let Some((_, name)) = line.rsplit_once(',') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || name == "unknown_person" || name == "no_persons_found" {
            continue;
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_skips_sentinels() {
        let stdout = "/tmp/frame_00.jpg,penelope_cruz\n\
                      /tmp/frame_00.jpg,unknown_person\n\
                      /tmp/frame_01.jpg,no_persons_found\n\
                      /tmp/frame_02.jpg,javier_bardem\n";
        assert_eq!(parse_matches(stdout), vec!["penelope_cruz", "javier_bardem"]);
    }

    #[test]
    fn duplicate_names_collapse() {
        let stdout = "a.jpg,actor\nb.jpg,actor\n";
        assert_eq!(parse_matches(stdout), vec!["actor"]);
    }

    #[test]
    fn tolerance_tightens_with_confidence() {
        let strict = FaceRecognitionCli::new("known", 0.9);
        let loose = FaceRecognitionCli::new("known", 0.5);
        assert!(strict.tolerance() < loose.tolerance());
        assert!((strict.tolerance() - 0.1).abs() < 1e-6);
    }
}
