// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Result, VisualError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const TESSERACT_COMMAND: &str = "tesseract";

/// Text recognition over a still frame.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize text in an image, returning an empty string when the
    /// frame carries none.
    async fn recognize(&self, image: &Path) -> Result<String>;
}

/// Tesseract CLI recognizer.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    languages: String,
}

impl TesseractRecognizer {
    /// `languages` uses tesseract's `+`-joined code form, e.g. `spa+eng`.
    pub fn new(languages: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
        }
    }

    pub async fn is_available() -> bool {
        Command::new("which")
            .arg(TESSERACT_COMMAND)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("spa+eng")
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String> {
        let output = Command::new(TESSERACT_COMMAND)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisualError::OcrFailed(stderr.trim().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(
            target: "visual",
            "OCR on {}: {} chars",
            image.display(),
            text.chars().count()
        );
        Ok(text)
    }
}
