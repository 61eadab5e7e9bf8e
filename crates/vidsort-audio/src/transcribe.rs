// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{AudioError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

const WHISPER_COMMAND: &str = "whisper";

/// Speech-to-text backend over extracted audio segments.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a single audio file and return its plain text.
    async fn transcribe(&self, audio: &Path) -> Result<String>;
}

/// Whisper CLI transcriber.
///
/// Shells out to the `whisper` command and reads the `.txt` sidecar it
/// writes next to the input file.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(model: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            language: language.into(),
        }
    }

    /// Check whether the whisper command is on the PATH.
    pub async fn is_available() -> bool {
        Command::new("which")
            .arg(WHISPER_COMMAND)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let output_dir = audio.parent().unwrap_or_else(|| Path::new("."));

        debug!(target: "audio", "transcribing {}", audio.display());

        let output = Command::new(WHISPER_COMMAND)
            .arg(audio)
            .arg("--model")
            .arg(&self.model)
            .arg("--language")
            .arg(&self.language)
            .arg("--output_format")
            .arg("txt")
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--fp16")
            .arg("False")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AudioError::TranscriptionFailed(stderr.trim().to_string()));
        }

        let txt_path = audio.with_extension("txt");
        match tokio::fs::read_to_string(&txt_path).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(
                    target: "audio",
                    "whisper produced no transcript at {}: {}",
                    txt_path.display(),
                    e
                );
                Ok(String::new())
            }
        }
    }
}
