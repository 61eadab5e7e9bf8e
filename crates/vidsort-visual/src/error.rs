// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisualError>;

#[derive(Debug, Error)]
pub enum VisualError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("face recognition failed: {0}")]
    FaceRecognitionFailed(String),
}
