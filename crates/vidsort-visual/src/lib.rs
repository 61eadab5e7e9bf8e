// SPDX-License-Identifier: GPL-3.0-or-later

//! Visual analysis of video files.
//!
//! Samples still frames across the runtime, runs OCR and face
//! recognition over them, and condenses the findings into a single
//! weighted report used by the later identification layers.

pub mod analyzer;
pub mod error;
pub mod faces;
pub mod frames;
pub mod ocr;
pub mod title_guess;

pub use analyzer::VisualAnalyzer;
pub use error::{Result, VisualError};
pub use faces::{FaceRecognitionCli, FaceRecognizer};
pub use frames::FrameGrabber;
pub use ocr::{TesseractRecognizer, TextRecognizer};
pub use title_guess::guess_title;
