// SPDX-License-Identifier: GPL-3.0-or-later

//! Dialogue-based identification of video files.
//!
//! Extracts short audio segments with ffmpeg, transcribes them, selects
//! distinctive spoken phrases and searches subtitle databases for them.
//! When two or more independent phrases agree on a title, that title is
//! reported with a consensus confidence.

pub mod error;
pub mod matcher;
pub mod opensubtitles;
pub mod phrases;
pub mod segments;
pub mod transcribe;

pub use error::{AudioError, Result};
pub use matcher::{consensus, AudioMatch, AudioMatcher, SubtitleCandidate};
pub use opensubtitles::OpenSubtitlesClient;
pub use segments::SegmentExtractor;
pub use transcribe::{SpeechToText, WhisperTranscriber};
