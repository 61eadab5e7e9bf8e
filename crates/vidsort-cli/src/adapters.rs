// SPDX-License-Identifier: GPL-3.0-or-later

//! Glue between the concrete matchers and the pipeline traits.

use async_trait::async_trait;
use std::path::Path;
use vidsort_application::metadata::MetadataSearch;
use vidsort_application::phash::PhashMatcher;
use vidsort_application::pipeline::{AudioLayer, HashLayer, VisualGather};
use vidsort_audio::AudioMatcher;
use vidsort_domain::{CatalogMatch, ContentType, Evidence, EvidenceSource, VisualReport};
use vidsort_visual::{FrameGrabber, VisualAnalyzer};

/// Perceptual-hash layer over sampled frames and the reference store.
pub struct FrameHashLayer {
    grabber: FrameGrabber,
    matcher: PhashMatcher,
}

impl FrameHashLayer {
    pub fn new(matcher: PhashMatcher) -> Self {
        Self {
            grabber: FrameGrabber::new(),
            matcher,
        }
    }
}

#[async_trait]
impl HashLayer for FrameHashLayer {
    async fn match_file(&self, video: &Path, work_dir: &Path) -> anyhow::Result<Option<Evidence>> {
        let frames = self.grabber.extract(video, work_dir).await?;
        self.matcher.match_frames(&frames).await
    }
}

/// Audio layer over the dialogue matcher.
pub struct DialogueLayer {
    matcher: AudioMatcher,
}

impl DialogueLayer {
    pub fn new(matcher: AudioMatcher) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl AudioLayer for DialogueLayer {
    async fn match_file(&self, video: &Path, work_dir: &Path) -> anyhow::Result<Option<Evidence>> {
        let hit = self.matcher.identify(video, work_dir).await?;
        Ok(hit.map(|m| Evidence {
            source: EvidenceSource::AudioFingerprint,
            score: m.confidence,
            matched_title: Some(m.title),
            matched_id: None,
            matched_year: m.year,
            detail: Some(format!(
                "{}/{} phrases matched",
                m.matched_phrases, m.total_phrases
            )),
        }))
    }
}

/// Visual gather over the frame analyzer.
pub struct FrameAnalysisGather {
    analyzer: VisualAnalyzer,
}

impl FrameAnalysisGather {
    pub fn new(analyzer: VisualAnalyzer) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl VisualGather for FrameAnalysisGather {
    async fn gather(
        &self,
        video: &Path,
        work_dir: &Path,
    ) -> anyhow::Result<Option<VisualReport>> {
        Ok(self.analyzer.analyze(video, work_dir).await?)
    }
}

/// Stand-in metadata search used when the metadata layer is disabled and no
/// API key is configured.
pub struct DisabledMetadata;

#[async_trait]
impl MetadataSearch for DisabledMetadata {
    async fn best_match(
        &self,
        _title: &str,
        _year: Option<u16>,
        _content_type: ContentType,
        _min_score: f32,
    ) -> anyhow::Result<Option<CatalogMatch>> {
        Ok(None)
    }
}
