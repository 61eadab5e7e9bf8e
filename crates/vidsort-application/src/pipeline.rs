// SPDX-License-Identifier: GPL-3.0-or-later

//! The escalation controller.
//!
//! Layers run in fixed order, each gated by a configuration flag and a
//! confidence guard. Every failure inside a layer collapses to "no
//! evidence from this layer"; nothing a matcher does can abort the file.

use crate::metadata::MetadataSearch;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use vidsort_config::LayersConfig;
use vidsort_domain::{
    CatalogMatch, DecisionState, Evidence, EvidenceSource, FileCandidate, Layer, Verdict,
    VisualReport,
};

/// OCR words that name studios and distributors, not films.
const BOILERPLATE_WORDS: &[&str] = &[
    "warner", "universal", "paramount", "pictures", "presents", "presenta", "studios",
    "entertainment", "films", "columbia", "sony", "netflix",
];

/// Upper bound on alternative metadata queries per file.
const MAX_ALTERNATIVE_QUERIES: usize = 5;

/// The perceptual-hash layer as the controller sees it.
#[async_trait]
pub trait HashLayer: Send + Sync {
    async fn match_file(&self, video: &Path, work_dir: &Path) -> anyhow::Result<Option<Evidence>>;
}

/// The audio-dialogue layer as the controller sees it.
#[async_trait]
pub trait AudioLayer: Send + Sync {
    async fn match_file(&self, video: &Path, work_dir: &Path) -> anyhow::Result<Option<Evidence>>;
}

/// The shared visual evidence gather.
#[async_trait]
pub trait VisualGather: Send + Sync {
    async fn gather(&self, video: &Path, work_dir: &Path)
        -> anyhow::Result<Option<VisualReport>>;
}

/// Everything one pipeline pass produced for one file.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub state: DecisionState,
    pub verdict: Option<Verdict>,
    pub evidence: Vec<Evidence>,
    pub catalog: Option<CatalogMatch>,
    pub visual: Option<VisualReport>,
    pub visual_ran: bool,
    pub layer1_ran: bool,
    pub layer2_ran: bool,
    pub layer3_ran: bool,
    pub alternative_search_hit: bool,
    /// Confidence before and after each escalation, in order.
    pub escalations: Vec<(Layer, f32, f32)>,
}

impl PipelineOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self.verdict, Some(Verdict::Accept))
    }
}

pub struct EscalationPipeline {
    layers: LayersConfig,
    /// Primary metadata threshold; the alternative search relaxes it.
    metadata_min_score: f32,
    metadata_fallback_min_score: f32,
    metadata: Arc<dyn MetadataSearch>,
    /// `None` when no reference hash store is configured; the cached
    /// visual report then stands in as the proxy signal.
    phash: Option<Arc<dyn HashLayer>>,
    audio: Option<Arc<dyn AudioLayer>>,
    /// `None` when both the OCR and facial modules are disabled.
    visual: Option<Arc<dyn VisualGather>>,
}

impl EscalationPipeline {
    pub fn new(
        layers: LayersConfig,
        metadata_min_score: f32,
        metadata_fallback_min_score: f32,
        metadata: Arc<dyn MetadataSearch>,
        phash: Option<Arc<dyn HashLayer>>,
        audio: Option<Arc<dyn AudioLayer>>,
        visual: Option<Arc<dyn VisualGather>>,
    ) -> Self {
        Self {
            layers,
            metadata_min_score,
            metadata_fallback_min_score,
            metadata,
            phash,
            audio,
            visual,
        }
    }

    /// Run the full escalation for one candidate. Never fails; matcher
    /// errors degrade to missing evidence.
    pub async fn evaluate(&self, candidate: &FileCandidate, work_dir: &Path) -> PipelineOutcome {
        let video = candidate.original_path.as_path();
        let mut out = PipelineOutcome::default();

        self.run_metadata(candidate, &mut out).await;
        self.check_terminal(&mut out);

        self.gather_visual(video, work_dir, &mut out).await;
        self.run_alternative_search(candidate, &mut out).await;
        self.check_terminal(&mut out);

        self.run_phash(video, work_dir, &mut out).await;
        self.check_terminal(&mut out);

        self.run_audio(video, work_dir, &mut out).await;
        self.check_terminal(&mut out);

        self.run_verification(&mut out);

        let verdict = if out.state.confidence >= self.layers.accept_threshold {
            Verdict::Accept
        } else {
            Verdict::Defer
        };
        out.verdict = Some(verdict);

        info!(
            target: "pipeline",
            "{}: {:?} at confidence {:.2} ({})",
            candidate.original_name,
            verdict,
            out.state.confidence,
            out.state.stage_reached
        );
        out
    }

    fn check_terminal(&self, out: &mut PipelineOutcome) {
        if out.state.confidence >= self.layers.confirm_threshold {
            out.state.terminal = true;
        }
    }

    async fn run_metadata(&self, candidate: &FileCandidate, out: &mut PipelineOutcome) {
        if !self.layers.layer0_enabled {
            return;
        }

        match self
            .metadata
            .best_match(
                &candidate.title,
                candidate.year,
                candidate.content_type,
                self.metadata_min_score,
            )
            .await
        {
            Ok(Some(m)) => {
                // similarity may exceed 1.0 with the year bonus; cap here
                out.state.confidence = m.similarity.min(1.0);
                out.evidence.push(Evidence {
                    source: EvidenceSource::Metadata,
                    score: out.state.confidence,
                    matched_title: Some(m.title.clone()),
                    matched_id: Some(m.id),
                    matched_year: m.year,
                    detail: None,
                });
                out.catalog = Some(m);
            }
            Ok(None) => {
                debug!(target: "pipeline", "no metadata match for '{}'", candidate.title);
            }
            Err(e) => {
                warn!(target: "pipeline", "metadata matcher failed: {}", e);
            }
        }
    }

    async fn gather_visual(&self, video: &Path, work_dir: &Path, out: &mut PipelineOutcome) {
        if out.state.terminal
            || out.state.confidence >= self.layers.confirm_threshold
            || !(self.layers.layer1_enabled || self.layers.layer3_enabled)
        {
            return;
        }
        let Some(source) = &self.visual else {
            return;
        };

        out.visual_ran = true;
        match source.gather(video, work_dir).await {
            Ok(Some(report)) => {
                out.evidence.push(Evidence {
                    source: EvidenceSource::VisualOcr,
                    score: report.confidence,
                    matched_title: report.title_guess.clone(),
                    matched_id: None,
                    matched_year: None,
                    detail: None,
                });
                out.visual = Some(report);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(target: "pipeline", "visual gather failed: {}", e);
            }
        }
    }

    /// When the filename search failed but the frames gave us something
    /// to work with, retry the catalog at a relaxed threshold.
    async fn run_alternative_search(&self, candidate: &FileCandidate, out: &mut PipelineOutcome) {
        if out.catalog.is_some() || !self.layers.layer0_enabled {
            return;
        }
        let Some(report) = &out.visual else {
            return;
        };

        for query in alternative_queries(report) {
            match self
                .metadata
                .best_match(
                    &query,
                    None,
                    candidate.content_type,
                    self.metadata_fallback_min_score,
                )
                .await
            {
                Ok(Some(m)) => {
                    info!(
                        target: "pipeline",
                        "alternative search hit via '{}': '{}'",
                        query, m.title
                    );
                    out.state.confidence = m.similarity.min(1.0);
                    out.evidence.push(Evidence {
                        source: EvidenceSource::Metadata,
                        score: out.state.confidence,
                        matched_title: Some(m.title.clone()),
                        matched_id: Some(m.id),
                        matched_year: m.year,
                        detail: Some(format!("alternative search: {}", query)),
                    });
                    out.catalog = Some(m);
                    out.alternative_search_hit = true;
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target: "pipeline", "alternative search failed: {}", e);
                    return;
                }
            }
        }
    }

    async fn run_phash(&self, video: &Path, work_dir: &Path, out: &mut PipelineOutcome) {
        if out.state.terminal
            || out.state.confidence >= self.layers.confirm_threshold
            || !self.layers.layer1_enabled
        {
            return;
        }

        out.layer1_ran = true;
        out.state.stage_reached = Layer::PerceptualHash;
        let before = out.state.confidence;

        let evidence = match &self.phash {
            Some(matcher) => match matcher.match_file(video, work_dir).await {
                Ok(ev) => ev,
                Err(e) => {
                    warn!(target: "pipeline", "perceptual-hash matcher failed: {}", e);
                    None
                }
            },
            // no direct matcher: the visual report is the proxy signal
            None => out.visual.as_ref().map(|report| Evidence {
                source: EvidenceSource::PerceptualHash,
                score: report.confidence,
                matched_title: report.title_guess.clone(),
                matched_id: None,
                matched_year: None,
                detail: Some("visual proxy".to_string()),
            }),
        };

        if let Some(ev) = evidence {
            if ev.score >= self.layers.phash_strong {
                out.state.confidence = self.layers.confirm_threshold;
            } else {
                out.state.confidence = out
                    .state
                    .confidence
                    .max(ev.score * self.layers.phash_damping);
            }
            out.evidence.push(ev);
        }
        out.escalations
            .push((Layer::PerceptualHash, before, out.state.confidence));
    }

    async fn run_audio(&self, video: &Path, work_dir: &Path, out: &mut PipelineOutcome) {
        if out.state.terminal
            || out.state.confidence >= self.layers.audio_guard
            || !self.layers.layer2_enabled
        {
            return;
        }
        let Some(matcher) = &self.audio else {
            return;
        };

        out.layer2_ran = true;
        out.state.stage_reached = Layer::AudioFingerprint;
        let before = out.state.confidence;

        match matcher.match_file(video, work_dir).await {
            Ok(Some(ev)) => {
                if ev.score >= self.layers.audio_accept {
                    out.state.confidence = self.layers.audio_confirmed;
                } else {
                    // a found-but-weak dialogue match argues against the
                    // current hypothesis
                    out.state.confidence *= self.layers.audio_refute_penalty;
                }
                out.evidence.push(ev);
            }
            Ok(None) => {
                debug!(target: "pipeline", "no dialogue evidence");
            }
            Err(e) => {
                warn!(target: "pipeline", "audio matcher failed: {}", e);
            }
        }
        out.escalations
            .push((Layer::AudioFingerprint, before, out.state.confidence));
    }

    fn run_verification(&self, out: &mut PipelineOutcome) {
        if out.state.confidence >= self.layers.verification_guard || !self.layers.layer3_enabled {
            return;
        }

        out.layer3_ran = true;
        out.state.stage_reached = Layer::Verification;
        let before = out.state.confidence;

        let damped = out
            .visual
            .as_ref()
            .map(|report| report.confidence)
            .unwrap_or(0.0)
            * self.layers.verification_damping;

        if damped >= self.layers.verification_strong {
            out.state.confidence = self.layers.verification_confirmed;
        } else if damped > self.layers.verification_review_floor {
            out.state.confidence = self.layers.verification_review;
            out.state.manual_review = true;
        } else {
            out.state.confidence = out
                .state
                .confidence
                .min(self.layers.verification_distrust_cap);
        }
        out.escalations
            .push((Layer::Verification, before, out.state.confidence));
    }
}

/// Queries for the relaxed alternative search, best signal first: the
/// derived title guess, then recognized actors, then raw OCR lines that
/// look like titles. Studio boilerplate is filtered out.
fn alternative_queries(report: &VisualReport) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();

    if let Some(guess) = &report.title_guess {
        if !is_boilerplate(guess) {
            queries.push(guess.clone());
        }
    }

    for actor in report.actors.iter().take(2) {
        queries.push(actor.replace('_', " "));
    }

    for line in report.detected_text.lines() {
        let line = line.trim();
        let words = line.split_whitespace().count();
        if !(1..=6).contains(&words) || line.chars().count() < 3 || is_boilerplate(line) {
            continue;
        }
        if queries
            .iter()
            .any(|q| q.eq_ignore_ascii_case(line))
        {
            continue;
        }
        queries.push(line.to_string());
        if queries.len() >= MAX_ALTERNATIVE_QUERIES {
            break;
        }
    }

    queries.truncate(MAX_ALTERNATIVE_QUERIES);
    queries
}

fn is_boilerplate(text: &str) -> bool {
    let lower = text.to_lowercase();
    BOILERPLATE_WORDS.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vidsort_domain::{CatalogId, ContentType};

    struct MockMetadata {
        result: Option<CatalogMatch>,
        calls: AtomicUsize,
    }

    impl MockMetadata {
        fn returning(similarity: Option<f32>) -> Self {
            Self {
                result: similarity.map(|s| CatalogMatch {
                    id: CatalogId(27205),
                    title: "Inception".to_string(),
                    original_title: "Inception".to_string(),
                    year: Some(2010),
                    overview: None,
                    similarity: s,
                }),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MetadataSearch for MockMetadata {
        async fn best_match(
            &self,
            _title: &str,
            _year: Option<u16>,
            _content_type: ContentType,
            _min_score: f32,
        ) -> anyhow::Result<Option<CatalogMatch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    #[derive(Default)]
    struct MockHash {
        score: Option<f32>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HashLayer for MockHash {
        async fn match_file(
            &self,
            _video: &Path,
            _work_dir: &Path,
        ) -> anyhow::Result<Option<Evidence>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .score
                .map(|s| Evidence::unmatched(EvidenceSource::PerceptualHash, s)))
        }
    }

    #[derive(Default)]
    struct MockAudio {
        score: Option<f32>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AudioLayer for MockAudio {
        async fn match_file(
            &self,
            _video: &Path,
            _work_dir: &Path,
        ) -> anyhow::Result<Option<Evidence>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .score
                .map(|s| Evidence::unmatched(EvidenceSource::AudioFingerprint, s)))
        }
    }

    #[derive(Default)]
    struct MockVisual {
        report: Option<VisualReport>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VisualGather for MockVisual {
        async fn gather(
            &self,
            _video: &Path,
            _work_dir: &Path,
        ) -> anyhow::Result<Option<VisualReport>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.report.clone())
        }
    }

    fn candidate() -> FileCandidate {
        FileCandidate::movie(
            "Inception.2010.mkv",
            "/incoming/Inception.2010.mkv",
            "Inception",
            Some(2010),
        )
    }

    fn layers() -> LayersConfig {
        LayersConfig::default()
    }

    fn pipeline(
        layers: LayersConfig,
        metadata: Arc<MockMetadata>,
        phash: Option<Arc<MockHash>>,
        audio: Option<Arc<MockAudio>>,
        visual: Option<Arc<MockVisual>>,
    ) -> EscalationPipeline {
        EscalationPipeline::new(
            layers,
            0.8,
            0.5,
            metadata,
            phash.map(|m| m as Arc<dyn HashLayer>),
            audio.map(|m| m as Arc<dyn AudioLayer>),
            visual.map(|m| m as Arc<dyn VisualGather>),
        )
    }

    #[tokio::test]
    async fn confident_metadata_match_exits_early() {
        let metadata = Arc::new(MockMetadata::returning(Some(1.2)));
        let phash = Arc::new(MockHash {
            score: Some(0.9),
            ..Default::default()
        });
        let audio = Arc::new(MockAudio {
            score: Some(0.9),
            ..Default::default()
        });
        let visual = Arc::new(MockVisual::default());

        let p = pipeline(
            layers(),
            metadata.clone(),
            Some(phash.clone()),
            Some(audio.clone()),
            Some(visual.clone()),
        );
        let out = p.evaluate(&candidate(), Path::new("/tmp")).await;

        assert!(out.accepted());
        assert!(out.state.terminal);
        assert_eq!(out.state.confidence, 1.0);
        // no later layer may have been consulted
        assert_eq!(phash.calls.load(Ordering::SeqCst), 0);
        assert_eq!(audio.calls.load(Ordering::SeqCst), 0);
        assert_eq!(visual.calls.load(Ordering::SeqCst), 0);
        assert!(!out.layer1_ran && !out.layer2_ran && !out.layer3_ran);
    }

    #[tokio::test]
    async fn no_evidence_and_disabled_layers_defers() {
        let metadata = Arc::new(MockMetadata::returning(None));
        let p = pipeline(
            LayersConfig {
                layer1_enabled: false,
                layer2_enabled: false,
                layer3_enabled: false,
                ..layers()
            },
            metadata,
            None,
            None,
            None,
        );

        let out = p.evaluate(&candidate(), Path::new("/tmp")).await;
        assert!(!out.accepted());
        assert_eq!(out.state.confidence, 0.0);
        assert!(out.evidence.is_empty());
    }

    #[tokio::test]
    async fn weak_audio_match_halves_confidence() {
        let metadata = Arc::new(MockMetadata::returning(Some(0.70)));
        let audio = Arc::new(MockAudio {
            score: Some(0.5),
            ..Default::default()
        });
        let p = pipeline(
            LayersConfig {
                layer1_enabled: false,
                layer3_enabled: false,
                ..layers()
            },
            metadata,
            None,
            Some(audio.clone()),
            None,
        );

        let out = p.evaluate(&candidate(), Path::new("/tmp")).await;
        assert_eq!(audio.calls.load(Ordering::SeqCst), 1);
        assert!((out.state.confidence - 0.35).abs() < 1e-6);
        assert!(!out.accepted());
    }

    #[tokio::test]
    async fn strong_audio_match_confirms() {
        let metadata = Arc::new(MockMetadata::returning(None));
        let audio = Arc::new(MockAudio {
            score: Some(0.8),
            ..Default::default()
        });
        let p = pipeline(
            LayersConfig {
                layer1_enabled: false,
                layer3_enabled: false,
                ..layers()
            },
            metadata,
            None,
            Some(audio),
            None,
        );

        let out = p.evaluate(&candidate(), Path::new("/tmp")).await;
        assert!((out.state.confidence - 0.98).abs() < 1e-6);
        assert!(out.accepted());
    }

    #[tokio::test]
    async fn acceptance_boundary_is_inclusive() {
        for (similarity, accepted) in [(0.60, true), (0.59, false)] {
            let metadata = Arc::new(MockMetadata::returning(Some(similarity)));
            let p = pipeline(
                LayersConfig {
                    layer1_enabled: false,
                    layer2_enabled: false,
                    layer3_enabled: false,
                    ..layers()
                },
                metadata,
                None,
                None,
                None,
            );
            let out = p.evaluate(&candidate(), Path::new("/tmp")).await;
            assert_eq!(out.accepted(), accepted, "similarity {}", similarity);
        }
    }

    #[tokio::test]
    async fn strong_hash_confirms_and_skips_audio() {
        let metadata = Arc::new(MockMetadata::returning(Some(0.70)));
        let phash = Arc::new(MockHash {
            score: Some(0.9),
            ..Default::default()
        });
        let audio = Arc::new(MockAudio {
            score: Some(0.9),
            ..Default::default()
        });
        let p = pipeline(
            LayersConfig {
                layer3_enabled: false,
                ..layers()
            },
            metadata,
            Some(phash.clone()),
            Some(audio.clone()),
            None,
        );

        let out = p.evaluate(&candidate(), Path::new("/tmp")).await;
        assert!((out.state.confidence - 0.95).abs() < 1e-6);
        assert!(out.state.terminal);
        assert_eq!(phash.calls.load(Ordering::SeqCst), 1);
        assert_eq!(audio.calls.load(Ordering::SeqCst), 0);
        assert!(out.accepted());
    }

    #[tokio::test]
    async fn weak_hash_damps_and_verification_distrusts() {
        let metadata = Arc::new(MockMetadata::returning(None));
        let phash = Arc::new(MockHash {
            score: Some(0.7),
            ..Default::default()
        });
        let p = pipeline(
            LayersConfig {
                layer2_enabled: false,
                ..layers()
            },
            metadata,
            Some(phash),
            None,
            None,
        );

        let out = p.evaluate(&candidate(), Path::new("/tmp")).await;
        // 0.7 * 0.8 = 0.56 from the hash, then capped to 0.40 by
        // verification running with no visual evidence
        assert!((out.state.confidence - 0.40).abs() < 1e-6);
        assert!(out.layer3_ran);
        assert!(!out.accepted());
    }

    #[tokio::test]
    async fn ambiguous_verification_flags_manual_review() {
        let metadata = Arc::new(MockMetadata::returning(None));
        let visual = Arc::new(MockVisual {
            report: Some(VisualReport {
                detected_text: String::new(),
                actors: vec![],
                title_guess: None,
                confidence: 0.7,
            }),
            ..Default::default()
        });
        let p = pipeline(
            LayersConfig {
                layer1_enabled: false,
                layer2_enabled: false,
                ..layers()
            },
            metadata,
            None,
            None,
            Some(visual),
        );

        let out = p.evaluate(&candidate(), Path::new("/tmp")).await;
        // 0.7 * 0.9 = 0.63, inside the (0.50, 0.80) review band
        assert!((out.state.confidence - 0.65).abs() < 1e-6);
        assert!(out.state.manual_review);
        assert!(out.accepted());
    }

    #[tokio::test]
    async fn visual_proxy_feeds_the_hash_layer() {
        let metadata = Arc::new(MockMetadata::returning(None));
        let visual = Arc::new(MockVisual {
            report: Some(VisualReport {
                detected_text: "EL PADRINO".to_string(),
                actors: vec![],
                title_guess: Some("EL PADRINO".to_string()),
                confidence: 0.9,
            }),
            ..Default::default()
        });
        let p = pipeline(
            LayersConfig {
                layer2_enabled: false,
                layer3_enabled: false,
                ..layers()
            },
            metadata.clone(),
            None,
            None,
            Some(visual),
        );

        let out = p.evaluate(&candidate(), Path::new("/tmp")).await;
        // proxy score 0.9 >= 0.85 confirms at 0.95
        assert!((out.state.confidence - 0.95).abs() < 1e-6);
        assert!(out.accepted());
        // primary search plus alternative searches from the report
        assert!(metadata.calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn alternative_queries_filter_boilerplate_and_cap() {
        let report = VisualReport {
            detected_text: "Warner Bros Presents\nEl Laberinto\nuna\npelicula de culto\nGuillermo"
                .to_string(),
            actors: vec!["penelope_cruz".to_string()],
            title_guess: Some("Universal Pictures".to_string()),
            confidence: 0.8,
        };
        let queries = alternative_queries(&report);

        assert!(queries.len() <= MAX_ALTERNATIVE_QUERIES);
        assert!(queries.iter().all(|q| !q.to_lowercase().contains("warner")));
        assert!(queries.iter().all(|q| !q.to_lowercase().contains("universal")));
        assert!(queries.contains(&"penelope cruz".to_string()));
        assert!(queries.contains(&"El Laberinto".to_string()));
    }
}
