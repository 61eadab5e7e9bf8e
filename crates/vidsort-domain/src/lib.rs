// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Value Objects & IDs
// ============================================================================

/// Numeric identifier of a title in the external metadata catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogId(pub u64);

impl std::fmt::Display for CatalogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// File Candidate
// ============================================================================

/// Content classification produced by the filename parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Movie,
    Series,
    Extra,
    Unrecognized,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Movie => write!(f, "movie"),
            ContentType::Series => write!(f, "series"),
            ContentType::Extra => write!(f, "extra"),
            ContentType::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Kind of supplementary content (featurettes, trailers, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraKind {
    Featurette,
    Interview,
    Documentary,
    Trailer,
    DeletedScene,
    Blooper,
    Commentary,
    Generic,
}

impl ExtraKind {
    /// Folder label used when the original filename is not descriptive.
    pub fn label(&self) -> &'static str {
        match self {
            ExtraKind::Featurette => "Featurette",
            ExtraKind::Interview => "Interview",
            ExtraKind::Documentary => "Documentary",
            ExtraKind::Trailer => "Trailer",
            ExtraKind::DeletedScene => "Deleted Scene",
            ExtraKind::Blooper => "Blooper",
            ExtraKind::Commentary => "Commentary",
            ExtraKind::Generic => "Extra",
        }
    }
}

/// One scanned file, parsed once at scan time and immutable afterwards.
///
/// Enrichment from later matchers is attached as [`Evidence`] records so the
/// original parse stays recoverable for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCandidate {
    pub original_name: String,
    pub original_path: PathBuf,
    pub content_type: ContentType,
    /// Cleaned title; never empty unless `content_type` is `Unrecognized`.
    pub title: String,
    pub year: Option<u16>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub extra_kind: Option<ExtraKind>,
}

impl FileCandidate {
    pub fn movie(
        original_name: impl Into<String>,
        original_path: impl Into<PathBuf>,
        title: impl Into<String>,
        year: Option<u16>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            original_path: original_path.into(),
            content_type: ContentType::Movie,
            title: title.into(),
            year,
            season: None,
            episode: None,
            extra_kind: None,
        }
    }

    pub fn series(
        original_name: impl Into<String>,
        original_path: impl Into<PathBuf>,
        title: impl Into<String>,
        season: u32,
        episode: u32,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            original_path: original_path.into(),
            content_type: ContentType::Series,
            title: title.into(),
            year: None,
            season: Some(season),
            episode: Some(episode),
            extra_kind: None,
        }
    }

    pub fn extra(
        original_name: impl Into<String>,
        original_path: impl Into<PathBuf>,
        title: impl Into<String>,
        kind: ExtraKind,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            original_path: original_path.into(),
            content_type: ContentType::Extra,
            title: title.into(),
            year: None,
            season: None,
            episode: None,
            extra_kind: Some(kind),
        }
    }

    pub fn unrecognized(
        original_name: impl Into<String>,
        original_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            original_path: original_path.into(),
            content_type: ContentType::Unrecognized,
            title: String::new(),
            year: None,
            season: None,
            episode: None,
            extra_kind: None,
        }
    }
}

// ============================================================================
// Evidence
// ============================================================================

/// The matcher that produced a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Metadata,
    PerceptualHash,
    AudioFingerprint,
    VisualOcr,
}

impl std::fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceSource::Metadata => write!(f, "metadata"),
            EvidenceSource::PerceptualHash => write!(f, "perceptual-hash"),
            EvidenceSource::AudioFingerprint => write!(f, "audio-fingerprint"),
            EvidenceSource::VisualOcr => write!(f, "visual-ocr"),
        }
    }
}

/// One scored contribution from one matcher.
///
/// `detail` is diagnostic only; it never feeds scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: EvidenceSource,
    /// Score in [0, 1].
    pub score: f32,
    pub matched_title: Option<String>,
    pub matched_id: Option<CatalogId>,
    pub matched_year: Option<u16>,
    pub detail: Option<String>,
}

impl Evidence {
    pub fn unmatched(source: EvidenceSource, score: f32) -> Self {
        Self {
            source,
            score,
            matched_title: None,
            matched_id: None,
            matched_year: None,
            detail: None,
        }
    }
}

/// Resolved catalog entry kept alongside metadata evidence for sidecar
/// generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogMatch {
    pub id: CatalogId,
    pub title: String,
    pub original_title: String,
    pub year: Option<u16>,
    pub overview: Option<String>,
    /// Token-set similarity plus any year bonus; may exceed 1.0 before the
    /// pipeline consumes it.
    pub similarity: f32,
}

/// Raw output of the visual analysis pass, cached for reuse by the
/// perceptual-hash and verification layers and dumped into the analysis
/// sidecar on acceptance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualReport {
    pub detected_text: String,
    pub actors: Vec<String>,
    pub title_guess: Option<String>,
    pub confidence: f32,
}

// ============================================================================
// Decision State
// ============================================================================

/// One stage of the escalation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    Metadata,
    PerceptualHash,
    AudioFingerprint,
    Verification,
}

impl Layer {
    pub fn index(&self) -> u8 {
        match self {
            Layer::Metadata => 0,
            Layer::PerceptualHash => 1,
            Layer::AudioFingerprint => 2,
            Layer::Verification => 3,
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer {}", self.index())
    }
}

/// Accumulator threaded through the escalation pipeline for one file.
///
/// Discarded after the move/defer decision is recorded; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionState {
    pub confidence: f32,
    pub stage_reached: Layer,
    pub terminal: bool,
    /// Set when the verification layer lands in its ambiguous band and the
    /// file should be surfaced for manual review.
    pub manual_review: bool,
}

impl DecisionState {
    pub fn new() -> Self {
        Self {
            confidence: 0.0,
            stage_reached: Layer::Metadata,
            terminal: false,
            manual_review: false,
        }
    }
}

impl Default for DecisionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Final verdict for one file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Defer,
}

// ============================================================================
// Run Statistics
// ============================================================================

/// Aggregate counters for one processing run.
///
/// Owned exclusively by the sequential run loop; finalized and reported once
/// at run end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub movies_moved: u64,
    pub series_moved: u64,
    pub extras_moved: u64,
    pub deferred: u64,
    pub unrecognized: u64,
    pub errors: u64,
    pub layer1_runs: u64,
    pub layer2_runs: u64,
    pub layer3_runs: u64,
    pub visual_analysis_runs: u64,
    pub alternative_search_hits: u64,
    pub actors_seen: BTreeSet<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunStatistics {
    pub fn record_actors<I, S>(&mut self, actors: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for actor in actors {
            self.actors_seen.insert(actor.into());
        }
    }

    pub fn total_moved(&self) -> u64 {
        self.movies_moved + self.series_moved + self.extras_moved
    }

    /// Elapsed wall time formatted without sub-second noise.
    pub fn elapsed_display(&self) -> String {
        let total = self.elapsed.as_secs();
        format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
    }
}

// ============================================================================
// Domain Events
// ============================================================================

/// Envelope for a structured event emitted by the core.
///
/// The external surface (CLI today) subscribes via an event publisher rather
/// than passing logging callbacks into every layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub name: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: &'static str, payload: T) -> Self {
        Self {
            name,
            occurred_at: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAcceptedPayload {
    pub original_name: String,
    pub destination: PathBuf,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDeferredPayload {
    pub original_name: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerEscalatedPayload {
    pub original_name: String,
    pub layer: Layer,
    pub confidence_before: f32,
    pub confidence_after: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCompletedPayload {
    pub run_id: RunId,
    pub statistics: RunStatistics,
}

pub type FileAccepted = DomainEvent<FileAcceptedPayload>;
pub type FileDeferred = DomainEvent<FileDeferredPayload>;
pub type LayerEscalated = DomainEvent<LayerEscalatedPayload>;
pub type RunCompleted = DomainEvent<RunCompletedPayload>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_constructors_set_variant_fields() {
        let movie = FileCandidate::movie("Inception.mkv", "/in/Inception.mkv", "Inception", Some(2010));
        assert_eq!(movie.content_type, ContentType::Movie);
        assert_eq!(movie.year, Some(2010));
        assert!(movie.season.is_none());

        let episode = FileCandidate::series("Show.S01E03.mkv", "/in/Show.S01E03.mkv", "Show", 1, 3);
        assert_eq!(episode.content_type, ContentType::Series);
        assert_eq!(episode.season, Some(1));
        assert_eq!(episode.episode, Some(3));
        assert!(episode.year.is_none());

        let unknown = FileCandidate::unrecognized("tmp001.mkv", "/in/tmp001.mkv");
        assert_eq!(unknown.content_type, ContentType::Unrecognized);
        assert!(unknown.title.is_empty());
    }

    #[test]
    fn statistics_deduplicate_actors() {
        let mut stats = RunStatistics::default();
        stats.record_actors(["Tom Hanks", "Tom Hanks", "Meg Ryan"]);
        assert_eq!(stats.actors_seen.len(), 2);
    }

    #[test]
    fn elapsed_display_drops_subseconds() {
        let stats = RunStatistics {
            elapsed: Duration::from_millis(3_725_400),
            ..Default::default()
        };
        assert_eq!(stats.elapsed_display(), "01:02:05");
    }

    #[test]
    fn layer_ordering_matches_escalation_order() {
        assert!(Layer::Metadata < Layer::PerceptualHash);
        assert!(Layer::PerceptualHash < Layer::AudioFingerprint);
        assert!(Layer::AudioFingerprint < Layer::Verification);
        assert_eq!(Layer::Verification.index(), 3);
    }
}
