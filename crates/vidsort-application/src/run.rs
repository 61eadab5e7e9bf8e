// SPDX-License-Identifier: GPL-3.0-or-later

//! The sequential processing run.
//!
//! Files are handled strictly one at a time. A failure on one file is
//! counted and the run moves on; the run itself aborts only when the source
//! directory disappears underneath it.

use crate::events::EventPublisher;
use crate::organizer::{OrganizeError, Organizer};
use crate::pipeline::{EscalationPipeline, PipelineOutcome};
use crate::{parser, scan};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use vidsort_domain::{
    ContentType, DomainEvent, FileAcceptedPayload, FileCandidate, FileDeferredPayload,
    LayerEscalatedPayload, RunCompletedPayload, RunId, RunStatistics, Verdict,
};

pub struct RunEngine<E: EventPublisher> {
    source: PathBuf,
    extensions: Vec<String>,
    pipeline: EscalationPipeline,
    organizer: Organizer,
    events: E,
}

impl<E: EventPublisher> RunEngine<E> {
    pub fn new(
        source: impl Into<PathBuf>,
        extensions: Vec<String>,
        pipeline: EscalationPipeline,
        organizer: Organizer,
        events: E,
    ) -> Self {
        Self {
            source: source.into(),
            extensions,
            pipeline,
            organizer,
            events,
        }
    }

    /// Process every video under the source directory once.
    pub async fn run(&self) -> anyhow::Result<RunStatistics> {
        let run_id = RunId::new();
        let started = Instant::now();
        let mut stats = RunStatistics::default();

        let videos = scan::scan_videos(&self.source, &self.extensions).await?;
        info!(
            target: "run",
            "run {} starting: {} video files under {}",
            run_id,
            videos.len(),
            self.source.display()
        );

        let work_root = std::env::temp_dir().join(format!("vidsort-{}", run_id));

        for (index, video) in videos.iter().enumerate() {
            if !self.source.exists() {
                error!(
                    target: "run",
                    "source directory {} vanished, aborting run",
                    self.source.display()
                );
                break;
            }

            let work_dir = work_root.join(format!("file-{:04}", index));
            if let Err(e) = tokio::fs::create_dir_all(&work_dir).await {
                warn!(target: "run", "could not create work dir: {}", e);
            }

            self.process_file(video, &work_dir, &mut stats).await;
        }

        if let Err(e) = tokio::fs::remove_dir_all(&work_root).await {
            debug!(target: "run", "work dir cleanup: {}", e);
        }

        stats.elapsed = started.elapsed();
        self.events.publish(&DomainEvent::new(
            "run.completed",
            RunCompletedPayload {
                run_id,
                statistics: stats.clone(),
            },
        ));
        info!(
            target: "run",
            "run {} finished in {}: {} moved, {} deferred, {} unrecognized, {} errors",
            run_id,
            stats.elapsed_display(),
            stats.total_moved(),
            stats.deferred,
            stats.unrecognized,
            stats.errors
        );
        Ok(stats)
    }

    async fn process_file(&self, video: &Path, work_dir: &Path, stats: &mut RunStatistics) {
        let candidate = match parser::parse(video) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(target: "run", "{}: {}", video.display(), e);
                FileCandidate::unrecognized(
                    video
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    video,
                )
            }
        };

        match candidate.content_type {
            ContentType::Unrecognized => {
                stats.unrecognized += 1;
                match self.organizer.organize(&candidate, None, None).await {
                    Ok(dest) => {
                        debug!(
                            target: "run",
                            "unrecognized {} -> {}",
                            candidate.original_name,
                            dest.display()
                        );
                    }
                    // no unknown directory configured: the file stays put
                    Err(OrganizeError::NoDestination(_)) => {}
                    Err(e) => {
                        warn!(target: "run", "{}: {}", candidate.original_name, e);
                        stats.errors += 1;
                    }
                }
            }
            ContentType::Extra => {
                match self.organizer.organize(&candidate, None, None).await {
                    Ok(_) => stats.extras_moved += 1,
                    Err(e) => {
                        warn!(target: "run", "{}: {}", candidate.original_name, e);
                        stats.errors += 1;
                    }
                }
            }
            ContentType::Movie | ContentType::Series => {
                let outcome = self.pipeline.evaluate(&candidate, work_dir).await;
                self.record_outcome(&candidate, &outcome, stats);

                match outcome.verdict {
                    Some(Verdict::Accept) => {
                        match self
                            .organizer
                            .organize(&candidate, outcome.catalog.as_ref(), outcome.visual.as_ref())
                            .await
                        {
                            Ok(dest) => {
                                match candidate.content_type {
                                    ContentType::Series => stats.series_moved += 1,
                                    _ => stats.movies_moved += 1,
                                }
                                self.events.publish(&DomainEvent::new(
                                    "file.accepted",
                                    FileAcceptedPayload {
                                        original_name: candidate.original_name.clone(),
                                        destination: dest,
                                        confidence: outcome.state.confidence,
                                    },
                                ));
                            }
                            Err(e) => {
                                warn!(target: "run", "{}: {}", candidate.original_name, e);
                                stats.errors += 1;
                            }
                        }
                    }
                    Some(Verdict::Defer) | None => {
                        stats.deferred += 1;
                        if outcome.state.manual_review {
                            info!(
                                target: "run",
                                "{} flagged for manual review",
                                candidate.original_name
                            );
                        }
                        self.events.publish(&DomainEvent::new(
                            "file.deferred",
                            FileDeferredPayload {
                                original_name: candidate.original_name.clone(),
                                confidence: outcome.state.confidence,
                            },
                        ));
                    }
                }
            }
        }
    }

    fn record_outcome(
        &self,
        candidate: &FileCandidate,
        outcome: &PipelineOutcome,
        stats: &mut RunStatistics,
    ) {
        if outcome.visual_ran {
            stats.visual_analysis_runs += 1;
        }
        if outcome.layer1_ran {
            stats.layer1_runs += 1;
        }
        if outcome.layer2_ran {
            stats.layer2_runs += 1;
        }
        if outcome.layer3_ran {
            stats.layer3_runs += 1;
        }
        if outcome.alternative_search_hit {
            stats.alternative_search_hits += 1;
        }
        if let Some(report) = &outcome.visual {
            stats.record_actors(report.actors.iter().cloned());
        }

        for (layer, before, after) in &outcome.escalations {
            self.events.publish(&DomainEvent::new(
                "layer.escalated",
                LayerEscalatedPayload {
                    original_name: candidate.original_name.clone(),
                    layer: *layer,
                    confidence_before: *before,
                    confidence_after: *after,
                },
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventBus;
    use crate::metadata::MetadataSearch;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::tempdir;
    use vidsort_config::LayersConfig;
    use vidsort_domain::{CatalogId, CatalogMatch};

    struct FixedMetadata {
        similarity: Option<f32>,
    }

    #[async_trait]
    impl MetadataSearch for FixedMetadata {
        async fn best_match(
            &self,
            title: &str,
            year: Option<u16>,
            _content_type: ContentType,
            _min_score: f32,
        ) -> anyhow::Result<Option<CatalogMatch>> {
            Ok(self.similarity.map(|s| CatalogMatch {
                id: CatalogId(603),
                title: title.to_string(),
                original_title: title.to_string(),
                year,
                overview: None,
                similarity: s,
            }))
        }
    }

    fn engine(
        source: &Path,
        library: &Path,
        similarity: Option<f32>,
    ) -> RunEngine<InMemoryEventBus> {
        let layers = LayersConfig {
            layer1_enabled: false,
            layer2_enabled: false,
            layer3_enabled: false,
            ..LayersConfig::default()
        };
        let pipeline = EscalationPipeline::new(
            layers,
            0.8,
            0.5,
            Arc::new(FixedMetadata { similarity }),
            None,
            None,
            None,
        );
        let organizer = Organizer::new(
            library.join("movies"),
            library.join("series"),
            Some(library.join("unknown")),
            true,
        );
        RunEngine::new(
            source,
            vec!["mkv".to_string(), "mp4".to_string()],
            pipeline,
            organizer,
            InMemoryEventBus::new(),
        )
    }

    #[tokio::test]
    async fn accepted_movie_is_moved_and_counted() {
        let source = tempdir().unwrap();
        let library = tempdir().unwrap();
        std::fs::write(source.path().join("The.Matrix.1999.1080p.mkv"), b"x").unwrap();

        let engine = engine(source.path(), library.path(), Some(0.97));
        let stats = engine.run().await.unwrap();

        assert_eq!(stats.movies_moved, 1);
        assert_eq!(stats.deferred, 0);
        assert!(library
            .path()
            .join("movies/The Matrix (1999)/The Matrix (1999).mkv")
            .exists());

        let events = engine.events.drain();
        assert!(events.iter().any(|e| e["name"] == "file.accepted"));
        assert!(events.iter().any(|e| e["name"] == "run.completed"));
    }

    #[tokio::test]
    async fn unmatched_file_is_deferred_in_place() {
        let source = tempdir().unwrap();
        let library = tempdir().unwrap();
        let file = source.path().join("Obscure.Film.mkv");
        std::fs::write(&file, b"x").unwrap();

        let engine = engine(source.path(), library.path(), None);
        let stats = engine.run().await.unwrap();

        assert_eq!(stats.deferred, 1);
        assert_eq!(stats.total_moved(), 0);
        assert!(file.exists());

        let events = engine.events.drain();
        assert!(events.iter().any(|e| e["name"] == "file.deferred"));
    }

    #[tokio::test]
    async fn junk_names_land_in_the_unknown_directory() {
        let source = tempdir().unwrap();
        let library = tempdir().unwrap();
        std::fs::write(source.path().join("12345.mkv"), b"x").unwrap();

        let engine = engine(source.path(), library.path(), Some(0.97));
        let stats = engine.run().await.unwrap();

        assert_eq!(stats.unrecognized, 1);
        assert!(library.path().join("unknown/12345.mkv").exists());
    }

    #[tokio::test]
    async fn extras_bypass_the_pipeline() {
        let source = tempdir().unwrap();
        let library = tempdir().unwrap();
        let parent = source.path().join("Inception (2010)");
        std::fs::create_dir(&parent).unwrap();
        std::fs::write(parent.join("Making.of.Inception.Featurette.mkv"), b"x").unwrap();

        // metadata similarity None would defer a movie; the extra still moves
        let engine = engine(source.path(), library.path(), None);
        let stats = engine.run().await.unwrap();

        assert_eq!(stats.extras_moved, 1);
        assert_eq!(stats.deferred, 0);
    }

    #[tokio::test]
    async fn missing_source_directory_fails_the_run() {
        let library = tempdir().unwrap();
        let engine = engine(Path::new("/no/such/source"), library.path(), None);
        assert!(engine.run().await.is_err());
    }
}
