// SPDX-License-Identifier: GPL-3.0-or-later

//! Reference catalog builder.
//!
//! Walks an already-organized movie library, samples frames from each
//! title, hashes them and stores the hashes for the perceptual-hash
//! layer. Long runs can be paused, resumed and stopped cooperatively.

use crate::reference::{ReferenceHash, ReferenceHashRepository};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vidsort_application::metadata::MetadataSearch;
use vidsort_application::phash::hash_file;
use vidsort_domain::ContentType;
use vidsort_visual::FrameGrabber;

const PAUSE_POLL: Duration = Duration::from_millis(200);

/// Cooperative control handle shared with the caller.
#[derive(Clone, Default)]
pub struct BuilderControl {
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl BuilderControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuilderStatistics {
    pub titles_processed: u64,
    pub titles_skipped: u64,
    pub hashes_stored: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

pub struct ReferenceBuilder {
    repository: Arc<dyn ReferenceHashRepository>,
    metadata: Arc<dyn MetadataSearch>,
    frames: FrameGrabber,
    control: BuilderControl,
    /// Metadata threshold for resolving a folder name to a catalog id.
    min_score: f32,
    video_extensions: Vec<String>,
}

impl ReferenceBuilder {
    pub fn new(
        repository: Arc<dyn ReferenceHashRepository>,
        metadata: Arc<dyn MetadataSearch>,
        control: BuilderControl,
        min_score: f32,
        video_extensions: Vec<String>,
    ) -> Self {
        Self {
            repository,
            metadata,
            frames: FrameGrabber::new(),
            control,
            min_score,
            video_extensions,
        }
    }

    /// Build reference hashes from every `Title (Year)` folder under
    /// `movies_dir`. Returns the statistics accumulated up to a stop
    /// request or the end of the library.
    pub async fn build_from_library(&self, movies_dir: &Path) -> Result<BuilderStatistics> {
        let started = Instant::now();
        let mut stats = BuilderStatistics::default();

        let mut folders = Vec::new();
        let mut entries = tokio::fs::read_dir(movies_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                folders.push(entry.path());
            }
        }
        folders.sort();

        info!(
            target: "builder",
            "building reference hashes from {} titles under {}",
            folders.len(),
            movies_dir.display()
        );

        let work_dir = std::env::temp_dir().join("vidsort-reference-builder");
        tokio::fs::create_dir_all(&work_dir).await?;

        for folder in folders {
            if self.wait_if_paused().await {
                info!(target: "builder", "stop requested, finishing early");
                break;
            }

            match self.process_title(&folder, &work_dir).await {
                Ok(Some(stored)) => {
                    stats.titles_processed += 1;
                    stats.hashes_stored += stored;
                }
                Ok(None) => stats.titles_skipped += 1,
                Err(e) => {
                    warn!(target: "builder", "{}: {}", folder.display(), e);
                    stats.errors += 1;
                }
            }
        }

        if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            debug!(target: "builder", "work dir cleanup: {}", e);
        }

        stats.elapsed = started.elapsed();
        info!(
            target: "builder",
            "reference build done: {} titles, {} hashes, {} skipped, {} errors",
            stats.titles_processed,
            stats.hashes_stored,
            stats.titles_skipped,
            stats.errors
        );
        Ok(stats)
    }

    /// Returns true when the builder should stop.
    async fn wait_if_paused(&self) -> bool {
        loop {
            if self.control.is_stopped() {
                return true;
            }
            if !self.control.is_paused() {
                return false;
            }
            tokio::time::sleep(PAUSE_POLL).await;
        }
    }

    async fn process_title(&self, folder: &Path, work_dir: &Path) -> Result<Option<u64>> {
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (title, year) = split_title_year(&folder_name);

        let Some(video) = self.first_video(folder).await? else {
            debug!(target: "builder", "no video file in {}", folder.display());
            return Ok(None);
        };

        let Some(catalog) = self
            .metadata
            .best_match(&title, year, ContentType::Movie, self.min_score)
            .await?
        else {
            debug!(target: "builder", "no catalog match for '{}'", title);
            return Ok(None);
        };

        let frames = self.frames.extract(&video, work_dir).await?;
        let mut stored = 0u64;
        for (index, frame) in frames.iter().enumerate() {
            let hash = match hash_file(frame) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(target: "builder", "could not hash {}: {}", frame.display(), e);
                    continue;
                }
            };
            self.repository
                .insert(&ReferenceHash {
                    catalog_id: catalog.id,
                    title: catalog.title.clone(),
                    year: catalog.year,
                    frame_index: index as u32,
                    hash,
                })
                .await?;
            stored += 1;
        }

        debug!(
            target: "builder",
            "stored {} hashes for '{}'",
            stored, catalog.title
        );
        Ok(Some(stored))
    }

    async fn first_video(&self, folder: &Path) -> Result<Option<PathBuf>> {
        let mut entries = tokio::fs::read_dir(folder).await?;
        let mut videos = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_video = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .map(|e| self.video_extensions.iter().any(|known| known == &e))
                .unwrap_or(false);
            if entry.file_type().await?.is_file() && is_video {
                videos.push(path);
            }
        }
        videos.sort();
        Ok(videos.into_iter().next())
    }
}

/// Split an organized folder name like `Inception (2010)` into title and
/// year. Names without the year suffix come back whole.
fn split_title_year(name: &str) -> (String, Option<u16>) {
    if let Some(open) = name.rfind(" (") {
        if name.ends_with(')') {
            let inner = &name[open + 2..name.len() - 1];
            if inner.len() == 4 {
                if let Ok(year) = inner.parse::<u16>() {
                    return (name[..open].to_string(), Some(year));
                }
            }
        }
    }
    (name.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_year_folder_splits() {
        assert_eq!(
            split_title_year("Inception (2010)"),
            ("Inception".to_string(), Some(2010))
        );
        assert_eq!(split_title_year("Inception"), ("Inception".to_string(), None));
        // a parenthesized suffix that is not a year stays in the title
        assert_eq!(
            split_title_year("Ocean's (Eleven)"),
            ("Ocean's (Eleven)".to_string(), None)
        );
    }

    #[test]
    fn control_flags_toggle() {
        let control = BuilderControl::new();
        assert!(!control.is_paused());
        assert!(!control.is_stopped());

        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());

        control.stop();
        assert!(control.is_stopped());
    }

    #[tokio::test]
    async fn stopped_control_exits_the_wait_loop() {
        let control = BuilderControl::new();
        control.pause();
        control.stop();

        let builder = noop_builder(control);
        assert!(builder.wait_if_paused().await);
    }

    #[tokio::test]
    async fn running_control_does_not_block() {
        let builder = noop_builder(BuilderControl::new());
        assert!(!builder.wait_if_paused().await);
    }

    fn noop_builder(control: BuilderControl) -> ReferenceBuilder {
        use async_trait::async_trait;
        use vidsort_domain::CatalogMatch;

        struct NoMetadata;

        #[async_trait]
        impl MetadataSearch for NoMetadata {
            async fn best_match(
                &self,
                _title: &str,
                _year: Option<u16>,
                _content_type: ContentType,
                _min_score: f32,
            ) -> Result<Option<CatalogMatch>> {
                Ok(None)
            }
        }

        struct NoRepo;

        #[async_trait]
        impl ReferenceHashRepository for NoRepo {
            async fn insert(&self, _entry: &ReferenceHash) -> Result<()> {
                Ok(())
            }
            async fn all(&self) -> Result<Vec<ReferenceHash>> {
                Ok(Vec::new())
            }
            async fn count(&self) -> Result<u64> {
                Ok(0)
            }
            async fn delete_title(&self, _catalog_id: vidsort_domain::CatalogId) -> Result<u64> {
                Ok(0)
            }
        }

        ReferenceBuilder::new(
            Arc::new(NoRepo),
            Arc::new(NoMetadata),
            control,
            0.8,
            vec!["mkv".to_string()],
        )
    }
}
