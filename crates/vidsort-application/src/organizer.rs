// SPDX-License-Identifier: GPL-3.0-or-later

//! Library layout and file placement.
//!
//! Builds the destination path for an accepted file, moves it (rename with a
//! copy-and-remove fallback for cross-device destinations) and writes the
//! NFO and analysis sidecars next to it.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use vidsort_domain::{CatalogMatch, ContentType, ExtraKind, FileCandidate, VisualReport};

/// Errors that can occur while placing a file into the library.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize NFO sidecar: {0}")]
    Nfo(#[from] quick_xml::SeError),

    #[error("No destination configured for {0} content")]
    NoDestination(ContentType),
}

/// Characters invalid on common filesystems, stripped from every path
/// component we generate.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Shortest original extra stem we keep verbatim; anything shorter gets a
/// generated name instead.
const MIN_EXTRA_STEM_CHARS: usize = 5;

/// Remove filesystem-hostile characters and collapse the resulting
/// whitespace.
pub fn scrub(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct Organizer {
    movies_dir: PathBuf,
    series_dir: PathBuf,
    unknown_dir: Option<PathBuf>,
    /// When false every operation is planned and logged but nothing touches
    /// the filesystem.
    move_files: bool,
}

impl Organizer {
    pub fn new(
        movies_dir: impl Into<PathBuf>,
        series_dir: impl Into<PathBuf>,
        unknown_dir: Option<PathBuf>,
        move_files: bool,
    ) -> Self {
        Self {
            movies_dir: movies_dir.into(),
            series_dir: series_dir.into(),
            unknown_dir,
            move_files,
        }
    }

    /// Place an accepted file, returning the destination it ended up at (or
    /// would end up at in a dry run).
    pub async fn organize(
        &self,
        candidate: &FileCandidate,
        catalog: Option<&CatalogMatch>,
        visual: Option<&VisualReport>,
    ) -> Result<PathBuf, OrganizeError> {
        let dest = self.destination(candidate, catalog)?;

        if !self.move_files {
            info!(
                target: "organizer",
                "dry run: {} -> {}",
                candidate.original_path.display(),
                dest.display()
            );
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let dest = resolve_collision(&dest);

        move_file(&candidate.original_path, &dest).await?;
        info!(
            target: "organizer",
            "moved {} -> {}",
            candidate.original_path.display(),
            dest.display()
        );

        if let Some(catalog) = catalog {
            if let Err(e) = self.write_nfo(&dest, candidate, catalog).await {
                warn!(target: "organizer", "failed to write NFO sidecar: {}", e);
            }
        }
        if let Some(report) = visual {
            if let Err(e) = write_analysis_sidecar(&dest, report).await {
                warn!(target: "organizer", "failed to write analysis sidecar: {}", e);
            }
        }

        Ok(dest)
    }

    /// Compute the library path for a candidate without touching the
    /// filesystem. Catalog title and year take precedence over the parse.
    pub fn destination(
        &self,
        candidate: &FileCandidate,
        catalog: Option<&CatalogMatch>,
    ) -> Result<PathBuf, OrganizeError> {
        let title = scrub(catalog.map(|c| c.title.as_str()).unwrap_or(&candidate.title));
        let year = catalog.and_then(|c| c.year).or(candidate.year);
        let ext = extension(&candidate.original_path);

        match candidate.content_type {
            ContentType::Movie => {
                let folder = display_title(&title, year);
                Ok(self
                    .movies_dir
                    .join(&folder)
                    .join(format!("{}.{}", folder, ext)))
            }
            ContentType::Series => {
                let season = candidate.season.unwrap_or(1);
                let episode = candidate.episode.unwrap_or(1);
                Ok(self
                    .series_dir
                    .join(&title)
                    .join(format!("Season {:02}", season))
                    .join(format!("{} - S{:02}E{:02}.{}", title, season, episode, ext)))
            }
            ContentType::Extra => {
                let kind = candidate.extra_kind.unwrap_or(ExtraKind::Generic);
                let subdir = match kind {
                    ExtraKind::Featurette | ExtraKind::Documentary | ExtraKind::Interview => {
                        "Specials"
                    }
                    _ => "Extras",
                };
                let stem = candidate
                    .original_path
                    .file_stem()
                    .map(|s| scrub(&s.to_string_lossy()))
                    .unwrap_or_default();
                let name = if stem.chars().count() > MIN_EXTRA_STEM_CHARS {
                    stem
                } else {
                    format!("{} - {}", title, kind.label())
                };
                Ok(self
                    .movies_dir
                    .join(&title)
                    .join(subdir)
                    .join(format!("{}.{}", name, ext)))
            }
            ContentType::Unrecognized => {
                let dir = self
                    .unknown_dir
                    .as_ref()
                    .ok_or(OrganizeError::NoDestination(ContentType::Unrecognized))?;
                Ok(dir.join(&candidate.original_name))
            }
        }
    }

    async fn write_nfo(
        &self,
        dest: &Path,
        candidate: &FileCandidate,
        catalog: &CatalogMatch,
    ) -> Result<(), OrganizeError> {
        let root = match candidate.content_type {
            ContentType::Series => "episodedetails",
            _ => "movie",
        };
        let doc = NfoDocument {
            title: &catalog.title,
            originaltitle: &catalog.original_title,
            year: catalog.year.or(candidate.year),
            season: candidate.season,
            episode: candidate.episode,
            plot: catalog.overview.as_deref(),
            uniqueid: NfoUniqueId {
                kind: "tmdb",
                default: true,
                value: catalog.id.0,
            },
        };

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let serializer = quick_xml::se::Serializer::with_root(&mut xml, Some(root))?;
        doc.serialize(serializer)?;

        let path = dest.with_extension("nfo");
        tokio::fs::write(&path, xml).await?;
        debug!(target: "organizer", "wrote NFO sidecar {}", path.display());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct NfoDocument<'a> {
    title: &'a str,
    originaltitle: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    episode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plot: Option<&'a str>,
    uniqueid: NfoUniqueId,
}

#[derive(Debug, Serialize)]
struct NfoUniqueId {
    #[serde(rename = "@type")]
    kind: &'static str,
    #[serde(rename = "@default")]
    default: bool,
    #[serde(rename = "$text")]
    value: u64,
}

/// Plain-text dump of the visual analysis, written next to the video.
async fn write_analysis_sidecar(dest: &Path, report: &VisualReport) -> std::io::Result<()> {
    let mut body = String::new();
    if let Some(guess) = &report.title_guess {
        body.push_str(&format!("Title guess: {}\n", guess));
    }
    if !report.actors.is_empty() {
        body.push_str(&format!("Actors: {}\n", report.actors.join(", ")));
    }
    body.push_str(&format!("Confidence: {:.2}\n", report.confidence));
    if !report.detected_text.trim().is_empty() {
        body.push_str("\nDetected text:\n");
        body.push_str(report.detected_text.trim());
        body.push('\n');
    }

    let path = dest.with_extension("analysis.txt");
    tokio::fs::write(&path, body).await?;
    debug!(target: "organizer", "wrote analysis sidecar {}", path.display());
    Ok(())
}

fn display_title(title: &str, year: Option<u16>) -> String {
    match year {
        Some(y) => format!("{} ({})", title, y),
        None => title.to_string(),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "mkv".to_string())
}

/// Find a free name by appending " (N)". An existing copy counter on the
/// stem is stripped first so collisions never stack counters.
fn resolve_collision(dest: &Path) -> PathBuf {
    if !dest.exists() {
        return dest.to_path_buf();
    }
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = strip_copy_suffix(&stem);
    let ext = dest.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 1u32.. {
        let name = match &ext {
            Some(e) => format!("{} ({}).{}", base, n, e),
            None => format!("{} ({})", base, n),
        };
        let numbered = dest.with_file_name(&name);
        if !numbered.exists() {
            return numbered;
        }
    }
    unreachable!()
}

fn strip_copy_suffix(stem: &str) -> &str {
    if let Some(open) = stem.rfind(" (") {
        if stem.ends_with(')') {
            let inner = &stem[open + 2..stem.len() - 1];
            if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
                return &stem[..open];
            }
        }
    }
    stem
}

/// Rename, falling back to copy-and-remove when the destination is on a
/// different filesystem.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                target: "organizer",
                "rename failed ({}), falling back to copy", e
            );
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}
