// SPDX-License-Identifier: GPL-3.0-or-later

//! Filename classification and title cleaning.
//!
//! Parsing happens once per file at scan time; everything downstream
//! works from the resulting [`FileCandidate`] and never re-reads the
//! original name.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use vidsort_domain::{ExtraKind, FileCandidate};

#[derive(Debug, Error)]
pub enum ParserError {
    /// The series detector fired but no episode pattern captured fields.
    #[error("series markers present but unparseable: {name}")]
    UnparseableSeries { name: String },
}

lazy_static! {
    // Junk: the whole stem is digits
    static ref PURE_DIGITS: Regex = Regex::new(r"^\d+$").unwrap();

    // Any of these marks an episode file
    static ref SERIES_MARKER: Regex = Regex::new(
        r"(?i)(S\d+\s*E\d+|\d+x\d+|Temporada\s*\d+|Season\s*\d+|Episode\s*\d+)"
    ).unwrap();

    // Year token in the 1900-2099 range
    static ref YEAR: Regex = Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap();

    // Bracketed annotations: [group], {tags}, (notes)
    static ref BRACKETS: Regex = Regex::new(r"[\[({][^\])}]*[\])}]").unwrap();

    // Release-group, quality, codec and edition tokens
    static ref NOISE_TOKENS: Regex = Regex::new(
        r"(?i)\b(480p|576p|720p|1080p|2160p|4k|8k|uhd|fhd|hdr|hd|bluray|blu ray|brrip|bdrip|dvdrip|dvdscr|dvd|webrip|web dl|webdl|web|hdtv|hdrip|camrip|cam|telesync|x264|x265|h264|h265|hevc|avc|xvid|divx|av1|aac|ac3|eac3|dts|mp3|flac|atmos|remux|remastered|extended|unrated|uncut|proper|repack|limited|internal|subbed|dubbed|subs|multi|dual|latino|castellano|vose|esp|eng)\b"
    ).unwrap();

    // Ordered episode extraction alternatives; first match wins
    static ref SERIES_SXXEYY: Regex = Regex::new(
        r"(?i)^(?P<title>.*?)\s*\bS(?P<season>\d+)\s*E(?P<episode>\d+)\b"
    ).unwrap();
    static ref SERIES_NXM: Regex = Regex::new(
        r"(?i)^(?P<title>.*?)\s*\b(?P<season>\d+)x(?P<episode>\d+)\b"
    ).unwrap();
    static ref SERIES_TEMPORADA: Regex = Regex::new(
        r"(?i)^(?P<title>.*?)\s*\bTemporada\s*(?P<season>\d+).*?\bCap(?:itulo)?\.?\s*(?P<episode>\d+)\b"
    ).unwrap();
    static ref SERIES_SEASON: Regex = Regex::new(
        r"(?i)^(?P<title>.*?)\s*\bSeason\s*(?P<season>\d+).*?\bEpisode\s*(?P<episode>\d+)\b"
    ).unwrap();

    // Parent folders worth deriving an extra's title from:
    // "Title (2006)" or "Title Season 2" / "Title Temporada 2"
    static ref PARENT_SEASON_DIR: Regex = Regex::new(
        r"(?i)^(?P<title>.+?)\s+(?:Season|Temporada)\s*\d+$"
    ).unwrap();
    static ref PARENT_TITLE_YEAR: Regex = Regex::new(
        r"^(?P<title>.+?)\s*\((19\d{2}|20\d{2})\)$"
    ).unwrap();
}

const JUNK_PREFIXES: &[&str] = &["tmp", "temp", "sample", "test"];

// Keyword table for supplementary content, English and Spanish variants.
// Checked against the separator-normalized lowercase name and parent
// directory names.
const EXTRA_KEYWORDS: &[(&str, ExtraKind)] = &[
    ("featurette", ExtraKind::Featurette),
    ("behind the scenes", ExtraKind::Featurette),
    ("detras de escena", ExtraKind::Featurette),
    ("making of", ExtraKind::Featurette),
    ("making off", ExtraKind::Featurette),
    ("como se hizo", ExtraKind::Featurette),
    ("trailer", ExtraKind::Trailer),
    ("teaser", ExtraKind::Trailer),
    ("interview", ExtraKind::Interview),
    ("entrevista", ExtraKind::Interview),
    ("documentary", ExtraKind::Documentary),
    ("documental", ExtraKind::Documentary),
    ("deleted scene", ExtraKind::DeletedScene),
    ("escena eliminada", ExtraKind::DeletedScene),
    ("escenas eliminadas", ExtraKind::DeletedScene),
    ("blooper", ExtraKind::Blooper),
    ("tomas falsas", ExtraKind::Blooper),
    ("gag reel", ExtraKind::Blooper),
    ("commentary", ExtraKind::Commentary),
    ("comentario", ExtraKind::Commentary),
];

/// Parse one scanned path into a classified candidate.
///
/// Junk names come back as `Unrecognized` rather than an error; only a
/// series-marked name that defeats every episode pattern fails.
pub fn parse(path: &Path) -> Result<FileCandidate, ParserError> {
    let original_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if is_problematic(&stem) {
        debug!(target: "parser", "junk name: {}", original_name);
        return Ok(FileCandidate::unrecognized(original_name, path));
    }

    let spaced = normalize_separators(&stem);

    if let Some(kind) = detect_extra(&spaced, path) {
        let title = parent_title(path).unwrap_or_else(|| clean_title(&stem).0);
        debug!(target: "parser", "extra ({:?}): {}", kind, original_name);
        return Ok(FileCandidate::extra(original_name, path, title, kind));
    }

    if SERIES_MARKER.is_match(&spaced) {
        return parse_series(&original_name, path, &spaced);
    }

    let (title, year) = clean_title(&stem);
    debug!(target: "parser", "movie: {} -> {:?} ({:?})", original_name, title, year);
    Ok(FileCandidate::movie(original_name, path, title, year))
}

fn parse_series(
    original_name: &str,
    path: &Path,
    spaced: &str,
) -> Result<FileCandidate, ParserError> {
    let patterns: [&Regex; 4] = [
        &SERIES_SXXEYY,
        &SERIES_NXM,
        &SERIES_TEMPORADA,
        &SERIES_SEASON,
    ];

    for pattern in patterns {
        let Some(caps) = pattern.captures(spaced) else {
            continue;
        };
        let Some((season, episode)) = parse_episode_numbers(&caps) else {
            continue;
        };

        let raw_title = caps
            .name("title")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let (mut title, _) = clean_title(&raw_title);
        if title.is_empty() {
            // cleaning over-stripped; the raw capture beats an empty title
            title = raw_title;
        }

        debug!(
            target: "parser",
            "series: {} -> {} S{:02}E{:02}",
            original_name, title, season, episode
        );
        return Ok(FileCandidate::series(
            original_name,
            path,
            title,
            season,
            episode,
        ));
    }

    Err(ParserError::UnparseableSeries {
        name: original_name.to_string(),
    })
}

fn parse_episode_numbers(caps: &regex::Captures<'_>) -> Option<(u32, u32)> {
    let season = caps.name("season")?.as_str().parse().ok()?;
    let episode = caps.name("episode")?.as_str().parse().ok()?;
    Some((season, episode))
}

/// Names with no signal worth spending API calls on.
fn is_problematic(stem: &str) -> bool {
    let lower = stem.to_lowercase();
    if PURE_DIGITS.is_match(&lower) {
        return true;
    }
    if JUNK_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    if lower.chars().count() < 3 {
        return true;
    }
    lower.chars().filter(|c| c.is_alphabetic()).count() < 2
}

fn detect_extra(spaced_stem: &str, path: &Path) -> Option<ExtraKind> {
    let haystacks: Vec<String> = std::iter::once(spaced_stem.to_lowercase())
        .chain(
            path.ancestors()
                .skip(1)
                .filter_map(|a| a.file_name())
                .take(2)
                .map(|n| normalize_separators(&n.to_string_lossy()).to_lowercase()),
        )
        .collect();

    for haystack in &haystacks {
        for (keyword, kind) in EXTRA_KEYWORDS {
            if haystack.contains(keyword) {
                return Some(*kind);
            }
        }
    }
    None
}

/// Derive the parent movie/series title from the containing path, when a
/// path segment looks like a library folder.
fn parent_title(path: &Path) -> Option<String> {
    for ancestor in path.ancestors().skip(1) {
        let name = ancestor.file_name()?.to_string_lossy();
        let spaced = normalize_separators(&name);

        if let Some(caps) = PARENT_SEASON_DIR.captures(&spaced) {
            return Some(caps["title"].trim().to_string());
        }
        if let Some(caps) = PARENT_TITLE_YEAR.captures(&spaced) {
            return Some(caps["title"].trim().to_string());
        }
    }
    None
}

/// Strip release noise from a raw stem and pull out the year token.
///
/// The year is extracted before any stripping so tag removal cannot eat
/// it, and is reported separately rather than left inside the title.
/// An over-aggressive clean that empties the title falls back to the
/// separator-normalized unstripped stem.
pub fn clean_title(stem: &str) -> (String, Option<u16>) {
    let year = YEAR
        .find(stem)
        .and_then(|m| m.as_str().parse::<u16>().ok());

    let without_brackets = BRACKETS.replace_all(stem, " ");
    let spaced = normalize_separators(&without_brackets);
    let without_noise = NOISE_TOKENS.replace_all(&spaced, " ");
    let without_year = YEAR.replace_all(&without_noise, " ");

    let title = collapse_whitespace(&without_year);
    if title.is_empty() {
        return (collapse_whitespace(&normalize_separators(stem)), year);
    }
    (title, year)
}

fn normalize_separators(s: &str) -> String {
    s.replace(['.', '_', '-'], " ")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
