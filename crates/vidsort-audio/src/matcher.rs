// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::Result;
use crate::opensubtitles::{OpenSubtitlesClient, SubtitleEntry};
use crate::phrases::distinctive_phrases;
use crate::segments::SegmentExtractor;
use crate::transcribe::SpeechToText;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transcripts shorter than this are noise, not dialogue.
const MIN_TRANSCRIPT_CHARS: usize = 10;

/// Confidence never exceeds this; dialogue matching is strong evidence
/// but not proof of the exact cut or edition.
const MAX_CONFIDENCE: f32 = 0.9;

/// A consensus identification produced from subtitle dialogue searches.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMatch {
    pub title: String,
    pub year: Option<u16>,
    pub confidence: f32,
    pub matched_phrases: usize,
    pub total_phrases: usize,
}

/// Identifies a video by transcribing spoken dialogue and searching
/// subtitle databases for the phrases.
pub struct AudioMatcher {
    extractor: SegmentExtractor,
    transcriber: Arc<dyn SpeechToText>,
    subtitles: OpenSubtitlesClient,
}

impl AudioMatcher {
    pub fn new(
        extractor: SegmentExtractor,
        transcriber: Arc<dyn SpeechToText>,
        subtitles: OpenSubtitlesClient,
    ) -> Self {
        Self {
            extractor,
            transcriber,
            subtitles,
        }
    }

    /// Attempt a dialogue-based identification. `work_dir` receives the
    /// temporary WAV segments and transcripts; the caller owns cleanup.
    ///
    /// Returns `Ok(None)` when the file yields no usable dialogue or no
    /// title reaches consensus. Per-phrase search failures are logged and
    /// skipped rather than aborting the whole attempt.
    pub async fn identify(&self, video: &Path, work_dir: &Path) -> Result<Option<AudioMatch>> {
        let segments = self.extractor.extract(video, work_dir).await?;

        let mut transcript = String::new();
        for segment in &segments {
            match self.transcriber.transcribe(segment).await {
                Ok(text) => {
                    transcript.push_str(&text);
                    transcript.push('\n');
                }
                Err(e) => {
                    warn!(target: "audio", "segment transcription failed: {}", e);
                }
            }
        }

        if transcript.trim().chars().count() < MIN_TRANSCRIPT_CHARS {
            debug!(target: "audio", "transcript too short, skipping dialogue match");
            return Ok(None);
        }

        let phrases = distinctive_phrases(&transcript);
        if phrases.is_empty() {
            debug!(target: "audio", "no distinctive phrases in transcript");
            return Ok(None);
        }

        let mut phrase_hits: Vec<Vec<SubtitleCandidate>> = Vec::with_capacity(phrases.len());
        for phrase in &phrases {
            match self.subtitles.search(phrase).await {
                Ok(entries) => {
                    phrase_hits.push(entries.iter().filter_map(SubtitleCandidate::from_entry).collect())
                }
                Err(e) => {
                    warn!(target: "audio", "subtitle search failed for phrase: {}", e);
                    phrase_hits.push(Vec::new());
                }
            }
        }

        let result = consensus(&phrase_hits);
        if let Some(m) = &result {
            info!(
                target: "audio",
                "dialogue consensus: {} ({:?}) from {}/{} phrases",
                m.title, m.year, m.matched_phrases, m.total_phrases
            );
        }
        Ok(result)
    }
}

/// A subtitle search hit reduced to the fields consensus cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCandidate {
    pub title: String,
    pub year: Option<u16>,
    pub download_count: u64,
    pub ratings: f32,
}

impl SubtitleCandidate {
    fn from_entry(entry: &SubtitleEntry) -> Option<Self> {
        let details = &entry.attributes.feature_details;
        Some(Self {
            title: details.display_title()?.to_string(),
            year: details.year,
            download_count: entry.attributes.download_count.unwrap_or(0),
            ratings: entry.attributes.ratings.unwrap_or(0.0),
        })
    }

    /// Popularity weighting used to break ties between candidate titles.
    fn score(&self) -> f32 {
        self.download_count as f32 * 0.5 + self.ratings * 0.3
    }
}

/// Aggregate per-phrase search hits into a single identification.
///
/// A title only wins when at least two distinct phrases matched it; a
/// single phrase hit is as likely to come from a quotation or a remake.
pub fn consensus(phrase_hits: &[Vec<SubtitleCandidate>]) -> Option<AudioMatch> {
    let total = phrase_hits.len();
    if total == 0 {
        return None;
    }

    struct Group {
        title: String,
        year: Option<u16>,
        phrases: Vec<usize>,
        score: f32,
    }

    let mut groups: HashMap<(String, Option<u16>), Group> = HashMap::new();

    for (phrase_index, hits) in phrase_hits.iter().enumerate() {
        for hit in hits {
            let key = (hit.title.to_lowercase(), hit.year);
            let group = groups.entry(key).or_insert_with(|| Group {
                title: hit.title.clone(),
                year: hit.year,
                phrases: Vec::new(),
                score: 0.0,
            });
            if !group.phrases.contains(&phrase_index) {
                group.phrases.push(phrase_index);
            }
            group.score += hit.score();
        }
    }

    let best = groups
        .into_values()
        .filter(|g| g.phrases.len() >= 2)
        .max_by(|a, b| {
            (a.phrases.len(), a.score)
                .partial_cmp(&(b.phrases.len(), b.score))
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

    let matched = best.phrases.len();
    Some(AudioMatch {
        title: best.title,
        year: best.year,
        confidence: (matched as f32 / total as f32).min(MAX_CONFIDENCE),
        matched_phrases: matched,
        total_phrases: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, year: Option<u16>, downloads: u64) -> SubtitleCandidate {
        SubtitleCandidate {
            title: title.to_string(),
            year,
            download_count: downloads,
            ratings: 7.0,
        }
    }

    #[test]
    fn two_independent_phrases_reach_consensus() {
        let hits = vec![
            vec![hit("El Laberinto del Fauno", Some(2006), 3000)],
            vec![hit("El Laberinto del Fauno", Some(2006), 1200)],
            vec![],
        ];

        let m = consensus(&hits).expect("consensus expected");
        assert_eq!(m.title, "El Laberinto del Fauno");
        assert_eq!(m.year, Some(2006));
        assert_eq!(m.matched_phrases, 2);
        assert_eq!(m.total_phrases, 3);
        assert!((m.confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn single_phrase_match_is_rejected() {
        let hits = vec![
            vec![hit("Pelicula A", Some(2001), 9000)],
            vec![hit("Pelicula B", Some(2002), 9000)],
        ];

        assert!(consensus(&hits).is_none());
    }

    #[test]
    fn confidence_is_capped_at_point_nine() {
        let hits = vec![
            vec![hit("Volver", Some(2006), 100)],
            vec![hit("Volver", Some(2006), 100)],
        ];

        let m = consensus(&hits).expect("consensus expected");
        // 2/2 would be 1.0 uncapped
        assert!((m.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn same_phrase_hitting_twice_counts_once() {
        let hits = vec![
            vec![
                hit("Mar Adentro", Some(2004), 500),
                hit("Mar Adentro", Some(2004), 400),
            ],
            vec![],
        ];

        assert!(consensus(&hits).is_none());
    }

    #[test]
    fn popularity_breaks_ties_between_equally_matched_titles() {
        let hits = vec![
            vec![hit("Popular", Some(1990), 5000), hit("Oscura", Some(1991), 10)],
            vec![hit("Popular", Some(1990), 5000), hit("Oscura", Some(1991), 10)],
        ];

        let m = consensus(&hits).expect("consensus expected");
        assert_eq!(m.title, "Popular");
    }

    #[test]
    fn title_grouping_is_case_insensitive() {
        let hits = vec![
            vec![hit("la casa de papel", Some(2017), 100)],
            vec![hit("La Casa de Papel", Some(2017), 100)],
        ];

        let m = consensus(&hits).expect("consensus expected");
        assert_eq!(m.matched_phrases, 2);
    }

    #[test]
    fn empty_input_yields_none() {
        assert!(consensus(&[]).is_none());
    }
}
