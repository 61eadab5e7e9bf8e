// SPDX-License-Identifier: GPL-3.0-or-later

//! Distinctive-phrase selection from raw transcripts.
//!
//! A phrase is worth searching for when it is long enough to be unlikely
//! in unrelated subtitles but short enough that transcription errors do
//! not poison the whole query.

const MIN_PHRASE_WORDS: usize = 5;
const MAX_PHRASE_WORDS: usize = 15;
const MAX_PHRASES: usize = 5;

/// Split a transcript into sentences and keep up to five distinctive
/// phrases, preferring longer sentences.
pub fn distinctive_phrases(transcript: &str) -> Vec<String> {
    let mut seen = Vec::new();
    let mut phrases: Vec<String> = Vec::new();

    for sentence in transcript.split(['.', '!', '?', '\n', '…']) {
        let cleaned = sentence
            .trim()
            .trim_start_matches(['¡', '¿'])
            .trim()
            .to_string();

        let word_count = cleaned.split_whitespace().count();
        if !(MIN_PHRASE_WORDS..=MAX_PHRASE_WORDS).contains(&word_count) {
            continue;
        }

        let key = cleaned.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        phrases.push(cleaned);
    }

    // Longer sentences carry more signal; stable sort keeps transcript
    // order among equals.
    phrases.sort_by_key(|p| std::cmp::Reverse(p.split_whitespace().count()));
    phrases.truncate(MAX_PHRASES);
    phrases
}
