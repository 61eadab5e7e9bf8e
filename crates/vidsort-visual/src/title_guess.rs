// SPDX-License-Identifier: GPL-3.0-or-later

//! Title guessing from OCR text.
//!
//! Title cards are usually either Title Case or ALL CAPS; when neither
//! pattern appears, the longest significant words stand in as a search
//! query.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Two or more consecutive capitalized words: "El Laberinto Del Fauno"
    static ref TITLE_CASE: Regex = Regex::new(
        r"[A-ZÁÉÍÓÚÑÜ][a-záéíóúñü]+(?:\s+(?:[A-ZÁÉÍÓÚÑÜ][a-záéíóúñü]+|del?|la|los|las|el|de|y|of|the|and))+"
    ).unwrap();

    // Runs of two or more uppercase words: "EL PADRINO"
    static ref ALL_CAPS: Regex = Regex::new(
        r"[A-ZÁÉÍÓÚÑÜ]{2,}(?:\s+[A-ZÁÉÍÓÚÑÜ]{2,})+"
    ).unwrap();

    static ref WORD: Regex = Regex::new(r"[A-Za-zÁÉÍÓÚÑÜáéíóúñü]+").unwrap();
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "los", "las", "una", "uno", "del", "por",
    "para", "con", "que", "las", "sus", "como", "mas", "pero", "este", "esta",
];

const MIN_WORD_LEN: usize = 3;
const MAX_WORD_LEN: usize = 14;
const FALLBACK_WORDS: usize = 3;

/// Derive a plausible title (or title search query) from OCR output.
pub fn guess_title(text: &str) -> Option<String> {
    if let Some(m) = longest_match(&TITLE_CASE, text) {
        return Some(m);
    }

    if let Some(m) = longest_match(&ALL_CAPS, text) {
        return Some(m);
    }

    significant_words(text)
}

fn longest_match(re: &Regex, text: &str) -> Option<String> {
    re.find_iter(text)
        .max_by_key(|m| m.as_str().chars().count())
        .map(|m| collapse_whitespace(m.as_str()))
}

/// Fallback: the three longest significant words, kept in reading order.
fn significant_words(text: &str) -> Option<String> {
    let mut words: Vec<(usize, &str)> = WORD
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|w| {
            let len = w.chars().count();
            (MIN_WORD_LEN..=MAX_WORD_LEN).contains(&len)
                && !STOPWORDS.contains(&w.to_lowercase().as_str())
        })
        .enumerate()
        .collect();

    if words.is_empty() {
        return None;
    }

    words.sort_by_key(|(_, w)| std::cmp::Reverse(w.chars().count()));
    words.truncate(FALLBACK_WORDS);
    words.sort_by_key(|(position, _)| *position);

    Some(
        words
            .into_iter()
            .map(|(_, w)| w)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_run_wins() {
        let text = "una produccion de\nEl Laberinto Del Fauno\nguillermo del toro";
        assert_eq!(guess_title(text).as_deref(), Some("El Laberinto Del Fauno"));
    }

    #[test]
    fn all_caps_used_when_no_title_case() {
        let text = "presentan\nEL PADRINO\nuna pelicula";
        assert_eq!(guess_title(text).as_deref(), Some("EL PADRINO"));
    }

    #[test]
    fn fallback_picks_longest_significant_words_in_order() {
        let text = "un misterioso asesinato ocurre durante medianoche";
        let guess = guess_title(text).expect("guess expected");
        assert_eq!(guess, "misterioso asesinato medianoche");
    }

    #[test]
    fn stopwords_and_short_words_are_ignored() {
        assert_eq!(guess_title("the and for con del"), None);
        assert_eq!(guess_title("a un el"), None);
    }

    #[test]
    fn empty_text_yields_none() {
        assert_eq!(guess_title(""), None);
    }

    #[test]
    fn longest_title_case_run_is_preferred() {
        let text = "Warner Bros\nLa Casa De Papel Temporada Final";
        let guess = guess_title(text).expect("guess expected");
        assert!(guess.starts_with("La Casa De Papel"));
    }
}
