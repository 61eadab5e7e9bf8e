// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};

/// Movie entry from a TMDB `/search/movie` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieResult {
    /// TMDB movie ID.
    pub id: u64,
    /// Localized title.
    pub title: String,
    /// Title in the original language.
    #[serde(default)]
    pub original_title: Option<String>,
    /// Release date (YYYY-MM-DD), often empty for obscure entries.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Plot synopsis.
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub popularity: Option<f32>,
}

impl MovieResult {
    /// Release year parsed from the date prefix, if present.
    pub fn year(&self) -> Option<u16> {
        parse_year(self.release_date.as_deref())
    }
}

/// Series entry from a TMDB `/search/tv` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TvResult {
    /// TMDB series ID.
    pub id: u64,
    /// Localized series name.
    pub name: String,
    /// Name in the original language.
    #[serde(default)]
    pub original_name: Option<String>,
    /// First air date (YYYY-MM-DD).
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub popularity: Option<f32>,
}

impl TvResult {
    /// First-air year parsed from the date prefix, if present.
    pub fn year(&self) -> Option<u16> {
        parse_year(self.first_air_date.as_deref())
    }
}

fn parse_year(date: Option<&str>) -> Option<u16> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

/// Search query parameters.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Cleaned title to search for.
    pub query: String,
    /// Restricts results to a release/first-air year when known.
    pub year: Option<u16>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            year: None,
        }
    }

    pub fn year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }
}

/// Paged response wrapper shared by the movie and TV search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse<T> {
    pub page: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    pub total_pages: u32,
    pub total_results: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_parses_date_prefix() {
        let movie = MovieResult {
            id: 603,
            title: "The Matrix".to_string(),
            original_title: None,
            release_date: Some("1999-03-31".to_string()),
            overview: None,
            vote_average: None,
            popularity: None,
        };
        assert_eq!(movie.year(), Some(1999));
    }

    #[test]
    fn year_tolerates_missing_and_empty_dates() {
        assert_eq!(parse_year(None), None);
        assert_eq!(parse_year(Some("")), None);
        assert_eq!(parse_year(Some("19")), None);
    }
}
