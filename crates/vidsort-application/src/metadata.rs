// SPDX-License-Identifier: GPL-3.0-or-later

use crate::similarity::token_set_similarity;
use async_trait::async_trait;
use tracing::debug;
use vidsort_domain::{CatalogId, CatalogMatch, ContentType};
use vidsort_tmdb::{SearchQuery, TmdbClient};

/// Candidates past the first few are ranked by popularity, not
/// relevance; scoring them only invites false positives.
const MAX_CANDIDATES: usize = 5;

/// Bonus added when the parsed year matches the candidate's exactly.
/// Deliberately applied without clamping; consumers cap at 1.0.
const YEAR_BONUS: f32 = 0.2;

/// The seam the escalation pipeline sees; mocked in pipeline tests.
#[async_trait]
pub trait MetadataSearch: Send + Sync {
    /// Best catalog match at or above `min_score`, or `None`.
    async fn best_match(
        &self,
        title: &str,
        year: Option<u16>,
        content_type: ContentType,
        min_score: f32,
    ) -> anyhow::Result<Option<CatalogMatch>>;
}

/// Scores TMDB search results against a parsed title.
#[derive(Debug, Clone)]
pub struct MetadataMatcher {
    client: TmdbClient,
}

impl MetadataMatcher {
    pub fn new(client: TmdbClient) -> Self {
        Self { client }
    }

    fn score(query_title: &str, query_year: Option<u16>, candidate: &CatalogMatch) -> f32 {
        let mut score = token_set_similarity(query_title, &candidate.title)
            .max(token_set_similarity(query_title, &candidate.original_title));

        if let (Some(wanted), Some(actual)) = (query_year, candidate.year) {
            if wanted == actual {
                score += YEAR_BONUS;
            }
        }
        score
    }

    fn pick_best(
        title: &str,
        year: Option<u16>,
        mut candidates: Vec<CatalogMatch>,
        min_score: f32,
    ) -> Option<CatalogMatch> {
        candidates.truncate(MAX_CANDIDATES);

        let mut best: Option<CatalogMatch> = None;
        for mut candidate in candidates {
            candidate.similarity = Self::score(title, year, &candidate);
            let beats = best
                .as_ref()
                .map(|b| candidate.similarity > b.similarity)
                .unwrap_or(true);
            if beats {
                best = Some(candidate);
            }
        }

        match best {
            Some(b) if b.similarity >= min_score => {
                debug!(
                    target: "matching",
                    "best candidate for '{}': '{}' ({:?}) score {:.2}",
                    title, b.title, b.year, b.similarity
                );
                Some(b)
            }
            Some(b) => {
                debug!(
                    target: "matching",
                    "best candidate for '{}' below threshold: {:.2} < {:.2}",
                    title, b.similarity, min_score
                );
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl MetadataSearch for MetadataMatcher {
    async fn best_match(
        &self,
        title: &str,
        year: Option<u16>,
        content_type: ContentType,
        min_score: f32,
    ) -> anyhow::Result<Option<CatalogMatch>> {
        let mut query = SearchQuery::new(title);
        if let Some(y) = year {
            query = query.year(y);
        }

        let candidates: Vec<CatalogMatch> = match content_type {
            ContentType::Series => self
                .client
                .search_tv(query)
                .await?
                .results
                .into_iter()
                .map(|r| CatalogMatch {
                    id: CatalogId(r.id),
                    year: r.year(),
                    original_title: r.original_name.clone().unwrap_or_else(|| r.name.clone()),
                    title: r.name,
                    overview: r.overview,
                    similarity: 0.0,
                })
                .collect(),
            _ => self
                .client
                .search_movies(query)
                .await?
                .results
                .into_iter()
                .map(|r| CatalogMatch {
                    id: CatalogId(r.id),
                    year: r.year(),
                    original_title: r.original_title.clone().unwrap_or_else(|| r.title.clone()),
                    title: r.title,
                    overview: r.overview,
                    similarity: 0.0,
                })
                .collect(),
        };

        Ok(Self::pick_best(title, year, candidates, min_score))
    }
}
