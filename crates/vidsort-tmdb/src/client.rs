// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Result, TmdbError};
use crate::models::{MovieResult, SearchQuery, SearchResponse, TvResult};
use crate::rate_limiter::RateLimiter;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
const USER_AGENT: &str = concat!("VidSort/", env!("CARGO_PKG_VERSION"));

/// TMDB API client with rate limiting.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
    rate_limiter: RateLimiter,
}

impl TmdbClient {
    /// Create a client builder for custom configuration.
    pub fn builder(api_key: impl Into<String>) -> TmdbClientBuilder {
        TmdbClientBuilder::new(api_key)
    }

    /// Search for movies by title, optionally restricted to a release year.
    ///
    /// # Example
    /// ```no_run
    /// # use vidsort_tmdb::{TmdbClient, SearchQuery};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = TmdbClient::builder("key").build()?;
    /// let query = SearchQuery::new("The Matrix").year(1999);
    /// let response = client.search_movies(query).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn search_movies(&self, query: SearchQuery) -> Result<SearchResponse<MovieResult>> {
        let mut url = Url::parse(&format!("{}/search/movie", self.base_url))
            .map_err(|e| TmdbError::InvalidResponse(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("query", &query.query)
            .append_pair("language", &self.language);

        if let Some(year) = query.year {
            url.query_pairs_mut().append_pair("year", &year.to_string());
        }

        self.get(url.as_str()).await
    }

    /// Search for TV series by name, optionally restricted to a first-air year.
    pub async fn search_tv(&self, query: SearchQuery) -> Result<SearchResponse<TvResult>> {
        let mut url = Url::parse(&format!("{}/search/tv", self.base_url))
            .map_err(|e| TmdbError::InvalidResponse(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("query", &query.query)
            .append_pair("language", &self.language);

        if let Some(year) = query.year {
            url.query_pairs_mut()
                .append_pair("first_air_date_year", &year.to_string());
        }

        self.get(url.as_str()).await
    }

    /// Internal method to perform rate-limited GET requests.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let _permit = self.rate_limiter.acquire().await;

        trace!(target: "tmdb", "GET {}", url);

        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        debug!(target: "tmdb", "response status: {}", status);

        if status == 401 {
            return Err(TmdbError::Unauthorized);
        }

        if status == 404 {
            return Err(TmdbError::NotFound(url.to_string()));
        }

        if status == 429 {
            return Err(TmdbError::RateLimitExceeded);
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TmdbError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        trace!(target: "tmdb", "response body: {}", body);

        serde_json::from_str(&body)
            .map_err(|e| TmdbError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

/// Builder for configuring a TMDB client.
#[derive(Debug)]
pub struct TmdbClientBuilder {
    api_key: String,
    base_url: String,
    language: String,
    timeout: Duration,
    rate_limit_interval: Duration,
}

impl TmdbClientBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: TMDB_API_BASE.to_string(),
            language: "es-ES".to_string(),
            timeout: Duration::from_secs(10),
            rate_limit_interval: Duration::from_millis(300),
        }
    }

    /// Set a custom base URL (useful for testing with mock servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the language code sent with every request.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set request timeout duration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set rate limit interval between requests.
    pub fn rate_limit_interval(mut self, interval: Duration) -> Self {
        self.rate_limit_interval = interval;
        self
    }

    /// Build the TMDB client.
    pub fn build(self) -> Result<TmdbClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let rate_limiter = RateLimiter::new(self.rate_limit_interval);

        Ok(TmdbClient {
            client,
            base_url: self.base_url,
            api_key: self.api_key,
            language: self.language,
            rate_limiter,
        })
    }
}
