// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{AudioError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};
use url::Url;

const OPENSUBTITLES_API_BASE: &str = "https://api.opensubtitles.com/api/v1";
const USER_AGENT: &str = concat!("VidSort/", env!("CARGO_PKG_VERSION"));

/// One subtitle entry from a search response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleEntry {
    pub id: String,
    pub attributes: SubtitleAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtitleAttributes {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub download_count: Option<u64>,
    #[serde(default)]
    pub ratings: Option<f32>,
    pub feature_details: FeatureDetails,
}

/// The film or episode a subtitle belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureDetails {
    #[serde(default)]
    pub feature_id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub movie_name: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

impl FeatureDetails {
    /// Best available display title; `movie_name` often carries the year
    /// and is only a fallback.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.movie_name.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct SubtitleSearchResponse {
    #[serde(default)]
    data: Vec<SubtitleEntry>,
}

/// OpenSubtitles REST client used for dialogue-phrase searches.
#[derive(Debug, Clone)]
pub struct OpenSubtitlesClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    languages: String,
    min_interval: Duration,
    last_request: Arc<tokio::sync::Mutex<Option<Instant>>>,
}

impl OpenSubtitlesClient {
    /// Create a client builder for custom configuration.
    pub fn builder() -> OpenSubtitlesClientBuilder {
        OpenSubtitlesClientBuilder::default()
    }

    /// Search subtitles whose dialogue matches a phrase.
    pub async fn search(&self, phrase: &str) -> Result<Vec<SubtitleEntry>> {
        self.throttle().await;

        let mut url = Url::parse(&format!("{}/subtitles", self.base_url))
            .map_err(|e| AudioError::InvalidResponse(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("query", phrase)
            .append_pair("languages", &self.languages);

        trace!(target: "subtitles", "GET {}", url);

        let mut request = self
            .client
            .get(url.as_str())
            .header("User-Agent", USER_AGENT);
        if let Some(key) = &self.api_key {
            request = request.header("Api-Key", key.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(target: "subtitles", "response status: {}", status);

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AudioError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: SubtitleSearchResponse = serde_json::from_str(&body)
            .map_err(|e| AudioError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Ok(parsed.data)
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(last_instant) = *last {
            let elapsed = last_instant.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Builder for the OpenSubtitles client.
#[derive(Debug)]
pub struct OpenSubtitlesClientBuilder {
    base_url: String,
    api_key: Option<String>,
    languages: String,
    timeout: Duration,
    rate_limit_interval: Duration,
}

impl Default for OpenSubtitlesClientBuilder {
    fn default() -> Self {
        Self {
            base_url: OPENSUBTITLES_API_BASE.to_string(),
            api_key: None,
            languages: "es,en".to_string(),
            timeout: Duration::from_secs(15),
            rate_limit_interval: Duration::from_secs(1),
        }
    }
}

impl OpenSubtitlesClientBuilder {
    /// Set a custom base URL (useful for testing with mock servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Comma-separated subtitle language codes.
    pub fn languages(mut self, languages: impl Into<String>) -> Self {
        self.languages = languages.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn rate_limit_interval(mut self, interval: Duration) -> Self {
        self.rate_limit_interval = interval;
        self
    }

    pub fn build(self) -> Result<OpenSubtitlesClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(OpenSubtitlesClient {
            client,
            base_url: self.base_url,
            api_key: self.api_key,
            languages: self.languages,
            min_interval: self.rate_limit_interval,
            last_request: Arc::new(tokio::sync::Mutex::new(None)),
        })
    }
}
