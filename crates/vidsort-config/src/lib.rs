// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub source: PathBuf,
    pub movies: PathBuf,
    pub series: PathBuf,
    /// Destination for files the parser cannot classify. Deferred files are
    /// always left in place regardless of this setting.
    pub unknown: Option<PathBuf>,
    pub video_extensions: Vec<String>,
    /// When false the run reports decisions without touching the filesystem.
    pub move_files: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("incoming"),
            movies: PathBuf::from("library/Movies"),
            series: PathBuf::from("library/Series"),
            unknown: None,
            video_extensions: [
                "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            move_files: true,
        }
    }
}

/// Per-layer enable flags plus every scoring constant of the escalation
/// table. The values are hand-tuned contracts inherited from the previous
/// generation of this tool; they are configuration defaults, not magic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayersConfig {
    pub layer0_enabled: bool,
    pub layer1_enabled: bool,
    pub layer2_enabled: bool,
    pub layer3_enabled: bool,
    /// Confidence above which no further layer runs.
    pub confirm_threshold: f32,
    /// Final accept/defer boundary.
    pub accept_threshold: f32,
    /// Guard below which the audio layer is consulted.
    pub audio_guard: f32,
    /// Guard below which the verification layer is consulted.
    pub verification_guard: f32,
    /// Hash score treated as a strong perceptual match.
    pub phash_strong: f32,
    /// Damping applied to weak perceptual-hash scores.
    pub phash_damping: f32,
    /// Audio score accepted as a confident fingerprint match.
    pub audio_accept: f32,
    /// Confidence assigned after an accepted audio match.
    pub audio_confirmed: f32,
    /// Penalty multiplier when an audio match was found but unconvincing.
    pub audio_refute_penalty: f32,
    /// Damping applied to visual confidence in the verification layer.
    pub verification_damping: f32,
    /// Damped visual score treated as strong verification.
    pub verification_strong: f32,
    /// Confidence assigned on strong verification.
    pub verification_confirmed: f32,
    /// Damped visual score above which the file is flagged for review.
    pub verification_review_floor: f32,
    /// Confidence assigned in the manual-review band.
    pub verification_review: f32,
    /// Cap applied when verification distrusts the hypothesis.
    pub verification_distrust_cap: f32,
}

impl Default for LayersConfig {
    fn default() -> Self {
        Self {
            layer0_enabled: true,
            layer1_enabled: true,
            layer2_enabled: true,
            layer3_enabled: true,
            confirm_threshold: 0.95,
            accept_threshold: 0.60,
            audio_guard: 0.90,
            verification_guard: 0.60,
            phash_strong: 0.85,
            phash_damping: 0.8,
            audio_accept: 0.75,
            audio_confirmed: 0.98,
            audio_refute_penalty: 0.5,
            verification_damping: 0.9,
            verification_strong: 0.80,
            verification_confirmed: 0.80,
            verification_review_floor: 0.50,
            verification_review: 0.65,
            verification_distrust_cap: 0.40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub language: String,
    pub timeout_secs: u64,
    /// Minimum delay between successive requests; informal rate limit.
    pub rate_limit_millis: u64,
    /// Minimum similarity for a primary-search match.
    pub min_score: f32,
    /// Relaxed similarity used by the alternative search fed from visual
    /// evidence.
    pub fallback_min_score: f32,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            language: "es-ES".to_string(),
            timeout_secs: 10,
            rate_limit_millis: 300,
            min_score: 0.8,
            fallback_min_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSubtitlesConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub user_agent: String,
    pub languages: String,
    pub timeout_secs: u64,
    pub rate_limit_millis: u64,
}

impl Default for OpenSubtitlesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            user_agent: "vidsort/0.1".to_string(),
            languages: "es,en".to_string(),
            timeout_secs: 15,
            rate_limit_millis: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub whisper_model: String,
    pub language: String,
    /// Number of ~30s segments spread across the file.
    pub segments: usize,
    pub segment_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            whisper_model: "base".to_string(),
            language: "es".to_string(),
            segments: 8,
            segment_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualConfig {
    pub ocr_enabled: bool,
    pub facial_recognition_enabled: bool,
    /// Directory of labeled reference portraits; facial recognition is
    /// skipped when unset.
    pub known_faces_dir: Option<PathBuf>,
    /// Face matches are accepted when the embedding distance is below
    /// `1.0 - min_confidence`.
    pub min_confidence: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            facial_recognition_enabled: true,
            known_faces_dir: None,
            min_confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://vidsort-reference.db".to_string(),
            pool_max_size: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub library: LibraryConfig,
    pub layers: LayersConfig,
    pub tmdb: TmdbConfig,
    pub opensubtitles: OpenSubtitlesConfig,
    pub audio: AudioConfig,
    pub visual: VisualConfig,
    pub database: DatabaseConfig,
    pub telemetry: TelemetryConfig,
}

/// Load configuration from defaults, optional TOML file, and environment
/// overrides (prefix: VIDSORT_, nesting separator: __).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("VIDSORT_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(target: "config", "configuration loaded");
    Ok(config)
}
