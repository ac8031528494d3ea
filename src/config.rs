//! Pipeline configuration.
//!
//! Sources (highest priority first):
//! 1. Environment variables (BRIEFCAST_DATA_DIR, GOOGLE_CLIENT_ID,
//!    GOOGLE_CLIENT_SECRET)
//! 2. Config file (BRIEFCAST_CONFIG, or ./briefcast.yaml)
//! 3. Defaults (~/.briefcast)
//!
//! Density thresholds and notability heuristics are deliberately
//! tunable rather than hard-coded; the defaults below mirror the
//! shipped behavior.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::retry::RetryPolicy;

/// Top-level settings, deserializable from YAML with full defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root for the database, audio assets, and feed documents.
    pub data_dir: PathBuf,

    pub schedule: ScheduleThresholds,

    pub documents: DocumentSettings,

    pub compose: ComposeSettings,

    pub audio: AudioSettings,

    pub feed: FeedSettings,

    pub oauth: OAuthSettings,

    pub retry: RetryPolicy,

    pub timeouts: Timeouts,
}

/// Density tiers and notable-schedule heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleThresholds {
    /// Days with at most this many events are "light".
    pub light_max_events: usize,

    /// Days with at least this many events are "heavy".
    pub heavy_min_events: usize,

    /// Busy-minutes tie-break at the heavy boundary: a day with exactly
    /// `heavy_min_events` events is heavy only above this.
    pub heavy_min_busy_minutes: i64,

    /// Gap at or under this many minutes makes two meetings back-to-back.
    pub back_to_back_gap_minutes: i64,

    /// A gap-free meeting run longer than this flags the day as notable.
    pub gap_free_run_minutes: i64,
}

impl Default for ScheduleThresholds {
    fn default() -> Self {
        Self {
            light_max_events: 5,
            heavy_min_events: 9,
            heavy_min_busy_minutes: 420,
            back_to_back_gap_minutes: 15,
            gap_free_run_minutes: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Lookback window for first runs (no prior successful run).
    pub default_lookback_days: i64,

    /// How many top-priority documents get deep-dive episodes.
    pub deepdive_top_k: usize,

    /// Extracted content preview length for prompts.
    pub preview_chars: usize,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            default_lookback_days: 1,
            deepdive_top_k: 3,
            preview_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    /// Chat model used for script generation.
    pub model: String,

    /// Accepted scripts must not exceed this many characters.
    pub max_script_chars: usize,

    /// Concurrency bound across module compositions within one run.
    pub max_concurrent_modules: usize,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_script_chars: 20_000,
            max_concurrent_modules: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Public base URL audio enclosures are served from.
    pub base_url: String,

    /// Spoken words per minute, used for duration estimates.
    pub words_per_minute: u32,

    /// Scripts longer than this are synthesized in ordered chunks.
    pub max_chunk_chars: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            words_per_minute: 150,
            max_chunk_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Public base URL feed documents are served from.
    pub base_url: String,

    pub author: String,

    pub owner_email: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            author: "Briefcast".to_string(),
            owner_email: "noreply@briefcast.dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub token_url: String,

    pub client_id: String,

    pub client_secret: String,

    /// Tokens expiring within this margin are refreshed proactively.
    pub refresh_margin_secs: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_margin_secs: 300,
        }
    }
}

/// Timeouts for the external suspension points. A timeout is a
/// retryable failure, not a fatal process error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub fetch_secs: u64,
    pub model_secs: u64,
    pub synthesis_secs: u64,
    pub refresh_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch_secs: 30,
            model_secs: 120,
            synthesis_secs: 120,
            refresh_secs: 15,
        }
    }
}

impl Timeouts {
    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }
    pub fn model(&self) -> Duration {
        Duration::from_secs(self.model_secs)
    }
    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_secs)
    }
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            schedule: ScheduleThresholds::default(),
            documents: DocumentSettings::default(),
            compose: ComposeSettings::default(),
            audio: AudioSettings::default(),
            feed: FeedSettings::default(),
            oauth: OAuthSettings::default(),
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".briefcast")
}

impl Settings {
    /// Load settings from the config file (if present) and apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match find_config_file() {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => Self::default(),
        };

        if let Ok(dir) = std::env::var("BRIEFCAST_DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Ok(id) = std::env::var("GOOGLE_CLIENT_ID") {
            settings.oauth.client_id = id;
        }
        if let Ok(secret) = std::env::var("GOOGLE_CLIENT_SECRET") {
            settings.oauth.client_secret = secret;
        }

        Ok(settings)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("briefcast.db")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }

    pub fn feeds_dir(&self) -> PathBuf {
        self.data_dir.join("feeds")
    }

    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.oauth.refresh_margin_secs as i64)
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("BRIEFCAST_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from("briefcast.yaml");
    local.exists().then_some(local)
}
