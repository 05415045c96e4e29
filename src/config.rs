use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Redis connection URL for shown history; in-memory history when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// JSON file with the content catalog to load at startup
    #[serde(default)]
    pub catalog_path: Option<String>,

    /// JSON file with the advertisements to load at startup
    #[serde(default)]
    pub ads_path: Option<String>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Default number of slots in a generated feed
    #[serde(default = "default_feed_length")]
    pub feed_length: usize,

    /// Wall-clock budget for the slot-filling scoring loop
    #[serde(default = "default_scoring_deadline_ms")]
    pub scoring_deadline_ms: u64,

    /// Freshness window of the ad metadata cache
    #[serde(default = "default_ad_cache_ttl_secs")]
    pub ad_cache_ttl_secs: u64,

    /// How far back shown history is consulted
    #[serde(default = "default_history_window_hours")]
    pub history_window_hours: i64,

    /// Maximum number of shown ids consulted per request
    #[serde(default = "default_history_max_ids")]
    pub history_max_ids: usize,

    /// Idle time after which a user's shown history is cleared
    #[serde(default = "default_history_idle_reset_secs")]
    pub history_idle_reset_secs: i64,

    /// Maximum share of the feed a single emotion may occupy
    #[serde(default = "default_diversity_ceiling")]
    pub diversity_ceiling: f64,

    /// Weight of keyword overlap in the relevance score
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,

    /// Fixed seed for tie-breaking and shuffles (reproducible feeds)
    #[serde(default)]
    pub feed_rng_seed: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_feed_length() -> usize {
    20
}

fn default_scoring_deadline_ms() -> u64 {
    3000
}

fn default_ad_cache_ttl_secs() -> u64 {
    300
}

fn default_history_window_hours() -> i64 {
    24
}

fn default_history_max_ids() -> usize {
    200
}

fn default_history_idle_reset_secs() -> i64 {
    600
}

fn default_diversity_ceiling() -> f64 {
    0.7
}

fn default_keyword_weight() -> f64 {
    0.3
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.engine_settings()?;
        Ok(config)
    }

    /// Tuning knobs consumed by the feed engine
    ///
    /// Fails when a window is not positive or does not fit a timestamp offset.
    pub fn engine_settings(&self) -> AppResult<EngineSettings> {
        let history_window = positive_window(
            "HISTORY_WINDOW_HOURS",
            self.history_window_hours,
            chrono::Duration::try_hours,
        )?;
        let history_idle_reset = positive_window(
            "HISTORY_IDLE_RESET_SECS",
            self.history_idle_reset_secs,
            chrono::Duration::try_seconds,
        )?;

        Ok(EngineSettings {
            default_feed_length: self.feed_length,
            scoring_deadline: Duration::from_millis(self.scoring_deadline_ms),
            ad_cache_ttl: Duration::from_secs(self.ad_cache_ttl_secs),
            history_window,
            history_max_ids: self.history_max_ids,
            history_idle_reset,
            diversity_ceiling: self.diversity_ceiling.clamp(0.0, 1.0),
            keyword_weight: self.keyword_weight.clamp(0.0, 1.0),
            shuffle_tail: true,
            rng_seed: self.feed_rng_seed,
        })
    }
}

fn positive_window(
    name: &str,
    value: i64,
    to_duration: fn(i64) -> Option<chrono::Duration>,
) -> AppResult<chrono::Duration> {
    if value <= 0 {
        return Err(AppError::InvalidInput(format!("{} must be positive, got {}", name, value)));
    }
    to_duration(value)
        .ok_or_else(|| AppError::InvalidInput(format!("{} is out of range: {}", name, value)))
}

/// Runtime settings for feed generation
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_feed_length: usize,
    pub scoring_deadline: Duration,
    pub ad_cache_ttl: Duration,
    pub history_window: chrono::Duration,
    pub history_max_ids: usize,
    pub history_idle_reset: chrono::Duration,
    pub diversity_ceiling: f64,
    pub keyword_weight: f64,
    /// Reshuffle the items after the story arc for presentation variety
    pub shuffle_tail: bool,
    pub rng_seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_feed_length: default_feed_length(),
            scoring_deadline: Duration::from_millis(default_scoring_deadline_ms()),
            ad_cache_ttl: Duration::from_secs(default_ad_cache_ttl_secs()),
            history_window: chrono::Duration::hours(default_history_window_hours()),
            history_max_ids: default_history_max_ids(),
            history_idle_reset: chrono::Duration::seconds(default_history_idle_reset_secs()),
            diversity_ceiling: default_diversity_ceiling(),
            keyword_weight: default_keyword_weight(),
            shuffle_tail: true,
            rng_seed: None,
        }
    }
}
