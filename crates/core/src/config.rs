use serde::Deserialize;
use std::collections::HashMap;

/// Enumerated configuration constants from spec §6.
pub mod constants {
    pub const MAX_EVENTS: usize = 50_000;
    pub const RESERVOIR_CAPACITY: usize = 1024;
    pub const PERSIST_DEBOUNCE_MS: u64 = 5_000;
    pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;
    pub const DEFAULT_PER_URL_TIMEOUT_MS: u64 = 30_000;
    pub const LIGHTWEIGHT_SCRIPT_BUDGET_MS: u64 = 2_000;
    pub const EMA_ALPHA: f64 = 0.2;
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub health: HealthThresholds,
    #[serde(default)]
    pub change: ChangeThresholds,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            batch: BatchConfig::default(),
            health: HealthThresholds::default(),
            change: ChangeThresholds::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    pub data_dir: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u8,
    #[serde(default)]
    pub playwright_available: bool,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_max_redirects() -> u8 {
    5
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            playwright_available: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,
    #[serde(default = "default_per_url_timeout")]
    pub default_per_url_timeout_ms: u64,
}

fn default_concurrency() -> usize {
    constants::DEFAULT_BATCH_CONCURRENCY
}
fn default_per_url_timeout() -> u64 {
    constants::DEFAULT_PER_URL_TIMEOUT_MS
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_concurrency: default_concurrency(),
            default_per_url_timeout_ms: default_per_url_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthThresholds {
    #[serde(default = "default_degraded")]
    pub degraded: f64,
    #[serde(default = "default_failing")]
    pub failing: f64,
    #[serde(default = "default_broken")]
    pub broken: f64,
    #[serde(default = "default_consecutive_failures")]
    pub consecutive_failures: u32,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_degraded() -> f64 {
    0.7
}
fn default_failing() -> f64 {
    0.5
}
fn default_broken() -> f64 {
    0.2
}
fn default_consecutive_failures() -> u32 {
    3
}
fn default_min_samples() -> usize {
    5
}
fn default_history_window() -> usize {
    20
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded: default_degraded(),
            failing: default_failing(),
            broken: default_broken(),
            consecutive_failures: default_consecutive_failures(),
            min_samples: default_min_samples(),
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChangeThresholds {
    #[serde(default = "default_high_len_delta")]
    pub high_len_delta: f64,
    #[serde(default = "default_med_len_delta")]
    pub med_len_delta: f64,
    #[serde(default = "default_similarity_for_modify")]
    pub similarity_for_modify: f64,
    /// Domain-specific high-significance keyword list; kept configurable
    /// rather than hard-coded per spec §9's Open Question on this set.
    #[serde(default = "default_high_sig_keywords")]
    pub high_significance_keywords: Vec<String>,
}

fn default_high_len_delta() -> f64 {
    0.2
}
fn default_med_len_delta() -> f64 {
    0.05
}
fn default_similarity_for_modify() -> f64 {
    0.5
}
fn default_high_sig_keywords() -> Vec<String> {
    ["required", "must", "deadline", "fee", "visa", "permit", "expire"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            high_len_delta: default_high_len_delta(),
            med_len_delta: default_med_len_delta(),
            similarity_for_modify: default_similarity_for_modify(),
            high_significance_keywords: default_high_sig_keywords(),
        }
    }
}

/// Per-tier cost units (spec §3, §6). Kept as a function rather than a
/// config map since the ratios are load-bearing for the cost invariant
/// (spec §8 invariant 1) and not meant to be tuned per deployment.
pub fn tier_cost_units() -> HashMap<&'static str, u32> {
    [("intelligence", 1), ("lightweight", 5), ("playwright", 25)]
        .into_iter()
        .collect()
}
