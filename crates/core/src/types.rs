use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One of three fetching strategies, ordered by ascending cost (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Intelligence,
    Lightweight,
    Playwright,
}

impl Tier {
    /// Full cost units for a tier attempted and accepted (spec §3, §6).
    pub fn full_cost(self) -> u32 {
        match self {
            Tier::Intelligence => 1,
            Tier::Lightweight => 5,
            Tier::Playwright => 25,
        }
    }

    /// The next more expensive tier, if any (used by the Learning Store's
    /// promotion rule, spec §4.2).
    pub fn next_more_expensive(self) -> Option<Tier> {
        match self {
            Tier::Intelligence => Some(Tier::Lightweight),
            Tier::Lightweight => Some(Tier::Playwright),
            Tier::Playwright => None,
        }
    }

    /// The default cascade ordering.
    pub fn default_order() -> [Tier; 3] {
        [Tier::Intelligence, Tier::Lightweight, Tier::Playwright]
    }
}

impl PartialOrd for Tier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.full_cost().cmp(&other.full_cost())
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::Intelligence => "intelligence",
            Tier::Lightweight => "lightweight",
            Tier::Playwright => "playwright",
        };
        f.write_str(s)
    }
}

/// Per-fetch caller options (spec §6 Fetcher API).
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Force a specific tier instead of running the cascade.
    pub tier: Option<Tier>,
    pub timeout_ms: Option<u64>,
    pub per_tier_timeout_ms: Option<u64>,
    pub validate_content: Option<bool>,
    pub enable_learning: Option<bool>,
    pub session_profile: Option<String>,
    pub content_type: Option<String>,
}

/// A method/url/status/content-type record emitted while fetching a page
/// (spec §6 "Discovered-API record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredApi {
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub observed_during_tier: Tier,
}

/// Normalized content body produced by the Content Intelligence `render`
/// collaborator (spec §1: "a pure function `render(html) -> (text,
/// markdown, links)`").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderedContent {
    pub html: Option<String>,
    pub text: String,
    pub markdown: String,
    pub links: Vec<String>,
    pub headings: Vec<String>,
}

/// Learning annotations attached to a successful fetch (spec §3 FetchResult).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningAnnotations {
    pub selectors_tried: Vec<String>,
    pub selectors_succeeded: Vec<String>,
    pub selectors_failed: Vec<String>,
    pub overall_confidence: f64,
}

/// Per-attempt record kept for diagnostics, regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierAttempt {
    pub tier: Tier,
    pub duration_ms: u64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchMetadata {
    pub load_time_ms: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub final_url: String,
}

/// The normalized per-URL output of a fetch (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub final_url: String,
    pub title: Option<String>,
    pub html: Option<String>,
    pub text: String,
    pub markdown: String,
    pub apis: Vec<DiscoveredApi>,
    pub metadata: FetchMetadata,
    pub learning: LearningAnnotations,
    pub final_tier: Tier,
    pub tiers_attempted: Vec<Tier>,
    pub fell_back: bool,
    pub cost_units: u32,
}

/// Domain accounting stored by the Learning Store (spec §3 DomainPreference).
///
/// Field names follow spec §6's persisted JSON shape
/// (`preferredTier`, `successCount`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainPreference {
    pub preferred_tier: Option<Tier>,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_response_time_ms: f64,
    pub last_used_at_ms: i64,
    pub last_failure_reason: Option<String>,
    /// Recent (domain, tier) outcomes, most recent last — used to evaluate
    /// the "last 5 attempts were successes" demotion rule (spec §4.2).
    #[serde(default)]
    pub recent_outcomes: Vec<(Tier, bool)>,
    /// Consecutive failures at the current preferred tier.
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl Default for DomainPreference {
    fn default() -> Self {
        Self {
            preferred_tier: None,
            success_count: 0,
            failure_count: 0,
            avg_response_time_ms: 0.0,
            last_used_at_ms: 0,
            last_failure_reason: None,
            recent_outcomes: Vec::new(),
            consecutive_failures: 0,
        }
    }
}

/// Per-stage duration breakdown the fetcher annotates on a fetch (spec §4.3
/// `getComponentBreakdown`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ComponentTiming {
    pub network_ms: u64,
    pub parsing_ms: u64,
    pub js_execution_ms: u64,
    pub extraction_ms: u64,
}

/// A single cost-bearing record appended to the Usage Meter's ring (spec §3
/// UsageEvent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: String,
    pub timestamp_ms: i64,
    pub domain: String,
    pub url: String,
    pub final_tier: Option<Tier>,
    pub success: bool,
    pub duration_ms: u64,
    pub tiers_attempted: Vec<Tier>,
    pub fell_back: bool,
    pub tenant_id: Option<String>,
    pub cost_units: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_is_ascending_cost() {
        assert!(Tier::Intelligence < Tier::Lightweight);
        assert!(Tier::Lightweight < Tier::Playwright);
    }

    #[test]
    fn tier_next_more_expensive_chains() {
        assert_eq!(Tier::Intelligence.next_more_expensive(), Some(Tier::Lightweight));
        assert_eq!(Tier::Lightweight.next_more_expensive(), Some(Tier::Playwright));
        assert_eq!(Tier::Playwright.next_more_expensive(), None);
    }
}
