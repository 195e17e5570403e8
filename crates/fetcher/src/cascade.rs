//! Tier selection, fallback, and validation (spec §4.1). `Fetcher` is the
//! crate's single public entry point; it holds no global state — the
//! caller wires in its own learning/perf/usage sinks and an optional
//! playwright adapter (spec §9's anti-singleton redesign).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use url::Url;
use webcascade_core::{
    generate_usage_event_id, AttemptFailure, CascadeError, DomainPreference, ErrorKind, FetchMetadata,
    FetchOptions, FetchResult, LearningAnnotations, LearningSink, PerfSink, Tier, TierAttempt, UsageEvent,
    UsageSink,
};

use crate::error::FetchError;
use crate::playwright::{NullPlaywrightAdapter, PlaywrightAdapter, PlaywrightOptions};
use crate::tiers::{self, TierOutput};
use crate::validator::{ContentValidator, ValidatorOverride};

pub struct FetcherConfig {
    pub user_agent: String,
    pub max_redirects: u8,
    pub playwright_available: bool,
    pub default_timeout_ms: u64,
    pub default_per_tier_timeout_ms: u64,
    pub script_budget_ms: u64,
    pub validator_overrides: HashMap<String, ValidatorOverride>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "webcascade/0.1".to_string(),
            max_redirects: 5,
            playwright_available: false,
            default_timeout_ms: 30_000,
            default_per_tier_timeout_ms: 30_000,
            script_budget_ms: 2_000,
            validator_overrides: HashMap::new(),
        }
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    learning: Arc<dyn LearningSink>,
    perf: Arc<dyn PerfSink>,
    usage: Arc<dyn UsageSink>,
    playwright: Arc<dyn PlaywrightAdapter>,
}

impl Fetcher {
    pub fn new(
        config: FetcherConfig,
        learning: Arc<dyn LearningSink>,
        perf: Arc<dyn PerfSink>,
        usage: Arc<dyn UsageSink>,
        playwright: Arc<dyn PlaywrightAdapter>,
    ) -> Result<Self, CascadeError> {
        let client = tiers::build_client(&config.user_agent, config.max_redirects)
            .map_err(|e| CascadeError::Config(e.to_string()))?;
        Ok(Self { client, config, learning, perf, usage, playwright })
    }

    /// Construct a fetcher with no playwright adapter wired in (spec §6:
    /// "the playwright adapter is an optional plug").
    pub fn without_playwright(
        config: FetcherConfig,
        learning: Arc<dyn LearningSink>,
        perf: Arc<dyn PerfSink>,
        usage: Arc<dyn UsageSink>,
    ) -> Result<Self, CascadeError> {
        Self::new(config, learning, perf, usage, Arc::new(NullPlaywrightAdapter))
    }

    /// Run the cascade for a single URL (spec §4.1, §6 Fetcher API).
    pub async fn fetch(&self, raw_url: &str, options: &FetchOptions) -> Result<FetchResult, FetchError> {
        let url = match webcascade_core::ssrf::check_url(raw_url) {
            webcascade_core::ssrf::UrlCheck::Allowed => Url::parse(raw_url).map_err(|_| invalid_url_error())?,
            webcascade_core::ssrf::UrlCheck::Blocked(reason) => {
                warn!(url = raw_url, ?reason, "rejected by ssrf/scheme check");
                return Err(invalid_url_error());
            }
        };
        let domain = url.host_str().unwrap_or("").to_string();

        let learning_enabled = options.enable_learning.unwrap_or(true);
        let validate = options.validate_content.unwrap_or(true);
        let per_tier_timeout = options
            .per_tier_timeout_ms
            .or(options.timeout_ms)
            .unwrap_or(self.config.default_per_tier_timeout_ms);

        let order = self.tier_order(&domain, options);
        let validator = self.validator_for(&domain);
        let overall_timeout_ms = options.timeout_ms.unwrap_or(self.config.default_timeout_ms);

        let total_started = Instant::now();
        let mut attempts: Vec<TierAttempt> = Vec::new();
        let mut most_specific: Option<ErrorKind> = None;

        for tier in order {
            if !attempts.is_empty() && total_started.elapsed().as_millis() as u64 >= overall_timeout_ms {
                most_specific = Some(bump(most_specific, ErrorKind::Timeout));
                break;
            }
            let started = Instant::now();
            let result = self.run_tier(tier, &url, per_tier_timeout, options).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    let outcome = if validate {
                        validator.validate(&output.text, output.has_semantic_element)
                    } else {
                        crate::validator::ValidationOutcome { valid: true, reason: None }
                    };

                    if outcome.valid {
                        attempts.push(TierAttempt { tier, duration_ms, reason: None });
                        return Ok(self.finish_success(
                            &domain,
                            &url,
                            output,
                            tier,
                            attempts,
                            total_started.elapsed().as_millis() as u64,
                            learning_enabled,
                        ));
                    }

                    attempts.push(TierAttempt { tier, duration_ms, reason: outcome.reason.clone() });
                    most_specific = Some(bump(most_specific, ErrorKind::Validation));
                    self.perf.record(&domain, tier, false, duration_ms, Some(output.component));
                    if learning_enabled {
                        let reasons = outcome.reason.into_iter().collect();
                        self.learning.record_failure(&domain, tier, &AttemptFailure::Validation { reasons });
                    }
                }
                Err(failure) => {
                    let fatal = failure.is_fatal_network();
                    attempts.push(TierAttempt { tier, duration_ms, reason: Some(failure.to_string()) });
                    most_specific = Some(bump(most_specific, failure.kind()));
                    self.perf.record(&domain, tier, false, duration_ms, None);
                    if learning_enabled {
                        self.learning.record_failure(&domain, tier, &failure);
                    }
                    if fatal {
                        break;
                    }
                }
            }
        }

        let kind = most_specific.unwrap_or(ErrorKind::Internal);
        let cost_units = compute_cost(&attempts, None);
        self.usage.record(self.build_event(&domain, raw_url, None, false, &attempts, cost_units, total_started.elapsed().as_millis() as u64));
        info!(domain = %domain, kind = ?kind, attempts = attempts.len(), "cascade exhausted");
        Err(FetchError { kind, message: "all tiers exhausted".to_string(), attempts })
    }

    fn finish_success(
        &self,
        domain: &str,
        url: &Url,
        output: TierOutput,
        final_tier: Tier,
        attempts: Vec<TierAttempt>,
        total_ms: u64,
        learning_enabled: bool,
    ) -> FetchResult {
        let final_attempt_ms = attempts.last().map(|a| a.duration_ms).unwrap_or(total_ms);
        let fell_back = attempts.len() > 1;
        let cost_units = compute_cost(&attempts, Some(final_tier));

        self.perf.record(domain, final_tier, true, final_attempt_ms, Some(output.component));
        if learning_enabled {
            self.learning.record_success(domain, final_tier, final_attempt_ms, output.text.len());
        }

        let tiers_attempted: Vec<Tier> = attempts.iter().map(|a| a.tier).collect();
        self.usage.record(self.build_event(
            domain,
            url.as_str(),
            Some(final_tier),
            true,
            &attempts,
            cost_units,
            total_ms,
        ));

        let confidence = 1.0 / attempts.len() as f64;

        FetchResult {
            final_url: output.final_url,
            title: output.title,
            html: Some(output.html),
            text: output.text,
            markdown: output.markdown,
            apis: output.apis,
            metadata: FetchMetadata {
                load_time_ms: total_ms,
                timestamp: chrono::Utc::now(),
                final_url: url.to_string(),
            },
            learning: LearningAnnotations {
                selectors_tried: Vec::new(),
                selectors_succeeded: Vec::new(),
                selectors_failed: Vec::new(),
                overall_confidence: confidence,
            },
            final_tier,
            tiers_attempted,
            fell_back,
            cost_units,
        }
    }

    fn build_event(
        &self,
        domain: &str,
        url: &str,
        final_tier: Option<Tier>,
        success: bool,
        attempts: &[TierAttempt],
        cost_units: u32,
        duration_ms: u64,
    ) -> UsageEvent {
        let now_ms = chrono::Utc::now().timestamp_millis();
        UsageEvent {
            id: generate_usage_event_id(now_ms),
            timestamp_ms: now_ms,
            domain: domain.to_string(),
            url: url.to_string(),
            final_tier,
            success,
            duration_ms,
            tiers_attempted: attempts.iter().map(|a| a.tier).collect(),
            fell_back: attempts.len() > 1,
            tenant_id: None,
            cost_units,
        }
    }

    /// Spec §4.1 "Ordering": learning-preferred tier first (duplicates
    /// removed), playwright elided when unavailable, a forced `options.tier`
    /// short-circuits to a single-tier cascade.
    fn tier_order(&self, domain: &str, options: &FetchOptions) -> Vec<Tier> {
        if let Some(forced) = options.tier {
            return vec![forced];
        }

        let mut order = Tier::default_order().to_vec();
        let preferred = self.preference(domain).and_then(|p| p.preferred_tier);
        if let Some(pref) = preferred {
            order.retain(|t| *t != pref);
            order.insert(0, pref);
        }
        if !self.config.playwright_available {
            order.retain(|t| *t != Tier::Playwright);
        }
        order
    }

    fn preference(&self, domain: &str) -> Option<DomainPreference> {
        self.learning.preference(domain)
    }

    fn validator_for(&self, domain: &str) -> ContentValidator {
        match self.config.validator_overrides.get(domain) {
            Some(over) => ContentValidator::with_override(over),
            None => ContentValidator::default(),
        }
    }

    async fn run_tier(
        &self,
        tier: Tier,
        url: &Url,
        timeout_ms: u64,
        options: &FetchOptions,
    ) -> Result<TierOutput, AttemptFailure> {
        match tier {
            Tier::Intelligence => tiers::fetch_intelligence(&self.client, url, timeout_ms).await,
            Tier::Lightweight => {
                tiers::fetch_lightweight(&self.client, url, timeout_ms, self.config.script_budget_ms).await
            }
            Tier::Playwright => {
                let opts = PlaywrightOptions {
                    navigation_timeout_ms: timeout_ms,
                    session_profile: options.session_profile.clone(),
                };
                tiers::fetch_playwright(self.playwright.as_ref(), url, &opts, self.config.script_budget_ms).await
            }
        }
    }
}

fn invalid_url_error() -> FetchError {
    FetchError { kind: ErrorKind::InvalidUrl, message: "rejected by ssrf/scheme validation".to_string(), attempts: Vec::new() }
}

fn bump(current: Option<ErrorKind>, candidate: ErrorKind) -> ErrorKind {
    match current {
        Some(existing) => existing.most_specific(candidate),
        None => candidate,
    }
}

/// `cost_units = sum_over(attempted tiers) { full_cost if final else
/// ceil(full_cost/2) }` (spec §3).
fn compute_cost(attempts: &[TierAttempt], final_tier: Option<Tier>) -> u32 {
    attempts
        .iter()
        .map(|a| {
            let full = a.tier.full_cost();
            if Some(a.tier) == final_tier {
                full
            } else {
                (full + 1) / 2
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_for_single_intelligence_success_is_one() {
        let attempts = vec![TierAttempt { tier: Tier::Intelligence, duration_ms: 10, reason: None }];
        assert_eq!(compute_cost(&attempts, Some(Tier::Intelligence)), 1);
    }

    #[test]
    fn cost_for_fallback_to_lightweight_matches_scenario_two() {
        let attempts = vec![
            TierAttempt { tier: Tier::Intelligence, duration_ms: 5, reason: Some("too short".into()) },
            TierAttempt { tier: Tier::Lightweight, duration_ms: 20, reason: None },
        ];
        assert_eq!(compute_cost(&attempts, Some(Tier::Lightweight)), 6);
    }

    #[test]
    fn error_kind_priority_prefers_auth_over_network() {
        assert_eq!(ErrorKind::Auth.most_specific(ErrorKind::Network), ErrorKind::Auth);
        assert_eq!(bump(Some(ErrorKind::Network), ErrorKind::Auth), ErrorKind::Auth);
    }
}
