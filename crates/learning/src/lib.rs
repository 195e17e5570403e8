//! Domain Learning Store (spec §4.2): per-domain preferences that bias
//! future cascades. Reads are lock-free snapshots off a `DashMap`; each
//! mutation holds that domain's shard guard for its whole read-modify-write
//! so a concurrent `preference()` never observes a torn entry. Persistence
//! follows `webcascade_core::persist`'s atomic-rename path, debounced by a
//! "dirty since" timestamp rather than a dedicated actor (grounded on the
//! teacher's single-mutex-serializes-writes concurrency note).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::warn;
use webcascade_core::config::constants;
use webcascade_core::persist::{atomic_write_json, load_json_or_quarantine};
use webcascade_core::{AttemptFailure, DomainPreference, LearningSink, Tier};

/// Consecutive-failure threshold that triggers promotion to a more
/// expensive tier (spec §4.2) — distinct from Pattern Health's thresholds.
const PROMOTION_THRESHOLD: u32 = 3;
/// Window checked for "the last 5 attempts on this (domain, tier)" (spec
/// §4.2's demotion rule).
const DEMOTION_WINDOW: usize = 5;
/// Bound on the per-domain outcome history so it never grows unbounded.
const MAX_OUTCOME_HISTORY: usize = 64;

pub struct LearningStore {
    domains: DashMap<String, DomainPreference>,
    data_path: PathBuf,
    dirty_since: Mutex<Option<Instant>>,
    debounce: Duration,
}

impl LearningStore {
    pub fn new(data_dir: &Path) -> Self {
        let data_path = data_dir.join("learning.json");
        let loaded: Option<HashMap<String, DomainPreference>> = load_json_or_quarantine(&data_path);
        let domains = DashMap::new();
        if let Some(map) = loaded {
            for (domain, pref) in map {
                domains.insert(domain, pref);
            }
        }
        Self {
            domains,
            data_path,
            dirty_since: Mutex::new(None),
            debounce: Duration::from_millis(constants::PERSIST_DEBOUNCE_MS),
        }
    }

    pub fn set_domain_preference(&self, domain: &str, tier: Tier) {
        self.domains.entry(domain.to_string()).or_default().preferred_tier = Some(tier);
        self.mark_dirty();
    }

    pub fn export_preferences(&self) -> HashMap<String, DomainPreference> {
        self.domains.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }

    /// `export(import(x)) == x` for any `x` produced by `export` (spec §8).
    pub fn import_state(&self, serialized: HashMap<String, DomainPreference>) {
        self.domains.clear();
        for (domain, pref) in serialized {
            self.domains.insert(domain, pref);
        }
        self.mark_dirty();
    }

    /// Checked on a background tick; persists only once the debounce window
    /// has elapsed since the last mutation (spec §4.2).
    pub fn maybe_persist(&self) {
        let due = {
            let guard = self.dirty_since.lock().unwrap();
            matches!(*guard, Some(since) if since.elapsed() >= self.debounce)
        };
        if due {
            self.persist_now();
        }
    }

    /// Drains any pending debounced save and blocks until durable (spec §5
    /// `flush()` contract).
    pub fn flush(&self) {
        let is_dirty = self.dirty_since.lock().unwrap().is_some();
        if is_dirty {
            self.persist_now();
        }
    }

    fn persist_now(&self) {
        let snapshot = self.export_preferences();
        match atomic_write_json(&self.data_path, &snapshot) {
            Ok(()) => *self.dirty_since.lock().unwrap() = None,
            Err(e) => warn!(error = %e, path = %self.data_path.display(), "failed to persist learning store"),
        }
    }

    fn mark_dirty(&self) {
        let mut guard = self.dirty_since.lock().unwrap();
        if guard.is_none() {
            *guard = Some(Instant::now());
        }
    }
}

impl LearningSink for LearningStore {
    fn preference(&self, domain: &str) -> Option<DomainPreference> {
        self.domains.get(domain).map(|entry| entry.value().clone())
    }

    fn record_success(&self, domain: &str, tier: Tier, duration_ms: u64, _content_length: usize) {
        {
            let mut entry = self.domains.entry(domain.to_string()).or_default();
            let had_prior_success = entry.success_count > 0;
            entry.success_count += 1;
            entry.avg_response_time_ms = if had_prior_success {
                constants::EMA_ALPHA * duration_ms as f64 + (1.0 - constants::EMA_ALPHA) * entry.avg_response_time_ms
            } else {
                duration_ms as f64
            };
            entry.last_used_at_ms = chrono::Utc::now().timestamp_millis();
            entry.consecutive_failures = 0;
            push_outcome(&mut entry.recent_outcomes, tier, true);

            let should_demote = match entry.preferred_tier {
                None => true,
                Some(preferred) => {
                    tier.full_cost() < preferred.full_cost()
                        && last_n_outcomes_all_succeeded(&entry.recent_outcomes, tier, DEMOTION_WINDOW)
                }
            };
            if should_demote {
                entry.preferred_tier = Some(tier);
            }
        }
        self.mark_dirty();
    }

    fn record_failure(&self, domain: &str, tier: Tier, failure: &AttemptFailure) {
        {
            let mut entry = self.domains.entry(domain.to_string()).or_default();
            entry.failure_count += 1;
            entry.last_failure_reason = Some(failure.to_string());
            push_outcome(&mut entry.recent_outcomes, tier, false);

            let effective_preferred = entry.preferred_tier.unwrap_or(Tier::Intelligence);
            if tier == effective_preferred {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= PROMOTION_THRESHOLD {
                    if let Some(next) = effective_preferred.next_more_expensive() {
                        entry.preferred_tier = Some(next);
                        entry.consecutive_failures = 0;
                    }
                }
            }
        }
        self.mark_dirty();
    }
}

fn push_outcome(log: &mut Vec<(Tier, bool)>, tier: Tier, success: bool) {
    log.push((tier, success));
    if log.len() > MAX_OUTCOME_HISTORY {
        log.remove(0);
    }
}

fn last_n_outcomes_all_succeeded(log: &[(Tier, bool)], tier: Tier, n: usize) -> bool {
    let matching: Vec<bool> = log.iter().rev().filter(|(t, _)| *t == tier).map(|(_, success)| *success).take(n).collect();
    matching.len() == n && matching.iter().all(|success| *success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_success_sets_preferred_tier_and_average() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        store.record_success("example.com", Tier::Intelligence, 120, 900);
        let pref = store.preference("example.com").unwrap();
        assert_eq!(pref.preferred_tier, Some(Tier::Intelligence));
        assert_eq!(pref.success_count, 1);
        assert_eq!(pref.avg_response_time_ms, 120.0);
    }

    #[test]
    fn three_consecutive_failures_at_preferred_tier_promote_to_next() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        store.set_domain_preference("slow.example", Tier::Intelligence);
        for _ in 0..3 {
            store.record_failure("slow.example", Tier::Intelligence, &AttemptFailure::Timeout(5_000));
        }
        let pref = store.preference("slow.example").unwrap();
        assert_eq!(pref.preferred_tier, Some(Tier::Lightweight));
        assert_eq!(pref.consecutive_failures, 0);
    }

    #[test]
    fn failures_at_a_non_preferred_tier_do_not_count_toward_promotion() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        store.set_domain_preference("mixed.example", Tier::Intelligence);
        store.record_failure("mixed.example", Tier::Lightweight, &AttemptFailure::BotChallenge);
        store.record_failure("mixed.example", Tier::Lightweight, &AttemptFailure::BotChallenge);
        let pref = store.preference("mixed.example").unwrap();
        assert_eq!(pref.preferred_tier, Some(Tier::Intelligence));
        assert_eq!(pref.consecutive_failures, 0);
    }

    #[test]
    fn export_then_import_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        store.record_success("a.example", Tier::Lightweight, 50, 500);
        let exported = store.export_preferences();

        let dir2 = tempfile::tempdir().unwrap();
        let store2 = LearningStore::new(dir2.path());
        store2.import_state(exported.clone());
        assert_eq!(store2.export_preferences(), exported);
    }

    #[test]
    fn flush_persists_and_clears_dirty_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = LearningStore::new(dir.path());
        store.record_success("x.example", Tier::Intelligence, 10, 10);
        store.flush();
        assert!(dir.path().join("learning.json").exists());
        assert!(store.dirty_since.lock().unwrap().is_none());
    }
}
