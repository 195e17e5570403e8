//! Pattern Health Tracker (spec §4.6): a pure status function over a
//! per-`(domain, endpoint)` observation ring, plus a capped notification
//! ring on transitions. Grounded on the teacher's layered pure
//! classification functions (`NetworkDriver::classify_error`) and
//! `discovery::correlation`'s history-ring bookkeeping. Process-local; no
//! persistence.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use dashmap::DashMap;
use webcascade_core::config::HealthThresholds;

const NOTIFICATION_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Healthy,
    Degraded,
    Failing,
    Broken,
}

impl Status {
    pub fn is_healthy(self) -> bool {
        matches!(self, Status::Healthy)
    }

    fn suggested_actions(self) -> Vec<String> {
        match self {
            Status::Healthy => Vec::new(),
            Status::Degraded => vec!["monitor closely for further decline".to_string()],
            Status::Failing => vec!["increase monitoring frequency".to_string(), "review recent failure reasons".to_string()],
            Status::Broken => vec![
                "investigate endpoint immediately".to_string(),
                "consider disabling this pattern".to_string(),
                "check upstream availability".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub domain: String,
    pub endpoint: String,
    pub previous: Status,
    pub current: Status,
    pub suggested_actions: Vec<String>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct PatternSnapshot {
    pub domain: String,
    pub endpoint: String,
    pub status: Status,
    pub success_rate: f64,
    pub consecutive_failures: u32,
    pub sample_size: usize,
    pub degraded_since_ms: Option<i64>,
}

struct PatternState {
    history: VecDeque<bool>,
    consecutive_failures: u32,
    status: Status,
    degraded_since_ms: Option<i64>,
}

impl PatternState {
    fn new() -> Self {
        Self { history: VecDeque::new(), consecutive_failures: 0, status: Status::Healthy, degraded_since_ms: None }
    }

    fn success_rate(&self) -> f64 {
        if self.history.is_empty() {
            return 1.0;
        }
        let successes = self.history.iter().filter(|s| **s).count();
        successes as f64 / self.history.len() as f64
    }
}

pub struct HealthTracker {
    patterns: DashMap<(String, String), PatternState>,
    notifications: Mutex<VecDeque<Notification>>,
    thresholds: HealthThresholds,
}

impl HealthTracker {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { patterns: DashMap::new(), notifications: Mutex::new(VecDeque::new()), thresholds }
    }

    /// Process-local only; no persisted state to drain (spec §5).
    pub fn flush(&self) {}

    pub fn record_success(&self, domain: &str, endpoint: &str, now_ms: i64) {
        self.observe(domain, endpoint, true, now_ms);
    }

    pub fn record_failure(&self, domain: &str, endpoint: &str, now_ms: i64) {
        self.observe(domain, endpoint, false, now_ms);
    }

    fn observe(&self, domain: &str, endpoint: &str, success: bool, now_ms: i64) {
        let key = (domain.to_string(), endpoint.to_string());
        let mut entry = self.patterns.entry(key).or_insert_with(PatternState::new);

        entry.history.push_back(success);
        while entry.history.len() > self.thresholds.history_window {
            entry.history.pop_front();
        }
        entry.consecutive_failures = if success { 0 } else { entry.consecutive_failures + 1 };

        let previous = entry.status;
        let current = compute_status(entry.success_rate(), entry.consecutive_failures, entry.history.len(), &self.thresholds);
        entry.status = current;

        if current.is_healthy() {
            entry.degraded_since_ms = None;
        } else if previous.is_healthy() {
            entry.degraded_since_ms = Some(now_ms);
        }

        if current != previous {
            let notification = Notification {
                domain: domain.to_string(),
                endpoint: endpoint.to_string(),
                previous,
                current,
                suggested_actions: current.suggested_actions(),
                timestamp_ms: now_ms,
            };
            let mut notifications = self.notifications.lock().unwrap();
            notifications.push_back(notification);
            while notifications.len() > NOTIFICATION_CAP {
                notifications.pop_front();
            }
        }
    }

    pub fn snapshot(&self, domain: &str, endpoint: &str) -> Option<PatternSnapshot> {
        self.patterns.get(&(domain.to_string(), endpoint.to_string())).map(|entry| to_snapshot(domain, endpoint, &entry))
    }

    /// Non-healthy patterns sorted `broken > failing > degraded` (spec §4.6).
    pub fn get_unhealthy_patterns(&self) -> Vec<PatternSnapshot> {
        let mut unhealthy: Vec<PatternSnapshot> = self
            .patterns
            .iter()
            .filter(|entry| !entry.value().status.is_healthy())
            .map(|entry| to_snapshot(&entry.key().0, &entry.key().1, entry.value()))
            .collect();
        unhealthy.sort_by(|a, b| b.status.cmp(&a.status));
        unhealthy
    }

    pub fn stats(&self) -> HashMap<Status, usize> {
        let mut counts = HashMap::new();
        for entry in self.patterns.iter() {
            *counts.entry(entry.value().status).or_insert(0) += 1;
        }
        counts
    }

    pub fn recent_notifications(&self, limit: usize) -> Vec<Notification> {
        let notifications = self.notifications.lock().unwrap();
        notifications.iter().rev().take(limit).cloned().collect()
    }
}

fn to_snapshot(domain: &str, endpoint: &str, state: &PatternState) -> PatternSnapshot {
    PatternSnapshot {
        domain: domain.to_string(),
        endpoint: endpoint.to_string(),
        status: state.status,
        success_rate: state.success_rate(),
        consecutive_failures: state.consecutive_failures,
        sample_size: state.history.len(),
        degraded_since_ms: state.degraded_since_ms,
    }
}

/// Pure status function (spec §4.6): insufficient samples always read
/// `healthy`; consecutive failures take priority over the success-rate
/// bands once the sample floor is met.
fn compute_status(success_rate: f64, consecutive_failures: u32, sample_size: usize, thresholds: &HealthThresholds) -> Status {
    if sample_size < thresholds.min_samples {
        return Status::Healthy;
    }
    if consecutive_failures >= 2 * thresholds.consecutive_failures {
        return Status::Broken;
    }
    if consecutive_failures >= thresholds.consecutive_failures {
        return Status::Failing;
    }
    if success_rate >= thresholds.degraded {
        Status::Healthy
    } else if success_rate >= thresholds.failing {
        Status::Degraded
    } else if success_rate >= thresholds.broken {
        Status::Failing
    } else {
        Status::Broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_samples_stay_healthy_despite_failures() {
        let tracker = HealthTracker::new(HealthThresholds::default());
        tracker.record_failure("example.com", "/api", 0);
        tracker.record_failure("example.com", "/api", 1);
        let snapshot = tracker.snapshot("example.com", "/api").unwrap();
        assert_eq!(snapshot.status, Status::Healthy);
    }

    #[test]
    fn six_consecutive_failures_mark_broken_and_emit_notification() {
        let tracker = HealthTracker::new(HealthThresholds::default());
        for i in 0..6 {
            tracker.record_failure("example.com", "/api", i);
        }
        let snapshot = tracker.snapshot("example.com", "/api").unwrap();
        assert_eq!(snapshot.status, Status::Broken);
        assert!(snapshot.degraded_since_ms.is_some());

        let notifications = tracker.recent_notifications(10);
        assert!(notifications.iter().any(|n| n.current == Status::Broken));
    }

    #[test]
    fn recovering_to_healthy_clears_degradation_timestamp() {
        let tracker = HealthTracker::new(HealthThresholds::default());
        for i in 0..6 {
            tracker.record_failure("example.com", "/api", i);
        }
        for i in 6..26 {
            tracker.record_success("example.com", "/api", i);
        }
        let snapshot = tracker.snapshot("example.com", "/api").unwrap();
        assert_eq!(snapshot.status, Status::Healthy);
        assert!(snapshot.degraded_since_ms.is_none());
    }

    #[test]
    fn unhealthy_patterns_sort_by_descending_severity() {
        let tracker = HealthTracker::new(HealthThresholds::default());
        for i in 0..6 {
            tracker.record_failure("broken.example", "/a", i);
        }
        for i in 0..5 {
            tracker.record_success("degraded.example", "/b", i);
        }
        for i in 5..10 {
            tracker.record_failure("degraded.example", "/b", i);
        }
        let unhealthy = tracker.get_unhealthy_patterns();
        assert_eq!(unhealthy[0].domain, "broken.example");
    }
}
