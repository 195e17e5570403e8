//! Content Change Tracker (spec §4.7): MD5 fingerprinting, block-level diff,
//! and key-value extraction across repeated fetches of the same URL.
//! Persistence follows the Learning Store's atomic-rename/debounce idiom
//! (spec §4.2's policy, reused verbatim per §4.7's "same atomic-rename
//! debounce policy").
//!
//! The system-wide non-goal of caching full page bodies across restarts
//! (spec §1) is about the Fetcher, not this tracker: diffing is this
//! component's whole job, so it persists each URL's latest normalized
//! blocks — not the original HTML — purely to support the next `checkForChanges`.

pub mod diff;
pub mod fingerprint;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use webcascade_core::config::constants;
use webcascade_core::config::ChangeThresholds;
use webcascade_core::persist::{atomic_write_json, load_json_or_quarantine};

use diff::{classify_change, diff_blocks, diff_key_values, extract_key_values, ChangeReport, ChangeSeverity, KeyValueDiff};
use fingerprint::{compute_fingerprint, split_blocks, Fingerprint};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub fingerprint: Fingerprint,
    pub report: Option<ChangeReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackedEntry {
    label: Option<String>,
    tags: Vec<String>,
    tracked_since_ms: i64,
    last_checked_ms: i64,
    check_count: u64,
    change_count: u64,
    current_blocks: Vec<String>,
    current_key_values: KeyValueDiff,
    current_fingerprint: Fingerprint,
    history: Vec<ChangeRecord>,
}

#[derive(Debug, Clone)]
pub struct TrackedContentSummary {
    pub url: String,
    pub label: Option<String>,
    pub tags: Vec<String>,
    pub tracked_since_ms: i64,
    pub last_checked_ms: i64,
    pub check_count: u64,
    pub change_count: u64,
    pub current_fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Default)]
pub struct TrackedContentFilter {
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackOptions {
    pub label: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub is_tracked: bool,
    pub is_first_check: bool,
    pub has_changed: bool,
    pub change_report: Option<ChangeReport>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentTrackerStats {
    pub tracked_count: usize,
    pub total_checks: u64,
    pub total_changes: u64,
}

pub struct ContentTracker {
    tracked: DashMap<String, TrackedEntry>,
    data_path: PathBuf,
    dirty_since: Mutex<Option<Instant>>,
    debounce: Duration,
    thresholds: ChangeThresholds,
}

impl ContentTracker {
    pub fn new(data_dir: &Path, thresholds: ChangeThresholds) -> Self {
        let data_path = data_dir.join("content.json");
        let loaded: Option<HashMap<String, TrackedEntry>> = load_json_or_quarantine(&data_path);
        let tracked = DashMap::new();
        if let Some(map) = loaded {
            for (url, entry) in map {
                tracked.insert(url, entry);
            }
        }
        Self { tracked, data_path, dirty_since: Mutex::new(None), debounce: Duration::from_millis(constants::PERSIST_DEBOUNCE_MS), thresholds }
    }

    pub fn track_url(&self, url: &str, content: &str, options: TrackOptions, now_ms: i64) {
        let blocks = split_blocks(content);
        let fingerprint = compute_fingerprint(content, now_ms);
        let key_values = extract_key_values(content);

        let entry = TrackedEntry {
            label: options.label,
            tags: options.tags,
            tracked_since_ms: now_ms,
            last_checked_ms: now_ms,
            check_count: 0,
            change_count: 0,
            current_blocks: blocks,
            current_key_values: key_values,
            current_fingerprint: fingerprint.clone(),
            history: vec![ChangeRecord { fingerprint, report: None }],
        };
        self.tracked.insert(url.to_string(), entry);
        self.mark_dirty();
    }

    pub fn check_for_changes(&self, url: &str, new_content: &str, now_ms: i64) -> CheckResult {
        let Some(mut entry) = self.tracked.get_mut(url) else {
            return CheckResult { is_tracked: false, is_first_check: false, has_changed: false, change_report: None };
        };

        let new_fingerprint = compute_fingerprint(new_content, now_ms);
        let new_blocks = split_blocks(new_content);
        let new_key_values = extract_key_values(new_content);

        let severity = classify_change(&entry.current_fingerprint, &new_fingerprint, &self.thresholds);
        let has_changed = severity != ChangeSeverity::None;
        let is_first_check = entry.check_count == 0;

        entry.check_count += 1;
        entry.last_checked_ms = now_ms;

        let report = if has_changed {
            let block_changes = diff_blocks(&entry.current_blocks, &new_blocks, &self.thresholds);
            let key_value_diff = diff_key_values(&entry.current_key_values, &new_key_values);
            // A high-significance keyword escalates to `high` regardless of
            // the length/structure-derived severity (spec §4.7).
            let escalated = if block_changes.iter().any(|c| c.significance == ChangeSeverity::High) {
                ChangeSeverity::High
            } else {
                severity
            };
            entry.change_count += 1;
            Some(ChangeReport { severity: escalated, block_changes, key_values: key_value_diff })
        } else {
            None
        };

        entry.current_blocks = new_blocks;
        entry.current_key_values = new_key_values;
        entry.current_fingerprint = new_fingerprint.clone();
        entry.history.push(ChangeRecord { fingerprint: new_fingerprint, report: report.clone() });

        drop(entry);
        self.mark_dirty();

        CheckResult { is_tracked: true, is_first_check, has_changed, change_report: report }
    }

    pub fn untrack_url(&self, url: &str) -> bool {
        let removed = self.tracked.remove(url).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    pub fn get_change_history(&self, url: &str, limit: usize) -> Vec<ChangeRecord> {
        match self.tracked.get(url) {
            Some(entry) => entry.history.iter().rev().take(limit).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn list_tracked_urls(&self, filter: &TrackedContentFilter) -> Vec<TrackedContentSummary> {
        self.tracked
            .iter()
            .filter(|entry| match &filter.tag {
                Some(tag) => entry.value().tags.contains(tag),
                None => true,
            })
            .map(|entry| TrackedContentSummary {
                url: entry.key().clone(),
                label: entry.value().label.clone(),
                tags: entry.value().tags.clone(),
                tracked_since_ms: entry.value().tracked_since_ms,
                last_checked_ms: entry.value().last_checked_ms,
                check_count: entry.value().check_count,
                change_count: entry.value().change_count,
                current_fingerprint: entry.value().current_fingerprint.clone(),
            })
            .collect()
    }

    pub fn stats(&self) -> ContentTrackerStats {
        let mut stats = ContentTrackerStats { tracked_count: self.tracked.len(), ..Default::default() };
        for entry in self.tracked.iter() {
            stats.total_checks += entry.value().check_count;
            stats.total_changes += entry.value().change_count;
        }
        stats
    }

    pub fn maybe_persist(&self) {
        let due = {
            let guard = self.dirty_since.lock().unwrap();
            matches!(*guard, Some(since) if since.elapsed() >= self.debounce)
        };
        if due {
            self.persist_now();
        }
    }

    pub fn flush(&self) {
        let is_dirty = self.dirty_since.lock().unwrap().is_some();
        if is_dirty {
            self.persist_now();
        }
    }

    fn persist_now(&self) {
        let snapshot: HashMap<String, TrackedEntry> = self.tracked.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
        match atomic_write_json(&self.data_path, &snapshot) {
            Ok(()) => *self.dirty_since.lock().unwrap() = None,
            Err(e) => warn!(error = %e, path = %self.data_path.display(), "failed to persist content tracker"),
        }
    }

    fn mark_dirty(&self) {
        let mut guard = self.dirty_since.lock().unwrap();
        if guard.is_none() {
            *guard = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_check_after_tracking_reports_tracked_but_not_first_check() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ContentTracker::new(dir.path(), ChangeThresholds::default());
        tracker.track_url("https://example.com/visa", "# Visa Rules\n\nThe fee is 100 USD.", TrackOptions { label: None, tags: vec![] }, 0);

        let result = tracker.check_for_changes("https://example.com/visa", "# Visa Rules\n\nThe fee is 100 USD.", 1_000);
        assert!(result.is_tracked);
        assert!(!result.has_changed);
    }

    #[test]
    fn structural_change_is_classified_high() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ContentTracker::new(dir.path(), ChangeThresholds::default());
        tracker.track_url("https://example.com/visa", "Plain paragraph only.", TrackOptions { label: None, tags: vec![] }, 0);

        let result = tracker.check_for_changes("https://example.com/visa", "# Now With A Heading\n\nPlain paragraph only.", 1_000);
        assert!(result.has_changed);
        assert_eq!(result.change_report.unwrap().severity, ChangeSeverity::High);
    }

    #[test]
    fn high_significance_keyword_escalates_severity() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ContentTracker::new(dir.path(), ChangeThresholds::default());
        tracker.track_url("https://example.com/visa", "Application process overview.", TrackOptions { label: None, tags: vec![] }, 0);

        let result = tracker.check_for_changes(
            "https://example.com/visa",
            "Application process overview. The visa must be renewed before it expires.",
            1_000,
        );
        assert!(result.has_changed);
        let report = result.change_report.unwrap();
        assert_eq!(report.severity, ChangeSeverity::High);
    }

    #[test]
    fn untrack_then_check_reports_not_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ContentTracker::new(dir.path(), ChangeThresholds::default());
        tracker.track_url("https://example.com/x", "content", TrackOptions { label: None, tags: vec![] }, 0);
        assert!(tracker.untrack_url("https://example.com/x"));

        let result = tracker.check_for_changes("https://example.com/x", "content v2", 10);
        assert!(!result.is_tracked);
    }

    #[test]
    fn flush_persists_and_clears_dirty_flag() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ContentTracker::new(dir.path(), ChangeThresholds::default());
        tracker.track_url("https://example.com/x", "content", TrackOptions { label: None, tags: vec![] }, 0);
        tracker.flush();
        assert!(dir.path().join("content.json").exists());
    }
}
