//! Usage Meter (spec §4.4): a bounded append-only ring of `UsageEvent`s plus
//! period-bucketed cost/request aggregation. Ring truncation and atomic-rename
//! persistence follow the same idioms as [`webcascade_learning`]: a
//! "dirty since" debounce rather than a dedicated flush actor.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use tracing::warn;
use webcascade_core::config::constants;
use webcascade_core::persist::{atomic_write_json, load_json_or_quarantine};
use webcascade_core::{Tier, UsageEvent, UsageSink};

const TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Hour,
    Day,
    Week,
    Month,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct UsageFilter {
    pub domain: Option<String>,
    pub tier: Option<Tier>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PeriodAggregate {
    pub count: u64,
    pub success: u64,
    pub cost: u64,
    pub by_tier: HashMap<Tier, u64>,
    pub top_domains_by_cost: Vec<(String, u64)>,
    pub top_domains_by_requests: Vec<(String, u64)>,
    pub avg_duration_ms: f64,
    pub fallback_rate: f64,
}

#[derive(Debug, Clone)]
pub struct UsageSummary {
    pub total_requests: u64,
    pub total_cost: u64,
    pub success_rate: f64,
    pub avg_cost_per_request: f64,
    pub current: PeriodAggregate,
    pub previous: PeriodAggregate,
    pub cost_trend: Option<f64>,
    pub request_trend: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PeriodBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub aggregate: PeriodAggregate,
}

pub struct UsageMeter {
    events: Mutex<VecDeque<UsageEvent>>,
    data_path: PathBuf,
    dirty_since: Mutex<Option<Instant>>,
    debounce: StdDuration,
}

impl UsageMeter {
    pub fn new(data_dir: &Path) -> Self {
        let data_path = data_dir.join("usage.json");
        let loaded: Option<Vec<UsageEvent>> = load_json_or_quarantine(&data_path);
        let mut events = VecDeque::from(loaded.unwrap_or_default());
        trim(&mut events);
        Self {
            events: Mutex::new(events),
            data_path,
            dirty_since: Mutex::new(None),
            debounce: StdDuration::from_millis(constants::PERSIST_DEBOUNCE_MS),
        }
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
        let snapshot: Vec<UsageEvent> = self.events.lock().unwrap().iter().cloned().collect();
        match atomic_write_json(&self.data_path, &snapshot) {
            Ok(()) => *self.dirty_since.lock().unwrap() = None,
            Err(e) => warn!(error = %e, path = %self.data_path.display(), "failed to persist usage meter"),
        }
    }

    fn mark_dirty(&self) {
        let mut guard = self.dirty_since.lock().unwrap();
        if guard.is_none() {
            *guard = Some(Instant::now());
        }
    }

    pub fn summary(&self, filter: &UsageFilter, period: Period, now: DateTime<Utc>) -> UsageSummary {
        let events = self.events.lock().unwrap();
        let matching: Vec<&UsageEvent> = events.iter().filter(|e| filter_matches(e, filter)).collect();

        let total_requests = matching.len() as u64;
        let total_cost: u64 = matching.iter().map(|e| e.cost_units as u64).sum();
        let total_success = matching.iter().filter(|e| e.success).count() as u64;
        let success_rate = if total_requests > 0 { total_success as f64 / total_requests as f64 } else { 0.0 };
        let avg_cost_per_request = if total_requests > 0 { total_cost as f64 / total_requests as f64 } else { 0.0 };

        let current_start = period_start(period, now);
        let current = aggregate(&matching, current_start, Some(now));

        let previous = match previous_period_bounds(period, current_start) {
            Some((start, end)) => aggregate(&matching, Some(start), Some(end)),
            None => PeriodAggregate::default(),
        };

        let cost_trend = trend(current.cost as f64, previous.cost as f64);
        let request_trend = trend(current.count as f64, previous.count as f64);

        UsageSummary {
            total_requests,
            total_cost,
            success_rate,
            avg_cost_per_request,
            current,
            previous,
            cost_trend,
            request_trend,
        }
    }

    /// Returns the last `n` contiguous `granularity` buckets ending at `now`.
    /// `Period::All` has no natural repeating boundary, so a single
    /// all-time bucket is returned regardless of `n`.
    pub fn get_usage_by_period(&self, filter: &UsageFilter, granularity: Period, n: usize, now: DateTime<Utc>) -> Vec<PeriodBucket> {
        let events = self.events.lock().unwrap();
        let matching: Vec<&UsageEvent> = events.iter().filter(|e| filter_matches(e, filter)).collect();

        if granularity == Period::All || n == 0 {
            return vec![PeriodBucket { start: DateTime::<Utc>::from_timestamp(0, 0).unwrap(), end: now, aggregate: aggregate(&matching, None, Some(now)) }];
        }

        let mut bounds = Vec::with_capacity(n);
        let mut end = period_start(granularity, now).unwrap_or(now);
        // The in-progress current bucket runs from its start to `now`.
        bounds.push((end, now));
        for _ in 1..n {
            let start = step_back(granularity, end);
            bounds.push((start, end));
            end = start;
        }
        bounds.reverse();

        bounds
            .into_iter()
            .map(|(start, end)| PeriodBucket { start, end, aggregate: aggregate(&matching, Some(start), Some(end)) })
            .collect()
    }
}

impl UsageSink for UsageMeter {
    fn record(&self, event: UsageEvent) {
        {
            let mut events = self.events.lock().unwrap();
            events.push_back(event);
            trim(&mut events);
        }
        self.mark_dirty();
    }
}

fn trim(events: &mut VecDeque<UsageEvent>) {
    while events.len() > constants::MAX_EVENTS {
        events.pop_front();
    }
}

fn filter_matches(event: &UsageEvent, filter: &UsageFilter) -> bool {
    if let Some(domain) = &filter.domain {
        if &event.domain != domain {
            return false;
        }
    }
    if let Some(tier) = filter.tier {
        if event.final_tier != Some(tier) {
            return false;
        }
    }
    if let Some(tenant_id) = &filter.tenant_id {
        if event.tenant_id.as_deref() != Some(tenant_id.as_str()) {
            return false;
        }
    }
    true
}

fn in_range(ts_ms: i64, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    let ts = DateTime::<Utc>::from_timestamp_millis(ts_ms).unwrap_or_else(Utc::now);
    if let Some(start) = start {
        if ts < start {
            return false;
        }
    }
    if let Some(end) = end {
        if ts >= end {
            return false;
        }
    }
    true
}

fn aggregate(events: &[&UsageEvent], start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> PeriodAggregate {
    let windowed: Vec<&&UsageEvent> = events.iter().filter(|e| in_range(e.timestamp_ms, start, end)).collect();

    let count = windowed.len() as u64;
    let success = windowed.iter().filter(|e| e.success).count() as u64;
    let cost: u64 = windowed.iter().map(|e| e.cost_units as u64).sum();
    let fell_back = windowed.iter().filter(|e| e.fell_back).count();
    let total_duration: u64 = windowed.iter().map(|e| e.duration_ms).sum();

    let mut by_tier: HashMap<Tier, u64> = HashMap::new();
    let mut cost_by_domain: HashMap<String, u64> = HashMap::new();
    let mut requests_by_domain: HashMap<String, u64> = HashMap::new();

    for event in &windowed {
        if let Some(tier) = event.final_tier {
            *by_tier.entry(tier).or_insert(0) += 1;
        }
        *cost_by_domain.entry(event.domain.clone()).or_insert(0) += event.cost_units as u64;
        *requests_by_domain.entry(event.domain.clone()).or_insert(0) += 1;
    }

    PeriodAggregate {
        count,
        success,
        cost,
        by_tier,
        top_domains_by_cost: top_n(cost_by_domain),
        top_domains_by_requests: top_n(requests_by_domain),
        avg_duration_ms: if count > 0 { total_duration as f64 / count as f64 } else { 0.0 },
        fallback_rate: if count > 0 { fell_back as f64 / count as f64 } else { 0.0 },
    }
}

fn top_n(counts: HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(TOP_N);
    entries
}

fn trend(current: f64, previous: f64) -> Option<f64> {
    if previous > 0.0 {
        Some((current - previous) / previous)
    } else {
        None
    }
}

fn period_start(period: Period, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match period {
        Period::Hour => now.date_naive().and_hms_opt(now.hour(), 0, 0).map(|n| n.and_utc()),
        Period::Day => now.date_naive().and_hms_opt(0, 0, 0).map(|n| n.and_utc()),
        Period::Week => {
            let days_since_sunday = now.weekday().num_days_from_sunday() as i64;
            let start_date = now.date_naive() - Duration::days(days_since_sunday);
            start_date.and_hms_opt(0, 0, 0).map(|n| n.and_utc())
        }
        Period::Month => NaiveDate::from_ymd_opt(now.year(), now.month(), 1).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc()),
        Period::All => None,
    }
}

fn previous_period_bounds(period: Period, current_start: Option<DateTime<Utc>>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let current_start = current_start?;
    match period {
        Period::Hour => Some((current_start - Duration::hours(1), current_start)),
        Period::Day => Some((current_start - Duration::days(1), current_start)),
        Period::Week => Some((current_start - Duration::weeks(1), current_start)),
        Period::Month => {
            let naive = current_start.date_naive();
            let (prev_year, prev_month) = if naive.month() == 1 { (naive.year() - 1, 12) } else { (naive.year(), naive.month() - 1) };
            let prev_start = NaiveDate::from_ymd_opt(prev_year, prev_month, 1)?.and_hms_opt(0, 0, 0)?.and_utc();
            Some((prev_start, current_start))
        }
        Period::All => None,
    }
}

/// Steps one `granularity`-sized bucket back from `boundary`, matching
/// `previous_period_bounds`'s calendar-aware handling of months.
fn step_back(granularity: Period, boundary: DateTime<Utc>) -> DateTime<Utc> {
    match previous_period_bounds(granularity, Some(boundary)) {
        Some((start, _)) => start,
        None => boundary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webcascade_core::generate_usage_event_id;

    fn sample_event(now_ms: i64, domain: &str, tier: Tier, cost: u32) -> UsageEvent {
        UsageEvent {
            id: generate_usage_event_id(now_ms),
            timestamp_ms: now_ms,
            domain: domain.to_string(),
            url: format!("https://{domain}/"),
            final_tier: Some(tier),
            success: true,
            duration_ms: 100,
            tiers_attempted: vec![tier],
            fell_back: false,
            tenant_id: None,
            cost_units: cost,
        }
    }

    #[test]
    fn ring_trims_oldest_events_past_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let meter = UsageMeter::new(dir.path());
        for i in 0..(constants::MAX_EVENTS + 10) {
            meter.record(sample_event(i as i64, "example.com", Tier::Intelligence, 1));
        }
        assert_eq!(meter.events.lock().unwrap().len(), constants::MAX_EVENTS);
    }

    #[test]
    fn summary_computes_trend_between_adjacent_hours() {
        let dir = tempfile::tempdir().unwrap();
        let meter = UsageMeter::new(dir.path());
        let now = Utc::now();
        let hour_start = period_start(Period::Hour, now).unwrap();
        let prev_hour = hour_start - Duration::hours(1) + Duration::minutes(5);

        for _ in 0..2 {
            meter.record(sample_event(prev_hour.timestamp_millis(), "a.example", Tier::Intelligence, 1));
        }
        for _ in 0..4 {
            meter.record(sample_event(now.timestamp_millis(), "a.example", Tier::Intelligence, 1));
        }

        let summary = meter.summary(&UsageFilter::default(), Period::Hour, now);
        assert_eq!(summary.current.count, 4);
        assert_eq!(summary.previous.count, 2);
        assert_eq!(summary.request_trend, Some(1.0));
    }

    #[test]
    fn all_time_previous_has_no_trend() {
        let dir = tempfile::tempdir().unwrap();
        let meter = UsageMeter::new(dir.path());
        let now = Utc::now();
        meter.record(sample_event(now.timestamp_millis(), "a.example", Tier::Intelligence, 1));
        let summary = meter.summary(&UsageFilter::default(), Period::All, now);
        assert_eq!(summary.cost_trend, None);
        assert_eq!(summary.request_trend, None);
    }

    #[test]
    fn flush_persists_and_clears_dirty_flag() {
        let dir = tempfile::tempdir().unwrap();
        let meter = UsageMeter::new(dir.path());
        meter.record(sample_event(Utc::now().timestamp_millis(), "x.example", Tier::Intelligence, 1));
        meter.flush();
        assert!(dir.path().join("usage.json").exists());
        assert!(meter.dirty_since.lock().unwrap().is_none());
    }
}
