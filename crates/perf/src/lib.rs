//! Performance Tracker (spec §4.3): percentile statistics over a
//! fixed-capacity reservoir per `(domain, tier)` bucket. Process-local,
//! never persisted.

use std::collections::HashMap;
use std::sync::Mutex;

use dashmap::DashMap;
use rand::Rng;
use webcascade_core::config::constants;
use webcascade_core::{ComponentTiming, PerfSink, Tier};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PercentileStats {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct TierPerformance {
    pub tier: Tier,
    pub stats: PercentileStats,
}

#[derive(Debug, Clone)]
pub struct DomainPerformance {
    pub domain: String,
    pub per_tier: Vec<TierPerformance>,
    pub overall: PercentileStats,
}

#[derive(Debug, Clone)]
pub struct DomainAverage {
    pub domain: String,
    pub avg_ms: f64,
}

#[derive(Debug, Clone)]
pub struct SystemPerformance {
    pub overall: PercentileStats,
    pub fastest_domains: Vec<DomainAverage>,
    pub slowest_domains: Vec<DomainAverage>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentBreakdown {
    pub network_ms: f64,
    pub parsing_ms: f64,
    pub js_execution_ms: f64,
    pub extraction_ms: f64,
}

struct Bucket {
    /// `(duration_ms, success)` reservoir sample.
    reservoir: Vec<(u64, bool)>,
    seen: u64,
    sum_duration_ms: u64,
    count: u64,
    success_count: u64,
}

impl Bucket {
    fn new() -> Self {
        Self { reservoir: Vec::new(), seen: 0, sum_duration_ms: 0, count: 0, success_count: 0 }
    }

    fn push(&mut self, duration_ms: u64, success: bool, capacity: usize) {
        self.count += 1;
        self.sum_duration_ms += duration_ms;
        if success {
            self.success_count += 1;
        }

        let index = self.seen;
        self.seen += 1;
        if (index as usize) < capacity {
            self.reservoir.push((duration_ms, success));
        } else {
            let mut rng = rand::thread_rng();
            let j = rng.gen_range(0..=index) as usize;
            if j < capacity {
                self.reservoir[j] = (duration_ms, success);
            }
        }
    }
}

#[derive(Default)]
struct ComponentTotals {
    network_sum: u64,
    parsing_sum: u64,
    js_sum: u64,
    extraction_sum: u64,
    samples: u64,
}

pub struct PerformanceTracker {
    buckets: DashMap<(String, Tier), Bucket>,
    component_totals: Mutex<ComponentTotals>,
    reservoir_capacity: usize,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new(constants::RESERVOIR_CAPACITY)
    }
}

impl PerformanceTracker {
    pub fn new(reservoir_capacity: usize) -> Self {
        Self { buckets: DashMap::new(), component_totals: Mutex::new(ComponentTotals::default()), reservoir_capacity }
    }

    /// Process-local only; `flush()` exists to satisfy the store interface
    /// uniformly (spec §4.3 "No persistence").
    pub fn flush(&self) {}

    pub fn get_domain_performance(&self, domain: &str) -> DomainPerformance {
        let mut per_tier = Vec::new();
        let mut union: Vec<(u64, bool)> = Vec::new();
        let mut sum = 0u64;
        let mut count = 0u64;

        for entry in self.buckets.iter() {
            let (bucket_domain, tier) = entry.key();
            if bucket_domain != domain {
                continue;
            }
            let bucket = entry.value();
            union.extend(bucket.reservoir.iter().copied());
            sum += bucket.sum_duration_ms;
            count += bucket.count;
            per_tier.push(TierPerformance { tier: *tier, stats: stats_from(&bucket.reservoir, bucket.sum_duration_ms, bucket.count) });
        }

        DomainPerformance { domain: domain.to_string(), per_tier, overall: stats_from(&union, sum, count) }
    }

    pub fn get_system_performance(&self, top_n: usize) -> SystemPerformance {
        let mut union: Vec<(u64, bool)> = Vec::new();
        let mut overall_sum = 0u64;
        let mut overall_count = 0u64;
        let mut per_domain: HashMap<String, (u64, u64)> = HashMap::new();

        for entry in self.buckets.iter() {
            let (domain, _tier) = entry.key();
            let bucket = entry.value();
            union.extend(bucket.reservoir.iter().copied());
            overall_sum += bucket.sum_duration_ms;
            overall_count += bucket.count;
            let agg = per_domain.entry(domain.clone()).or_insert((0, 0));
            agg.0 += bucket.sum_duration_ms;
            agg.1 += bucket.count;
        }

        let mut averages: Vec<DomainAverage> = per_domain
            .into_iter()
            .filter(|(_, (_, count))| *count > 0)
            .map(|(domain, (sum, count))| DomainAverage { domain, avg_ms: sum as f64 / count as f64 })
            .collect();

        averages.sort_by(|a, b| a.avg_ms.partial_cmp(&b.avg_ms).unwrap());
        let fastest_domains = averages.iter().take(top_n).cloned().collect();
        averages.reverse();
        let slowest_domains = averages.into_iter().take(top_n).collect();

        SystemPerformance { overall: stats_from(&union, overall_sum, overall_count), fastest_domains, slowest_domains }
    }

    pub fn get_component_breakdown(&self) -> ComponentBreakdown {
        let totals = self.component_totals.lock().unwrap();
        if totals.samples == 0 {
            return ComponentBreakdown::default();
        }
        let n = totals.samples as f64;
        ComponentBreakdown {
            network_ms: totals.network_sum as f64 / n,
            parsing_ms: totals.parsing_sum as f64 / n,
            js_execution_ms: totals.js_sum as f64 / n,
            extraction_ms: totals.extraction_sum as f64 / n,
        }
    }
}

impl PerfSink for PerformanceTracker {
    fn record(&self, domain: &str, tier: Tier, success: bool, duration_ms: u64, component: Option<ComponentTiming>) {
        self.buckets
            .entry((domain.to_string(), tier))
            .or_insert_with(Bucket::new)
            .push(duration_ms, success, self.reservoir_capacity);

        if let Some(c) = component {
            let mut totals = self.component_totals.lock().unwrap();
            totals.network_sum += c.network_ms;
            totals.parsing_sum += c.parsing_ms;
            totals.js_sum += c.js_execution_ms;
            totals.extraction_sum += c.extraction_ms;
            totals.samples += 1;
        }
    }
}

/// Percentiles are computed by sorting the reservoir on demand (spec
/// §4.3); `avg`/`count` come from the running sums, not the sample.
fn stats_from(reservoir: &[(u64, bool)], sum_duration_ms: u64, count: u64) -> PercentileStats {
    if count == 0 {
        return PercentileStats::default();
    }
    let mut durations: Vec<u64> = reservoir.iter().map(|(d, _)| *d).collect();
    durations.sort_unstable();

    let percentile = |p: f64| -> f64 {
        if durations.is_empty() {
            return 0.0;
        }
        let rank = ((p * durations.len() as f64).ceil() as usize).clamp(1, durations.len());
        durations[rank - 1] as f64
    };

    PercentileStats {
        p50: percentile(0.50),
        p95: percentile(0.95),
        p99: percentile(0.99),
        min: durations.first().copied().unwrap_or(0),
        max: durations.last().copied().unwrap_or(0),
        avg: sum_duration_ms as f64 / count as f64,
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reports_average_and_count() {
        let tracker = PerformanceTracker::new(1024);
        tracker.record("example.com", Tier::Intelligence, true, 100, None);
        tracker.record("example.com", Tier::Intelligence, true, 200, None);
        let perf = tracker.get_domain_performance("example.com");
        assert_eq!(perf.overall.count, 2);
        assert_eq!(perf.overall.avg, 150.0);
    }

    #[test]
    fn reservoir_never_exceeds_capacity() {
        let tracker = PerformanceTracker::new(8);
        for i in 0..1000u64 {
            tracker.record("high-volume.example", Tier::Intelligence, true, i, None);
        }
        let perf = tracker.get_domain_performance("high-volume.example");
        assert_eq!(perf.overall.count, 1000);
        assert!(perf.per_tier[0].stats.count == 1000);
        let bucket_len = tracker.buckets.get(&("high-volume.example".to_string(), Tier::Intelligence)).unwrap().reservoir.len();
        assert_eq!(bucket_len, 8);
    }

    #[test]
    fn component_breakdown_averages_across_recorded_samples() {
        let tracker = PerformanceTracker::new(1024);
        tracker.record(
            "example.com",
            Tier::Intelligence,
            true,
            100,
            Some(ComponentTiming { network_ms: 40, parsing_ms: 20, js_execution_ms: 0, extraction_ms: 10 }),
        );
        let breakdown = tracker.get_component_breakdown();
        assert_eq!(breakdown.network_ms, 40.0);
        assert_eq!(breakdown.parsing_ms, 20.0);
    }

    #[test]
    fn system_performance_ranks_domains_by_average() {
        let tracker = PerformanceTracker::new(1024);
        tracker.record("fast.example", Tier::Intelligence, true, 10, None);
        tracker.record("slow.example", Tier::Intelligence, true, 900, None);
        let system = tracker.get_system_performance(1);
        assert_eq!(system.fastest_domains[0].domain, "fast.example");
        assert_eq!(system.slowest_domains[0].domain, "slow.example");
    }
}
