use anyhow::Result;
use chrono::Utc;
use webcascade_usage::{Period, UsageFilter};

use crate::core::Core;

pub async fn run(core: &Core, domain: Option<String>) -> Result<()> {
    let now = Utc::now();

    if let Some(domain) = &domain {
        let perf = core.perf.get_domain_performance(domain);
        println!("=== performance for {domain} ===");
        println!(
            "overall: p50={} p95={} p99={} avg={:.1} count={}",
            perf.overall.p50, perf.overall.p95, perf.overall.p99, perf.overall.avg, perf.overall.count
        );
        for tier in &perf.per_tier {
            println!(
                "  {}: p50={} p95={} avg={:.1} count={}",
                tier.tier, tier.stats.p50, tier.stats.p95, tier.stats.avg, tier.stats.count
            );
        }

        let filter = UsageFilter { domain: Some(domain.clone()), ..Default::default() };
        let summary = core.usage.summary(&filter, Period::Day, now);
        println!("\n=== usage (today) for {domain} ===");
        println!("requests={} cost={} success_rate={:.2}", summary.current.count, summary.current.cost, summary.success_rate);
    } else {
        let system = core.perf.get_system_performance(5);
        println!("=== system performance ===");
        println!(
            "overall: p50={} p95={} p99={} avg={:.1} count={}",
            system.overall.p50, system.overall.p95, system.overall.p99, system.overall.avg, system.overall.count
        );
        println!("fastest domains:");
        for d in &system.fastest_domains {
            println!("  {} avg={:.1}ms", d.domain, d.avg_ms);
        }
        println!("slowest domains:");
        for d in &system.slowest_domains {
            println!("  {} avg={:.1}ms", d.domain, d.avg_ms);
        }

        let summary = core.usage.summary(&UsageFilter::default(), Period::Day, now);
        println!("\n=== usage (today) ===");
        println!(
            "requests={} cost={} success_rate={:.2} fallback_rate={:.2}",
            summary.current.count, summary.current.cost, summary.success_rate, summary.current.fallback_rate
        );
        if let Some(trend) = summary.request_trend {
            println!("request_trend vs yesterday: {:+.1}%", trend * 100.0);
        }
    }

    let unhealthy = core.health.get_unhealthy_patterns();
    if !unhealthy.is_empty() {
        println!("\n=== unhealthy patterns ===");
        for pattern in &unhealthy {
            println!(
                "  {} {} status={:?} success_rate={:.2} consecutive_failures={}",
                pattern.domain, pattern.endpoint, pattern.status, pattern.success_rate, pattern.consecutive_failures
            );
        }
    }

    Ok(())
}
