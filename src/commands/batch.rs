use anyhow::{bail, Result};
use webcascade_batch::{BatchOptions, BatchStatus};
use webcascade_core::FetchOptions;

use crate::core::Core;

fn collect_urls(urls: Option<String>, file: Option<String>) -> Result<Vec<String>> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)?;
        return Ok(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect());
    }
    if let Some(csv) = urls {
        return Ok(csv.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect());
    }
    bail!("provide --urls or --file")
}

pub async fn run(
    core: &Core,
    urls: Option<String>,
    file: Option<String>,
    concurrency: Option<usize>,
    per_url_timeout_ms: Option<u64>,
    total_timeout_ms: Option<u64>,
    stop_on_error: bool,
) -> Result<()> {
    let urls = collect_urls(urls, file)?;

    let batch_options = BatchOptions {
        concurrency: concurrency.unwrap_or(webcascade_core::config::constants::DEFAULT_BATCH_CONCURRENCY),
        per_url_timeout_ms,
        total_timeout_ms,
        stop_on_error,
        continue_on_rate_limit: true,
    };

    let results = core.batch.batch_browse(&urls, FetchOptions::default(), batch_options).await;

    for result in &results {
        let status = match result.status {
            BatchStatus::Success => "success",
            BatchStatus::Error => "error",
            BatchStatus::RateLimited => "rate_limited",
            BatchStatus::Skipped => "skipped",
        };
        println!(
            "[{:>3}] {:<12} {:>6}ms  {}{}",
            result.index,
            status,
            result.duration_ms,
            result.url,
            result.error.as_ref().map(|e| format!("  ({e})")).unwrap_or_default(),
        );
    }

    let succeeded = results.iter().filter(|r| r.status == BatchStatus::Success).count();
    println!("\n{succeeded}/{} succeeded", results.len());

    Ok(())
}
