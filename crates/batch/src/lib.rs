//! Batch Orchestrator (spec §4.5): bounded-concurrency fan-out over
//! [`webcascade_fetcher::Fetcher`]. Tasks are spawned eagerly and gated by a
//! counting semaphore, grounded on `foofork-riptidecrawler`'s
//! `pipeline::execute_batch` (`Semaphore` + per-URL `tokio::spawn`), adapted
//! here for order-preserving results and the total/per-URL deadline rules.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Semaphore;
use tracing::warn;

use webcascade_core::config::constants;
use webcascade_core::ssrf::{self, UrlCheck};
use webcascade_core::{FetchOptions, FetchResult};
use webcascade_fetcher::Fetcher;

static RATE_LIMIT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)rate[ -]?limit|429").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Success,
    Error,
    RateLimited,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub index: usize,
    pub url: String,
    pub status: BatchStatus,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub payload: Option<FetchResult>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency: usize,
    pub per_url_timeout_ms: Option<u64>,
    pub total_timeout_ms: Option<u64>,
    pub stop_on_error: bool,
    pub continue_on_rate_limit: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: constants::DEFAULT_BATCH_CONCURRENCY,
            per_url_timeout_ms: None,
            total_timeout_ms: None,
            stop_on_error: false,
            continue_on_rate_limit: true,
        }
    }
}

pub struct BatchOrchestrator {
    fetcher: Arc<Fetcher>,
}

impl BatchOrchestrator {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn batch_browse(&self, urls: &[String], browse_options: FetchOptions, batch_options: BatchOptions) -> Vec<BatchResult> {
        let semaphore = Arc::new(Semaphore::new(batch_options.concurrency.max(1)));
        let stopped = Arc::new(AtomicBool::new(false));
        let deadline = batch_options.total_timeout_ms.map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

        let mut handles = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let stopped = stopped.clone();
            let fetcher = self.fetcher.clone();
            let mut options = browse_options.clone();
            if let Some(per_url_timeout_ms) = batch_options.per_url_timeout_ms {
                options.timeout_ms.get_or_insert(per_url_timeout_ms);
            }
            let stop_on_error = batch_options.stop_on_error;
            let continue_on_rate_limit = batch_options.continue_on_rate_limit;

            handles.push(tokio::spawn(async move {
                let started = tokio::time::Instant::now();

                let permit = acquire_or_deadline(&semaphore, deadline).await;
                let Some(_permit) = permit else {
                    return skipped(index, &url, "Batch stopped due to timeout", started.elapsed());
                };

                if stopped.load(Ordering::Acquire) {
                    return skipped(index, &url, "Batch stopped due to previous error", started.elapsed());
                }

                if let UrlCheck::Blocked(reason) = ssrf::check_url(&url) {
                    warn!(url = %url, ?reason, "batch rejected url before invoking fetcher");
                    let result = error_result(index, &url, "INVALID_URL", "rejected by ssrf/scheme validation".to_string(), started.elapsed());
                    if stop_on_error {
                        stopped.store(true, Ordering::Release);
                    }
                    return result;
                }

                let result = match fetcher.fetch(&url, &options).await {
                    Ok(payload) => success_result(index, &url, payload, started.elapsed()),
                    Err(err) => {
                        let is_rate_limited = RATE_LIMIT_PATTERN.is_match(&err.message);
                        if is_rate_limited && continue_on_rate_limit {
                            rate_limited_result(index, &url, err.message, started.elapsed())
                        } else {
                            error_result(index, &url, "BROWSE_ERROR", err.message, started.elapsed())
                        }
                    }
                };

                if !matches!(result.status, BatchStatus::Success) && stop_on_error {
                    stopped.store(true, Ordering::Release);
                }
                result
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (index, (url, handle)) in urls.iter().zip(handles).enumerate() {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => error_result(index, url, "BROWSE_ERROR", format!("task panicked: {e}"), Duration::ZERO),
            };
            results.push(result);
        }
        results
    }
}

async fn acquire_or_deadline(semaphore: &Arc<Semaphore>, deadline: Option<tokio::time::Instant>) -> Option<tokio::sync::OwnedSemaphorePermit> {
    if let Some(at) = deadline {
        if tokio::time::Instant::now() >= at {
            return None;
        }
    }

    let acquire = semaphore.clone().acquire_owned();
    tokio::pin!(acquire);
    let wait = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(wait);

    tokio::select! {
        biased;
        permit = &mut acquire => permit.ok(),
        _ = &mut wait => None,
    }
}

fn success_result(index: usize, url: &str, payload: FetchResult, duration: Duration) -> BatchResult {
    BatchResult {
        index,
        url: url.to_string(),
        status: BatchStatus::Success,
        error: None,
        error_code: None,
        payload: Some(payload),
        duration_ms: duration.as_millis() as u64,
    }
}

fn error_result(index: usize, url: &str, error_code: &str, error: String, duration: Duration) -> BatchResult {
    BatchResult {
        index,
        url: url.to_string(),
        status: BatchStatus::Error,
        error: Some(error),
        error_code: Some(error_code.to_string()),
        payload: None,
        duration_ms: duration.as_millis() as u64,
    }
}

fn rate_limited_result(index: usize, url: &str, error: String, duration: Duration) -> BatchResult {
    BatchResult {
        index,
        url: url.to_string(),
        status: BatchStatus::RateLimited,
        error: Some(error),
        error_code: Some("RATE_LIMITED".to_string()),
        payload: None,
        duration_ms: duration.as_millis() as u64,
    }
}

fn skipped(index: usize, url: &str, reason: &str, duration: Duration) -> BatchResult {
    BatchResult {
        index,
        url: url.to_string(),
        status: BatchStatus::Skipped,
        error: Some(reason.to_string()),
        error_code: None,
        payload: None,
        duration_ms: duration.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use webcascade_core::sinks::noop::{NullLearningSink, NullPerfSink, NullUsageSink};
    use webcascade_fetcher::FetcherConfig;

    fn test_fetcher() -> Arc<Fetcher> {
        Arc::new(
            Fetcher::without_playwright(
                FetcherConfig::default(),
                Arc::new(NullLearningSink),
                Arc::new(NullPerfSink),
                Arc::new(NullUsageSink),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn invalid_urls_are_rejected_without_invoking_the_fetcher() {
        let orchestrator = BatchOrchestrator::new(test_fetcher());
        let urls = vec!["http://192.168.1.1/".to_string(), "file:///etc/passwd".to_string()];
        let results = orchestrator.batch_browse(&urls, FetchOptions::default(), BatchOptions::default()).await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.status, BatchStatus::Error);
            assert_eq!(result.error_code.as_deref(), Some("INVALID_URL"));
        }
    }

    #[tokio::test]
    async fn results_preserve_input_order_by_index() {
        let orchestrator = BatchOrchestrator::new(test_fetcher());
        let urls = vec!["http://10.0.0.1/".to_string(), "http://10.0.0.2/".to_string(), "http://10.0.0.3/".to_string()];
        let results = orchestrator.batch_browse(&urls, FetchOptions::default(), BatchOptions::default()).await;

        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.index, i);
        }
    }

    #[tokio::test]
    async fn zero_total_timeout_skips_every_url() {
        let orchestrator = BatchOrchestrator::new(test_fetcher());
        let urls = vec!["http://10.0.0.1/".to_string()];
        let batch_options = BatchOptions { total_timeout_ms: Some(0), ..Default::default() };
        let results = orchestrator.batch_browse(&urls, FetchOptions::default(), batch_options).await;

        assert_eq!(results[0].status, BatchStatus::Skipped);
        assert_eq!(results[0].error.as_deref(), Some("Batch stopped due to timeout"));
    }
}
