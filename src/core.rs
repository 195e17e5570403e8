//! `Core` aggregate (spec §9's anti-singleton redesign flag): one instance
//! of every store, constructed once by the binary and passed by reference
//! into the cascade and batch orchestrator. Nothing here is global state —
//! tests build their own `Core` against a scratch data directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use webcascade_core::config::AppConfig;
use webcascade_content::ContentTracker;
use webcascade_fetcher::{Fetcher, FetcherConfig};
use webcascade_health::HealthTracker;
use webcascade_learning::LearningStore;
use webcascade_perf::PerformanceTracker;
use webcascade_usage::UsageMeter;

use webcascade_batch::BatchOrchestrator;

pub struct Core {
    pub learning: Arc<LearningStore>,
    pub usage: Arc<UsageMeter>,
    pub perf: Arc<PerformanceTracker>,
    pub health: Arc<HealthTracker>,
    pub content: Arc<ContentTracker>,
    pub fetcher: Arc<Fetcher>,
    pub batch: BatchOrchestrator,
}

impl Core {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let data_dir = Path::new(&config.general.data_dir);
        std::fs::create_dir_all(data_dir)?;

        let learning = Arc::new(LearningStore::new(data_dir));
        let usage = Arc::new(UsageMeter::new(data_dir));
        let perf = Arc::new(PerformanceTracker::default());
        let health = Arc::new(HealthTracker::new(config.health.clone()));
        let content = Arc::new(ContentTracker::new(data_dir, config.change.clone()));

        let fetcher_config = FetcherConfig {
            user_agent: config.general.user_agent.clone(),
            max_redirects: config.general.max_redirects,
            playwright_available: config.general.playwright_available,
            default_timeout_ms: config.batch.default_per_url_timeout_ms,
            default_per_tier_timeout_ms: config.batch.default_per_url_timeout_ms,
            script_budget_ms: webcascade_core::config::constants::LIGHTWEIGHT_SCRIPT_BUDGET_MS,
            validator_overrides: Default::default(),
        };
        let fetcher = Arc::new(Fetcher::without_playwright(
            fetcher_config,
            learning.clone(),
            perf.clone(),
            usage.clone(),
        )?);
        let batch = BatchOrchestrator::new(fetcher.clone());

        Ok(Self { learning, usage, perf, health, content, fetcher, batch })
    }

    /// Drain every store's pending debounced save and block until durable
    /// (spec §5 `flush()` contract, applied uniformly across stores).
    pub fn flush_all(&self) {
        self.learning.flush();
        self.usage.flush();
        self.content.flush();
        self.health.flush();
        self.perf.flush();
    }

    /// Background persistence tick (spec §4.2/§4.4/§4.7: debounced ≥5s
    /// after the last mutation). Runs until the process exits; `main`
    /// spawns this once at startup rather than giving each store its own
    /// timer task.
    pub async fn run_persistence_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            self.learning.maybe_persist();
            self.usage.maybe_persist();
            self.content.maybe_persist();
        }
    }
}
