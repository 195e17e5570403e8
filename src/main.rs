mod cli;
mod commands;
mod core;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use webcascade_core::config::AppConfig;

use crate::cli::{Cli, Commands};
use crate::core::Core;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using bundled defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;

    if let Ok(dir) = std::env::var("WEBCASCADE_DATA_DIR") {
        config.general.data_dir = dir;
    }
    if let Ok(v) = std::env::var("WEBCASCADE_CONCURRENCY") {
        if let Ok(n) = v.parse::<usize>() {
            if n > 0 {
                config.batch.default_concurrency = n;
            }
        }
    }

    let core = Arc::new(Core::new(&config)?);
    tokio::spawn(core.clone().run_persistence_loop());

    let result = match cli.command {
        Commands::Fetch { url, tier, timeout_ms, no_validate } => commands::fetch::run(&core, url, tier, timeout_ms, no_validate).await,
        Commands::Batch { urls, file, concurrency, per_url_timeout_ms, total_timeout_ms, stop_on_error } => {
            commands::batch::run(&core, urls, file, concurrency, per_url_timeout_ms, total_timeout_ms, stop_on_error).await
        }
        Commands::Stats { domain } => commands::stats::run(&core, domain).await,
        Commands::Track { url, content_file, label, tags } => commands::track::run(&core, url, content_file, label, tags).await,
        Commands::Check { url, content_file } => commands::check::run(&core, url, content_file).await,
    };

    core.flush_all();
    result
}
