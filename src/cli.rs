use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "webcascade", about = "Adaptive tier-cascade web fetcher")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a single URL through the tier cascade
    Fetch {
        url: String,

        /// Force a specific tier instead of running the cascade
        #[arg(long)]
        tier: Option<String>,

        /// Overall timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Skip the content validator
        #[arg(long)]
        no_validate: bool,
    },
    /// Fetch many URLs with bounded concurrency
    Batch {
        /// URLs to fetch, or a path to a newline-delimited file
        #[arg(short, long)]
        urls: Option<String>,

        /// Path to a file of newline-delimited URLs
        #[arg(short, long)]
        file: Option<String>,

        #[arg(short, long)]
        concurrency: Option<usize>,

        #[arg(long)]
        per_url_timeout_ms: Option<u64>,

        #[arg(long)]
        total_timeout_ms: Option<u64>,

        #[arg(long)]
        stop_on_error: bool,
    },
    /// Print usage, performance, and pattern-health statistics
    Stats {
        #[arg(long)]
        domain: Option<String>,
    },
    /// Track a URL's content for future change detection
    Track {
        url: String,

        /// Read content from a file instead of fetching it
        #[arg(long)]
        content_file: Option<String>,

        #[arg(long)]
        label: Option<String>,

        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Check a tracked URL for content changes
    Check {
        url: String,

        /// Read new content from a file instead of fetching it
        #[arg(long)]
        content_file: Option<String>,
    },
}
