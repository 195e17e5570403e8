//! Tier Cascade & Fetcher (spec §4.1): the cheapest tier that yields
//! validated content wins; store recording is fire-and-forget.

pub mod cascade;
pub mod error;
pub mod playwright;
pub mod render;
pub mod sandbox;
pub mod tiers;
pub mod validator;

pub use cascade::{Fetcher, FetcherConfig};
pub use error::FetchError;
pub use playwright::{NullPlaywrightAdapter, PlaywrightAdapter, PlaywrightOptions, PlaywrightRender};
pub use validator::ValidatorOverride;

#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use webcascade_core::sinks::noop::{NullLearningSink, NullPerfSink, NullUsageSink};
    use webcascade_core::FetchOptions;

    use super::*;

    #[test]
    fn fetcher_rejects_private_ip_before_constructing_client() {
        let fetcher = Fetcher::without_playwright(
            FetcherConfig::default(),
            Arc::new(NullLearningSink),
            Arc::new(NullPerfSink),
            Arc::new(NullUsageSink),
        )
        .unwrap();

        let result = tokio_test_block_on(fetcher.fetch("http://192.168.1.1/", &FetchOptions::default()));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind, webcascade_core::ErrorKind::InvalidUrl);
    }

    // Minimal single-threaded executor so this module doesn't need to pull
    // in `#[tokio::test]` macro plumbing just to drive one `async fn`.
    fn tokio_test_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(fut)
    }
}
