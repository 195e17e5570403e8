//! The three recording collaborators the Tier Cascade fires into after every
//! attempt (spec §4.1 "Recording per fetch"). Defined here, rather than on
//! the concrete store crates, so `webcascade-fetcher` depends only on
//! `webcascade-core` — the stores are wired in by the binary crate's `Core`
//! aggregate (spec §9's anti-singleton redesign), never by the fetcher
//! reaching into a sibling crate directly.
//!
//! All methods are synchronous: recording is fire-and-forget and must never
//! make a fetch wait on store IO (spec §4.1, §7 "Store write failures are
//! logged but never surface").

use crate::error::AttemptFailure;
use crate::types::{ComponentTiming, DomainPreference, Tier, UsageEvent};

pub trait LearningSink: Send + Sync {
    fn preference(&self, domain: &str) -> Option<DomainPreference>;
    fn record_success(&self, domain: &str, tier: Tier, duration_ms: u64, content_length: usize);
    fn record_failure(&self, domain: &str, tier: Tier, failure: &AttemptFailure);
}

pub trait PerfSink: Send + Sync {
    fn record(&self, domain: &str, tier: Tier, success: bool, duration_ms: u64, component: Option<ComponentTiming>);
}

pub trait UsageSink: Send + Sync {
    fn record(&self, event: UsageEvent);
}

/// No-op implementations used by tests that exercise the cascade without a
/// wired-up store.
pub mod noop {
    use super::*;

    pub struct NullLearningSink;
    impl LearningSink for NullLearningSink {
        fn preference(&self, _domain: &str) -> Option<DomainPreference> {
            None
        }
        fn record_success(&self, _domain: &str, _tier: Tier, _duration_ms: u64, _content_length: usize) {}
        fn record_failure(&self, _domain: &str, _tier: Tier, _failure: &AttemptFailure) {}
    }

    pub struct NullPerfSink;
    impl PerfSink for NullPerfSink {
        fn record(&self, _domain: &str, _tier: Tier, _success: bool, _duration_ms: u64, _component: Option<ComponentTiming>) {}
    }

    pub struct NullUsageSink;
    impl UsageSink for NullUsageSink {
        fn record(&self, _event: UsageEvent) {}
    }
}
