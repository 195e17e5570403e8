pub mod config;
pub mod error;
pub mod ids;
pub mod persist;
pub mod sinks;
pub mod ssrf;
pub mod types;

pub use config::AppConfig;
pub use error::{AttemptFailure, CascadeError, ErrorKind};
pub use ids::generate_usage_event_id;
pub use sinks::{LearningSink, PerfSink, UsageSink};
pub use types::{
    ComponentTiming, DiscoveredApi, DomainPreference, FetchMetadata, FetchOptions, FetchResult,
    LearningAnnotations, RenderedContent, Tier, TierAttempt, UsageEvent,
};
