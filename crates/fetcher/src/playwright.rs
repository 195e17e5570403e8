//! The playwright tier's external collaborator contract (spec §4.1:
//! "Delegates to an external headless-browser adapter"). No real-browser
//! implementation ships here — the environment assumption (spec §6) is
//! that the adapter is an optional plug; this crate supplies the trait and
//! a null adapter that always reports unavailable.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct PlaywrightOptions {
    pub navigation_timeout_ms: u64,
    pub session_profile: Option<String>,
}

impl Default for PlaywrightOptions {
    fn default() -> Self {
        Self { navigation_timeout_ms: 30_000, session_profile: None }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkRequest {
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    pub response_body_fragment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlaywrightRender {
    pub final_url: String,
    pub html: String,
    pub network_requests: Vec<NetworkRequest>,
    pub console_messages: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PlaywrightError {
    #[error("navigation timed out after {0}ms")]
    Timeout(u64),
    #[error("playwright adapter unavailable")]
    Unavailable,
    #[error("{0}")]
    Other(String),
}

/// §4.1's "external headless-browser adapter" collaborator.
#[async_trait]
pub trait PlaywrightAdapter: Send + Sync {
    async fn render(&self, url: &str, opts: &PlaywrightOptions) -> Result<PlaywrightRender, PlaywrightError>;
}

/// Ships by default; the environment has no bundled browser. Any request
/// that would escalate past lightweight surfaces `VALIDATION` with reason
/// `playwright_unavailable` (spec §6).
pub struct NullPlaywrightAdapter;

#[async_trait]
impl PlaywrightAdapter for NullPlaywrightAdapter {
    async fn render(&self, _url: &str, _opts: &PlaywrightOptions) -> Result<PlaywrightRender, PlaywrightError> {
        Err(PlaywrightError::Unavailable)
    }
}
