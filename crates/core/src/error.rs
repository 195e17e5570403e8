use thiserror::Error;

/// The eight surface-level error kinds a caller can observe (spec §6/§7).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("invalid url")]
    InvalidUrl,
    #[error("network error")]
    Network,
    #[error("timeout")]
    Timeout,
    #[error("bot challenge")]
    BotChallenge,
    #[error("rate limited")]
    RateLimited,
    #[error("auth required")]
    Auth,
    #[error("validation failed")]
    Validation,
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Priority used to pick the single most-specific kind across a cascade's
    /// attempts: `auth > rate_limit > bot_challenge > timeout > network >
    /// selector(validation) > unknown(internal)` per spec §4.1.
    fn priority(self) -> u8 {
        match self {
            ErrorKind::Auth => 0,
            ErrorKind::RateLimited => 1,
            ErrorKind::BotChallenge => 2,
            ErrorKind::Timeout => 3,
            ErrorKind::Network => 4,
            ErrorKind::Validation => 5,
            ErrorKind::Internal => 6,
            ErrorKind::InvalidUrl => 7,
        }
    }

    /// Pick the most specific of two observed kinds for the same cascade.
    pub fn most_specific(self, other: ErrorKind) -> ErrorKind {
        if self.priority() <= other.priority() {
            self
        } else {
            other
        }
    }
}

/// A single tier attempt's classified failure (spec §9's sum-type redesign
/// of the source's loosely-typed "context" blobs).
#[derive(Error, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum AttemptFailure {
    #[error("timeout after {0}ms")]
    Timeout(u64),
    #[error("network error: {0}")]
    Network(String),
    #[error("bot challenge detected")]
    BotChallenge,
    #[error("rate limited")]
    RateLimit,
    #[error("authentication required")]
    Auth,
    #[error("validation failed: {reasons:?}")]
    Validation { reasons: Vec<String> },
    #[error("{message}")]
    Unknown { message: String },
}

impl AttemptFailure {
    /// §4.1: fatal_network failures stop the cascade immediately; everything
    /// else is transient and falls through to the next tier.
    pub fn is_fatal_network(&self) -> bool {
        matches!(self, AttemptFailure::Network(msg) if is_fatal_network_message(msg))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AttemptFailure::Timeout(_) => ErrorKind::Timeout,
            AttemptFailure::Network(_) => ErrorKind::Network,
            AttemptFailure::BotChallenge => ErrorKind::BotChallenge,
            AttemptFailure::RateLimit => ErrorKind::RateLimited,
            AttemptFailure::Auth => ErrorKind::Auth,
            AttemptFailure::Validation { .. } => ErrorKind::Validation,
            AttemptFailure::Unknown { .. } => ErrorKind::Internal,
        }
    }
}

fn is_fatal_network_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("dns") || lower.contains("connection refused") || lower.contains("refused")
}

/// Workspace-wide error type for the core crates, mirroring the teacher's
/// `CrawlError` shape.
#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CascadeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CascadeError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            CascadeError::Network(_) => ErrorKind::Network,
            CascadeError::Timeout(_) => ErrorKind::Timeout,
            CascadeError::Storage(_) => ErrorKind::Internal,
            CascadeError::Config(_) => ErrorKind::Internal,
            CascadeError::Validation(_) => ErrorKind::Validation,
            CascadeError::Other(_) => ErrorKind::Internal,
        }
    }
}
