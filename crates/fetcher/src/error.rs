use webcascade_core::{ErrorKind, TierAttempt};

/// Surfaced when every tier in the cascade has been exhausted (spec §7
/// "On a fully-failed fetch the result includes `{error: {kind, message,
/// attempts}}`").
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: Vec<TierAttempt>,
}
