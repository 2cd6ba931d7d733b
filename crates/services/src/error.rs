//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::AnswerError;

/// Errors surfaced by a remote session gateway.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("session not found")]
    NotFound,

    #[error("an in-progress session already exists for this test")]
    Conflict,

    #[error("gateway request failed with status {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("gateway connection error: {0}")]
    Connection(String),
}

/// Errors emitted by `SessionResolver`.
///
/// `Conflict` and `NotFound` are recovered inside the resolver and only leak
/// here in the one corner where a conflicting creation cannot be matched to
/// any discoverable session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Errors emitted by `SessionController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error("resolved session has no questions")]
    EmptySession,

    #[error("controller is not on an active question")]
    NotActive,

    #[error("no resume decision is pending")]
    NoChoicePending,

    #[error("retry is only available after a failed resolution")]
    NotFailed,

    #[error("session is already terminal")]
    AlreadyTerminal,

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ControllerError {
    /// True for remote failures the user can simply retry; local state has
    /// been rolled back and unsaved edits are intact.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Resolve(_) | Self::Gateway(_))
    }
}
