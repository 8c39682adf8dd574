use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::normalize::ExtractionFailed;

/// Closed set of failure categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    RateLimited,
    InvalidOrExpiredCredential,
    Forbidden,
    UnsupportedInput,
    MalformedModelOutput,
    TransportError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::InvalidOrExpiredCredential => "invalid_or_expired_credential",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::UnsupportedInput => "unsupported_input",
            ErrorKind::MalformedModelOutput => "malformed_model_output",
            ErrorKind::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`crate::core::ModelClient`] for a single attempt.
///
/// `message` is the provider's text as received; retry and classification
/// both match on it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input rejected before any network call.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// Terminal remote failure after the retry budget was spent or the
    /// failure was judged non-retryable.
    #[error("{message}")]
    Model {
        kind: ErrorKind,
        message: String,
        raw: String,
        attempts: u32,
    },

    #[error("Failed to parse AI response: {0}")]
    MalformedOutput(#[from] ExtractionFailed),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnsupportedInput(_) => ErrorKind::UnsupportedInput,
            PipelineError::Model { kind, .. } => *kind,
            PipelineError::MalformedOutput(_) => ErrorKind::MalformedModelOutput,
        }
    }

    /// Raw diagnostic text: the provider message for remote failures, the
    /// untouched model output for malformed responses.
    pub fn raw(&self) -> Option<&str> {
        match self {
            PipelineError::UnsupportedInput(_) => None,
            PipelineError::Model { raw, .. } => Some(raw.as_str()),
            PipelineError::MalformedOutput(failure) => Some(failure.raw_text.as_str()),
        }
    }

    pub(crate) fn missing_credential() -> Self {
        PipelineError::Model {
            kind: ErrorKind::InvalidOrExpiredCredential,
            message: "GEMINI_API_KEY is not set. Set GEMINI_API_KEY in the environment or config file and restart.".into(),
            raw: String::new(),
            attempts: 0,
        }
    }
}

pub type ModelOutcome = Result<String, PipelineError>;
