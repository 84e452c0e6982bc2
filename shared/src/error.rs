use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    #[error("You must be signed in to vote")]
    NotAuthenticated,
    #[error("Candidate is not running for this position")]
    InvalidCandidate,
    #[error("You have already submitted your vote")]
    AlreadyVoted,
    #[error("Election service unavailable")]
    StoreUnavailable,
    #[error("Vote references a removed candidate")]
    StaleReference,
}

impl ErrorCode {
    /// Whether the caller may resubmit the same request unchanged.
    pub const fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::StoreUnavailable)
    }
}

/// Failure envelope handed to the presentation layer.
///
/// `retryable` starts from [`ErrorCode::is_retryable`]; the ledger may
/// narrow or widen it for the specific failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}{}", .details.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub retryable: bool,
}

impl From<ErrorCode> for Error {
    /// An envelope whose message is the code's own user-facing text.
    fn from(code: ErrorCode) -> Self {
        Error::new(code, code.to_string())
    }
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Error { code, message: message.into(), details: None, retryable: code.is_retryable() }
    }

    /// Attaches the underlying cause, kept out of the voter-facing message.
    pub fn with_details(self, details: impl Into<String>) -> Self {
        Error { details: Some(details.into()), ..self }
    }

    pub fn retryable(self, retryable: bool) -> Self {
        Error { retryable, ..self }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
