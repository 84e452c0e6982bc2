use shared::error::{Error, ErrorCode};
use shared::validation::ValidationError;
use thiserror::Error;
use uuid::Uuid;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No voter is signed in")]
    NotAuthenticated,
    #[error("Invalid candidate: {0}")]
    InvalidCandidate(#[from] ValidationError),
    #[error("Voter {voter_id} has already voted in election {election_id}")]
    AlreadyVoted { election_id: Uuid, voter_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Store failures can be resubmitted as-is; validation failures cannot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Store(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::NotAuthenticated => ErrorCode::NotAuthenticated,
            LedgerError::InvalidCandidate(_) => ErrorCode::InvalidCandidate,
            LedgerError::AlreadyVoted { .. } => ErrorCode::AlreadyVoted,
            LedgerError::Store(_) => ErrorCode::StoreUnavailable,
        }
    }
}

impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        let code = err.code();
        let message = match &err {
            LedgerError::InvalidCandidate(reason) => reason.to_string(),
            LedgerError::Store(_) => "Your vote could not be recorded. Please try again.".into(),
            _ => code.to_string(),
        };
        Error::new(code, message)
            .with_details(err.to_string())
            .retryable(err.is_retryable())
    }
}
