//! Error types for the oracle session driver

use thiserror::Error;

/// Errors surfaced by an oracle session.
///
/// All variants carry plain strings so the last error can be kept in the
/// session context and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("failed to start learning session: {0}")]
    StartFailed(String),
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("failed to submit answer: {0}")]
    SubmitFailed(String),
    #[error("answer rejected by learner: {0}")]
    Logical(String),
    #[error("another call on this session is already in flight")]
    Busy,
    #[error("no outstanding query to answer")]
    NoOutstandingQuery,
    #[error("session already started")]
    AlreadyStarted,
}

impl OracleError {
    /// Whether the current query is still answerable after this error
    pub fn keeps_query(&self) -> bool {
        matches!(
            self,
            OracleError::Decode(_)
                | OracleError::SubmitFailed(_)
                | OracleError::Logical(_)
                | OracleError::Busy
        )
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(e: serde_json::Error) -> Self {
        OracleError::Decode(e.to_string())
    }
}
