use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Every failure the ballot core can hand back to its caller.
#[derive(Error, Debug)]
pub enum BallotError {
    #[error("{0}")]
    Validation(String),

    #[error("You have already voted")]
    AlreadyVoted,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("{message}")]
    Fetch { status: Option<u16>, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, BallotError>;

/// The `{kind, message}` shape handed up to presentation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl BallotError {
    pub fn validation(message: impl Into<String>) -> Self {
        BallotError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        BallotError::Forbidden(message.into())
    }

    pub fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        BallotError::Fetch {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BallotError::Validation(_) => "validation",
            BallotError::AlreadyVoted => "already_voted",
            BallotError::Forbidden(_) => "forbidden",
            // Timeouts and storage failures are transport-class problems
            BallotError::Fetch { .. } | BallotError::Timeout(_) | BallotError::Database(_) => {
                "fetch"
            }
        }
    }

    /// Whether re-issuing the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BallotError::Fetch { .. } | BallotError::Timeout(_) | BallotError::Database(_)
        )
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_keeps_server_message() {
        let err = BallotError::fetch(Some(500), "Results unavailable");
        let body = err.to_body();
        assert_eq!(body.kind, "fetch");
        assert_eq!(body.message, "Results unavailable");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_timeout_reports_as_fetch() {
        let err = BallotError::Timeout(Duration::from_secs(3));
        assert_eq!(err.kind(), "fetch");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_local_decisions_are_not_retryable() {
        assert!(!BallotError::AlreadyVoted.is_retryable());
        assert!(!BallotError::forbidden("nope").is_retryable());
        assert!(!BallotError::validation("empty").is_retryable());
        assert_eq!(BallotError::AlreadyVoted.kind(), "already_voted");
    }

    #[test]
    fn test_error_body_serializes_kind_and_message() {
        let json = serde_json::to_value(BallotError::validation("Please choose an option").to_body())
            .unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["message"], "Please choose an option");
    }
}
