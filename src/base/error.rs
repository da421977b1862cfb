//! Error taxonomy for the moderation flow.

use thiserror::Error;

use super::types::{SubmissionId, SubmissionStatus};

/// Errors raised by the moderation flow.
///
/// Everything except the startup variants is caught at the handler boundary
/// and turned into a private notice for the user that triggered the event.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Missing or invalid configuration: {0}")]
    ConfigMissing(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Submission {0} was not found.")]
    NotFound(SubmissionId),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Submission {id} was already {status}.")]
    Conflict { id: SubmissionId, status: SubmissionStatus },
    #[error("Failed to post to the chat platform: {0}")]
    DownstreamPostFailure(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Submission {0} already has a review card.")]
    DuplicateCard(SubmissionId),
}

impl ModerationError {
    /// Wrap a chat platform failure.
    pub fn downstream(err: impl std::fmt::Display) -> Self {
        ModerationError::DownstreamPostFailure(err.to_string())
    }
}

/// Extracts the moderation error from an `anyhow` chain, if one is present.
pub fn as_moderation_error(err: &anyhow::Error) -> Option<&ModerationError> {
    err.downcast_ref::<ModerationError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_the_status() {
        let err = ModerationError::Conflict {
            id: SubmissionId(5),
            status: SubmissionStatus::Denied,
        };

        assert_eq!(err.to_string(), "Submission 5 was already denied.");
    }

    #[test]
    fn moderation_error_survives_anyhow() {
        let err: anyhow::Error = ModerationError::NotFound(SubmissionId(9999)).into();

        assert!(matches!(as_moderation_error(&err), Some(ModerationError::NotFound(SubmissionId(9999)))));
    }
}
