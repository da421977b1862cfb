//! The moderation lifecycle of a submission.
//!
//! A submission starts `pending` and moves exactly once to `accepted` or `denied`.
//! Terminal states have no outgoing transitions.

use super::{
    error::ModerationError,
    types::{Decision, Submission, SubmissionStatus},
};

impl SubmissionStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }
}

impl Decision {
    /// The state a pending submission moves to on this decision.
    pub fn target_status(&self) -> SubmissionStatus {
        match self {
            Decision::Accept => SubmissionStatus::Accepted,
            Decision::Deny => SubmissionStatus::Denied,
        }
    }
}

/// Computes the next status for `submission` under `decision`.
///
/// Fails with `Conflict` when the submission has already been decided.
pub fn transition(submission: &Submission, decision: Decision) -> Result<SubmissionStatus, ModerationError> {
    match submission.status {
        SubmissionStatus::Pending => Ok(decision.target_status()),
        status => Err(ModerationError::Conflict { id: submission.id, status }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::base::types::{MessageRef, SubmissionId};

    fn submission(status: SubmissionStatus) -> Submission {
        Submission {
            id: SubmissionId(1),
            fingerprint: "f".into(),
            text: "t".into(),
            status,
            created_at: Utc::now(),
            reviewed_at: status.is_terminal().then(Utc::now),
            review_ref: None,
            origin: MessageRef::new("C1", "1.0"),
            review_channel_id: "CREVIEW".into(),
        }
    }

    #[test]
    fn pending_moves_to_the_decided_state() {
        let pending = submission(SubmissionStatus::Pending);

        assert_eq!(transition(&pending, Decision::Accept).unwrap(), SubmissionStatus::Accepted);
        assert_eq!(transition(&pending, Decision::Deny).unwrap(), SubmissionStatus::Denied);
    }

    #[test]
    fn terminal_states_reject_every_decision() {
        for status in [SubmissionStatus::Accepted, SubmissionStatus::Denied] {
            for decision in [Decision::Accept, Decision::Deny] {
                let err = transition(&submission(status), decision).unwrap_err();
                assert!(matches!(err, ModerationError::Conflict { status: s, .. } if s == status));
            }
        }
    }

    #[test]
    fn only_pending_is_not_terminal() {
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(SubmissionStatus::Accepted.is_terminal());
        assert!(SubmissionStatus::Denied.is_terminal());
    }
}
