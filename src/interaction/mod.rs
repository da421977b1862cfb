//! Event handling and user interactions for the impression relay.
//!
//! Every inbound chat event is handled in two steps. The chat client
//! acknowledges the event right away and hands a platform-neutral intent to one
//! of the `handle_*` functions here, which spawn the actual processing. Any
//! failure during processing is reported privately to the user that triggered
//! the event; nothing is retried.

pub mod admin;
pub mod decision;
pub mod intake;
pub mod review;

use tracing::{error, warn};

use crate::{
    base::{
        error::{ModerationError, as_moderation_error},
        types::Err,
    },
    service::chat::ChatClient,
};

/// The private notice shown to a user for a failed event.
///
/// Eligibility failures carry their own wording; everything else is prefixed with `context`.
pub fn failure_notice(context: &str, err: &Err) -> String {
    match as_moderation_error(err) {
        Some(ModerationError::Unauthorized(reason)) => reason.clone(),
        Some(moderation_error) => format!("{context}: {moderation_error}"),
        None => format!("{context}: {err}"),
    }
}

/// Reports a failed event to `user_id` with an ephemeral message in `channel_id`.
///
/// A failure to deliver the notice is only logged.
pub async fn report_failure(chat: &ChatClient, channel_id: &str, user_id: &str, context: &str, err: &Err) {
    match as_moderation_error(err) {
        Some(ModerationError::Unauthorized(_) | ModerationError::InvalidInput(_) | ModerationError::Conflict { .. } | ModerationError::NotFound(_) | ModerationError::DuplicateCard(_)) => {
            warn!("Rejected event from `{}`: {}", user_id, err)
        }
        _ => error!("Error while handling event from `{}`: {:#}", user_id, err),
    }

    if let Err(notify_err) = chat.send_ephemeral(channel_id, user_id, &failure_notice(context, err)).await {
        error!("Failed to notify `{}` about an error: {}", user_id, notify_err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::types::SubmissionId;

    #[test]
    fn unauthorized_notice_is_shown_verbatim() {
        let err: Err = ModerationError::Unauthorized("You are not allowed to submit impressions.".into()).into();

        assert_eq!(failure_notice("Submission failed", &err), "You are not allowed to submit impressions.");
    }

    #[test]
    fn other_errors_get_context() {
        let err: Err = ModerationError::NotFound(SubmissionId(9999)).into();
        assert_eq!(failure_notice("Decision failed", &err), "Decision failed: Submission 9999 was not found.");

        let err = anyhow::anyhow!("connection reset");
        assert_eq!(failure_notice("Decision failed", &err), "Decision failed: connection reset");
    }
}
