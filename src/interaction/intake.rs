//! Submission intake: eligibility gates, the submission form, and record creation.

use tracing::{Instrument, error, info, instrument};

use crate::{
    base::{
        config::Config,
        error::ModerationError,
        fingerprint::fingerprint,
        types::{FormSubmission, NewSubmission, Res, Submission, SubmitIntent, Void},
    },
    interaction::{report_failure, review},
    service::{chat::ChatClient, db::DbClient},
};

const DENIED_NOTICE: &str = "Sorry, you are not allowed to submit impressions.";
const SUBMITTED_NOTICE: &str = "Thanks! Your impression was submitted anonymously and is waiting for review.";
const FAILURE_CONTEXT: &str = "Your impression could not be submitted";

/// Checks that `user_id` may submit from `channel_id`.
///
/// Deny-listed users are always rejected. Everyone else must be in a permitted
/// channel unless they are an override user.
pub fn check_eligibility(config: &Config, user_id: &str, channel_id: &str) -> Result<(), ModerationError> {
    if config.denied_user_ids.contains(user_id) {
        return Err(ModerationError::Unauthorized(DENIED_NOTICE.to_string()));
    }

    if !config.permitted_channel_ids.contains(channel_id) && !config.override_user_ids.contains(user_id) {
        let mut channels = config.permitted_channel_ids.iter().map(|c| format!("<#{c}>")).collect::<Vec<_>>();
        channels.sort();

        return Err(ModerationError::Unauthorized(format!("Impressions can only be submitted from {}.", channels.join(", "))));
    }

    Ok(())
}

/// Trims the submitted text and checks its length.
pub fn validate_text(config: &Config, text: &str) -> Result<String, ModerationError> {
    let text = text.trim();

    if text.is_empty() {
        return Err(ModerationError::InvalidInput("the impression is empty.".to_string()));
    }

    let len = text.chars().count();
    if len > config.max_text_len {
        return Err(ModerationError::InvalidInput(format!("the impression is {len} characters long; the limit is {}.", config.max_text_len)));
    }

    Ok(text.to_string())
}

// Submit shortcut.

/// Handles the "submit impression" shortcut.
#[instrument(skip_all)]
pub fn handle_submit_shortcut(intent: SubmitIntent, config: Config, chat: ChatClient) {
    tokio::spawn(
        async move {
            let _ = process_submit_shortcut(&intent, &config, &chat).await;
        }
        .in_current_span(),
    );
}

/// Gates the shortcut and opens the submission form, reporting failures privately.
#[instrument(skip_all, fields(user_id = %intent.user_id))]
pub async fn process_submit_shortcut(intent: &SubmitIntent, config: &Config, chat: &ChatClient) -> Void {
    let result = open_form(intent, config, chat).await;

    if let Err(err) = &result {
        report_failure(chat, &intent.origin.channel_id, &intent.user_id, FAILURE_CONTEXT, err).await;
    }

    result
}

async fn open_form(intent: &SubmitIntent, config: &Config, chat: &ChatClient) -> Void {
    check_eligibility(config, &intent.user_id, &intent.origin.channel_id)?;

    chat.open_submission_form(&intent.trigger_id, &intent.origin).await.map_err(ModerationError::downstream)?;

    Ok(())
}

// Form submission.

/// Handles a submitted impression form.
#[instrument(skip_all)]
pub fn handle_form_submission(form: FormSubmission, config: Config, db: DbClient, chat: ChatClient) {
    tokio::spawn(
        async move {
            let _ = process_form_submission(&form, &config, &db, &chat).await;
        }
        .in_current_span(),
    );
}

/// Submits the form and tells the submitter privately how it went.
#[instrument(skip_all, fields(user_id = %form.user_id))]
pub async fn process_form_submission(form: &FormSubmission, config: &Config, db: &DbClient, chat: &ChatClient) -> Res<Submission> {
    let result = submit(form, config, db, chat).await;

    match &result {
        Ok(_) => {
            if let Err(err) = chat.send_ephemeral(&form.origin.channel_id, &form.user_id, SUBMITTED_NOTICE).await {
                error!("Failed to confirm submission to `{}`: {}", form.user_id, err);
            }
        }
        Err(err) => report_failure(chat, &form.origin.channel_id, &form.user_id, FAILURE_CONTEXT, err).await,
    }

    result
}

/// Creates a pending submission from `form` and publishes its review card.
///
/// Eligibility is checked again since the form may be submitted long after the
/// shortcut was used. If the card cannot be published the submission stays
/// pending without a card until reconciled.
pub async fn submit(form: &FormSubmission, config: &Config, db: &DbClient, chat: &ChatClient) -> Res<Submission> {
    check_eligibility(config, &form.user_id, &form.origin.channel_id)?;
    let text = validate_text(config, &form.text)?;

    let new_submission = NewSubmission {
        fingerprint: fingerprint(&config.fingerprint_secret, &form.user_id)?,
        text,
        origin: form.origin.clone(),
        review_channel_id: config.review_channel_for(&form.user_id).to_string(),
    };

    let submission = db.create_submission(&new_submission).await?;

    info!("Created pending submission {}.", submission.id);

    let review_ref = review::publish(&submission, config, db, chat).await?;

    Ok(Submission {
        review_ref: Some(review_ref),
        ..submission
    })
}
