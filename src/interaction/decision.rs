//! Reviewer decisions on review cards.
//!
//! The status change is committed first with a conditional update, so two
//! reviewers racing on the same card produce exactly one winner. Side effects
//! (relaying the text, updating the card) run afterwards; their failures are
//! reported to the reviewer and never undo the committed status.

use chrono::Utc;
use tracing::{Instrument, info, instrument, warn};

use crate::{
    base::{
        card::ReviewCard,
        config::Config,
        error::ModerationError,
        lifecycle,
        types::{Decision, DecisionIntent, MessageRef, Res, Submission, Void},
    },
    interaction::report_failure,
    service::{chat::ChatClient, db::DbClient},
};

const FAILURE_CONTEXT: &str = "Your decision could not be completed";

/// Handles a click on a review card button.
#[instrument(skip_all)]
pub fn handle_decision(intent: DecisionIntent, config: Config, db: DbClient, chat: ChatClient) {
    tokio::spawn(
        async move {
            let _ = process_decision(&intent, &config, &db, &chat).await;
        }
        .in_current_span(),
    );
}

/// Applies the decision and reports any failure privately to the reviewer.
#[instrument(skip_all, fields(submission_id = %intent.submission_id, actor_id = %intent.actor_id))]
pub async fn process_decision(intent: &DecisionIntent, config: &Config, db: &DbClient, chat: &ChatClient) -> Res<Submission> {
    let result = on_decision(intent, config, db, chat).await;

    if let Err(err) = &result {
        report_failure(chat, &intent.card.channel_id, &intent.actor_id, FAILURE_CONTEXT, err).await;
    }

    result
}

/// Loads the submission and applies the decision on behalf of the reviewer.
pub async fn on_decision(intent: &DecisionIntent, config: &Config, db: &DbClient, chat: &ChatClient) -> Res<Submission> {
    let id = intent.submission_id;
    let submission = db.get_submission(id).await?.ok_or(ModerationError::NotFound(id))?;

    match intent.decision {
        Decision::Accept => accept(&submission, &intent.actor_id, &intent.card, config, db, chat).await,
        Decision::Deny => deny(&submission, &intent.actor_id, &intent.card, config, db, chat).await,
    }
}

/// Accepts a pending submission, relays its text into the origin thread, and updates the card.
#[instrument(skip_all, fields(submission_id = %submission.id))]
pub async fn accept(submission: &Submission, actor_id: &str, card: &MessageRef, config: &Config, db: &DbClient, chat: &ChatClient) -> Res<Submission> {
    let accepted = commit(submission, Decision::Accept, db).await?;

    info!("Submission {} accepted by `{}`.", accepted.id, actor_id);

    let relayed = chat
        .send_message(&accepted.origin.channel_id, &accepted.origin.ts, &accepted.text)
        .await
        .map_err(|e| ModerationError::downstream(format!("the impression was accepted but could not be posted: {e}")));
    let updated = update_card(&accepted, actor_id, card, config, chat).await;

    relayed?;
    updated?;

    Ok(accepted)
}

/// Denies a pending submission and updates the card.
#[instrument(skip_all, fields(submission_id = %submission.id))]
pub async fn deny(submission: &Submission, actor_id: &str, card: &MessageRef, config: &Config, db: &DbClient, chat: &ChatClient) -> Res<Submission> {
    let denied = commit(submission, Decision::Deny, db).await?;

    info!("Submission {} denied by `{}`.", denied.id, actor_id);

    update_card(&denied, actor_id, card, config, chat).await?;

    Ok(denied)
}

/// Commits the transition, failing with `Conflict` if another decision got there first.
async fn commit(submission: &Submission, decision: Decision, db: &DbClient) -> Res<Submission> {
    let status = lifecycle::transition(submission, decision)?;
    let reviewed_at = Utc::now();

    if db.set_status(submission.id, status, reviewed_at).await? == 0 {
        // Lost a race with another decision; report the status that won.
        let current = db.get_submission(submission.id).await?.ok_or(ModerationError::NotFound(submission.id))?;

        return Err(ModerationError::Conflict { id: submission.id, status: current.status }.into());
    }

    Ok(Submission {
        status,
        reviewed_at: Some(reviewed_at),
        ..submission.clone()
    })
}

/// Redraws the clicked card, which may not be recorded on the submission yet.
async fn update_card(submission: &Submission, actor_id: &str, card_ref: &MessageRef, config: &Config, chat: &ChatClient) -> Void {
    if submission.review_ref.as_ref().is_some_and(|review_ref| review_ref != card_ref) {
        warn!("Submission {} was decided from a card other than its recorded one.", submission.id);
    }

    let card = ReviewCard::decided(submission, config.fingerprint_display_len, submission.status, actor_id);

    chat.update_review_card(card_ref, &card)
        .await
        .map_err(|e| ModerationError::downstream(format!("the review card could not be updated: {e}")))?;

    Ok(())
}
