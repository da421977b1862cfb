//! Publishing review cards for pending submissions.

use crate::{
    base::{
        card::ReviewCard,
        types::{MessageRef, Submission},
    },
    prelude::*,
    service::{chat::ChatClient, db::DbClient},
};

/// Posts the review card for `submission` into its review channel and records it.
///
/// The card is posted before it is recorded. If the submission got a card in the
/// meantime, the new card is deleted again and `DuplicateCard` is returned. If
/// recording fails the card stays posted and the error is returned; the pending
/// submission is never rolled back.
#[instrument(skip_all, fields(submission_id = %submission.id))]
pub async fn publish(submission: &Submission, config: &Config, db: &DbClient, chat: &ChatClient) -> Res<MessageRef> {
    let card = ReviewCard::pending(submission, config.fingerprint_display_len);

    let review_ref = chat.post_review_card(review_channel(submission, config), &card).await.map_err(ModerationError::downstream)?;

    if !db.set_review_ref(submission.id, &review_ref).await? {
        warn!("Submission {} already has a review card; removing the duplicate.", submission.id);

        if let Err(err) = chat.delete_message(&review_ref.channel_id, &review_ref.ts).await {
            error!("Failed to remove duplicate review card for submission {}: {}", submission.id, err);
        }

        return Err(ModerationError::DuplicateCard(submission.id).into());
    }

    info!("Published review card for submission {}.", submission.id);

    Ok(review_ref)
}

/// The channel the card of `submission` belongs in.
///
/// Records written before the destination was stored fall back to the default review channel.
pub fn review_channel<'a>(submission: &'a Submission, config: &'a Config) -> &'a str {
    if submission.review_channel_id.is_empty() { &config.review_channel_id } else { &submission.review_channel_id }
}

/// Publishes cards for pending submissions that were created but never got one.
///
/// This happens when the process stops between creating a submission and posting
/// its card. Returns the number of cards published; individual failures are logged.
#[instrument(skip_all)]
pub async fn reconcile_orphans(config: &Config, db: &DbClient, chat: &ChatClient) -> Res<usize> {
    let orphans = db.list_orphaned_pending().await?;

    if orphans.is_empty() {
        info!("No orphaned submissions found.");
        return Ok(0);
    }

    warn!("Found {} orphaned submission(s); publishing review cards ...", orphans.len());

    let mut published = 0;

    for submission in orphans.iter() {
        match publish(submission, config, db, chat).await {
            Ok(_) => published += 1,
            Err(err) => error!("Failed to publish card for orphaned submission {}: {}", submission.id, err),
        }
    }

    Ok(published)
}
