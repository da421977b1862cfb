//! Admin-only message deletion.

use tracing::{Instrument, info, instrument};

use crate::{
    base::{
        config::Config,
        error::ModerationError,
        types::{DeleteIntent, Void},
    },
    interaction::report_failure,
    service::chat::ChatClient,
};

const FAILURE_CONTEXT: &str = "The message could not be deleted";

/// Handles the "delete" shortcut.
#[instrument(skip_all)]
pub fn handle_delete(intent: DeleteIntent, config: Config, chat: ChatClient) {
    tokio::spawn(
        async move {
            let _ = process_delete(&intent, &config, &chat).await;
        }
        .in_current_span(),
    );
}

/// Deletes the target message and reports failures privately.
#[instrument(skip_all, fields(user_id = %intent.user_id))]
pub async fn process_delete(intent: &DeleteIntent, config: &Config, chat: &ChatClient) -> Void {
    let result = delete(intent, config, chat).await;

    if let Err(err) = &result {
        report_failure(chat, &intent.target.channel_id, &intent.user_id, FAILURE_CONTEXT, err).await;
    }

    result
}

/// Deletes `intent.target` if the requester is an admin.
pub async fn delete(intent: &DeleteIntent, config: &Config, chat: &ChatClient) -> Void {
    if !config.admin_user_ids.contains(&intent.user_id) {
        return Err(ModerationError::Unauthorized("Only admins can delete messages.".to_string()).into());
    }

    chat.delete_message(&intent.target.channel_id, &intent.target.ts).await.map_err(ModerationError::downstream)?;

    info!("Admin `{}` deleted message `{}` in `{}`.", intent.user_id, intent.target.ts, intent.target.channel_id);

    Ok(())
}
