//! Slack implementation of the chat service.
//!
//! This module provides functionality for interacting with Slack:
//! - Receiving shortcuts, form submissions, and button clicks over socket mode
//! - Opening the submission form and posting, updating, and deleting messages
//! - Rendering review cards as Block Kit blocks
//!
//! Socket mode acknowledges an interaction when its callback returns, so the
//! callbacks here only translate the event into an intent, spawn the handler,
//! and return.

use std::{collections::HashMap, ops::Deref, sync::Arc};

use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use slack_morphism::prelude::*;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    base::{
        card::{ReviewCard, escape_markup},
        config::Config,
        types::{Decision, DecisionIntent, DeleteIntent, FormSubmission, MessageRef, Res, SubmissionId, SubmitIntent, Void},
    },
    interaction,
    service::db::DbClient,
};

use super::{ChatClient, GenericChatClient};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;
type CallbackResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

// Form identifiers.

const FORM_CALLBACK_ID: &str = "impression_form";
const FORM_BLOCK_ID: &str = "impression_block";
const FORM_ACTION_ID: &str = "impression_text";

/// Maximum length of a section block's text.
const SECTION_TEXT_LIMIT: usize = 3000;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, db: DbClient) -> Res<Self> {
        let client = SlackChatClient::new(config, db).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    config: Config,
    db: DbClient,
    chat: ChatClient,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    app_token: SlackApiToken,
    bot_token: SlackApiToken,
    client: Arc<FullClient>,
    config: Config,
    db: DbClient,
}

impl Deref for SlackChatClient {
    type Target = FullClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, db: DbClient) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Check the bot token before serving.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;

        info!("Authenticated as Slack bot user `{}`.", bot_user.user_id.0);

        Ok(Self {
            app_token,
            bot_token,
            client,
            config: config.clone(),
            db,
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new().with_interaction_events(handle_interaction_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState {
            config: self.config.clone(),
            db: self.db.clone(),
            chat: ChatClient::from(self.clone()),
        }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_submission_form(&self, trigger_id: &str, origin: &MessageRef) -> Void {
        let view = submission_form(origin)?;
        let request = SlackApiViewsOpenRequest::new(SlackTriggerId(trigger_id.to_string()), SlackView::Modal(view));

        let session = self.client.open_session(&self.bot_token);

        let _ = session.views_open(&request).await.map_err(|e| anyhow::anyhow!("Failed to open submission form: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self, card), fields(submission_id = %card.submission_id))]
    async fn post_review_card(&self, channel_id: &str, card: &ReviewCard) -> Res<MessageRef> {
        let content = SlackMessageContent::new().with_text(card.fallback_text()).with_blocks(review_card_blocks(card));
        let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), content);

        let session = self.client.open_session(&self.bot_token);

        let response = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to post review card: {}", e))?;

        Ok(MessageRef::new(response.channel.0, response.ts.0))
    }

    #[instrument(skip(self, card), fields(submission_id = %card.submission_id))]
    async fn update_review_card(&self, review_ref: &MessageRef, card: &ReviewCard) -> Void {
        let content = SlackMessageContent::new().with_text(card.fallback_text()).with_blocks(review_card_blocks(card));
        let request = SlackApiChatUpdateRequest::new(SlackChannelId(review_ref.channel_id.clone()), content, SlackTs(review_ref.ts.clone()));

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_update(&request).await.map_err(|e| anyhow::anyhow!("Failed to update review card: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, channel_id: &str, thread_ts: &str, text: &str) -> Void {
        let message = SlackMessageContent::new().with_text(escape_markup(text));

        let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), message).with_thread_ts(SlackTs(thread_ts.to_string()));

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_ephemeral(&self, channel_id: &str, user_id: &str, text: &str) -> Void {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let request = SlackApiChatPostEphemeralRequest::new(SlackChannelId(channel_id.to_string()), SlackUserId(user_id.to_string()), message);

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_post_ephemeral(&request).await.map_err(|e| anyhow::anyhow!("Failed to send ephemeral message: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, channel_id: &str, ts: &str) -> Void {
        let request = SlackApiChatDeleteRequest::new(SlackChannelId(channel_id.to_string()), SlackTs(ts.to_string()));

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_delete(&request).await.map_err(|e| anyhow::anyhow!("Failed to delete message: {}", e))?;

        Ok(())
    }
}

// Socket mode listener callbacks for Slack.

/// Handles interaction events from Slack.
#[instrument(skip_all)]
async fn handle_interaction_event(event: SlackInteractionEvent, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> CallbackResult {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;
    let config = &user_state.config;

    match event {
        SlackInteractionEvent::MessageAction(action) => {
            let callback_id = action.callback_id.0.as_str();

            if callback_id == config.submit_callback_id {
                info!("Received submit shortcut ...");

                match submit_intent(&action) {
                    Some(intent) => interaction::intake::handle_submit_shortcut(intent, config.clone(), user_state.chat.clone()),
                    None => warn!("Skipping submit shortcut without a channel or message."),
                }
            } else if callback_id == config.delete_callback_id {
                info!("Received delete shortcut ...");

                match delete_intent(&action) {
                    Some(intent) => interaction::admin::handle_delete(intent, config.clone(), user_state.chat.clone()),
                    None => warn!("Skipping delete shortcut without a channel or message."),
                }
            } else {
                warn!("Received unknown message shortcut `{}`.", callback_id);
            }
        }
        SlackInteractionEvent::ViewSubmission(submission) => {
            info!("Received view submission ...");

            match form_submission(&submission) {
                Some(form) => interaction::intake::handle_form_submission(form, config.clone(), user_state.db.clone(), user_state.chat.clone()),
                None => error!("Failed to read the submitted impression form."),
            }
        }
        SlackInteractionEvent::BlockActions(actions) => {
            info!("Received block actions ...");

            match decision_intent(&actions) {
                Some(intent) => interaction::decision::handle_decision(intent, config.clone(), user_state.db.clone(), user_state.chat.clone()),
                None => warn!("Skipping block action that is not a review decision."),
            }
        }
        SlackInteractionEvent::Shortcut(_) => {
            warn!("Received a global shortcut; impressions are submitted with the message shortcut.");
        }
        _ => {
            debug!("Received unhandled interaction event.")
        }
    }

    Ok(())
}

// Event translation.

/// Reads the submit intent from a message shortcut.
///
/// The origin thread is the message's thread, or the message itself when it is top-level.
fn submit_intent(action: &SlackInteractionMessageActionEvent) -> Option<SubmitIntent> {
    let target = shortcut_target(action)?;
    let message = action.message.as_ref()?;
    let thread_ts = message.origin.thread_ts.as_ref().unwrap_or(&message.origin.ts);

    Some(SubmitIntent {
        user_id: action.user.id.0.clone(),
        trigger_id: action.trigger_id.0.clone(),
        origin: MessageRef::new(target.channel_id, thread_ts.0.clone()),
    })
}

/// Reads the delete intent from a message shortcut.
fn delete_intent(action: &SlackInteractionMessageActionEvent) -> Option<DeleteIntent> {
    Some(DeleteIntent {
        user_id: action.user.id.0.clone(),
        target: shortcut_target(action)?,
    })
}

/// The message a shortcut was invoked on.
fn shortcut_target(action: &SlackInteractionMessageActionEvent) -> Option<MessageRef> {
    let message = action.message.as_ref()?;
    let channel = action.channel.as_ref().map(|c| &c.id).or(message.origin.channel.as_ref())?;

    Some(MessageRef::new(channel.0.clone(), message.origin.ts.0.clone()))
}

/// Reads a submitted impression form.
fn form_submission(event: &SlackInteractionViewSubmissionEvent) -> Option<FormSubmission> {
    let SlackView::Modal(modal) = &event.view.view else {
        return None;
    };

    if modal.callback_id.as_ref().map(|c| c.0.as_str()) != Some(FORM_CALLBACK_ID) {
        return None;
    }

    let origin = parse_form_metadata(modal.private_metadata.as_deref()?)?;
    let text = form_text(&event.view.state_params.state.as_ref()?.values)?;

    Some(FormSubmission {
        user_id: event.user.id.0.clone(),
        origin,
        text,
    })
}

/// Reads a review decision from a button click.
fn decision_intent(event: &SlackInteractionBlockActionsEvent) -> Option<DecisionIntent> {
    let user = event.user.as_ref()?;
    let card = clicked_card(event)?;

    event.actions.as_ref()?.iter().find_map(|action| {
        let decision = Decision::from_action_id(&action.action_id.0)?;
        let submission_id = action.value.as_deref()?.parse::<SubmissionId>().ok()?;

        Some(DecisionIntent {
            decision,
            submission_id,
            actor_id: user.id.0.clone(),
            card: card.clone(),
        })
    })
}

/// The message a block action was clicked on.
fn clicked_card(event: &SlackInteractionBlockActionsEvent) -> Option<MessageRef> {
    let SlackInteractionActionContainer::Message(container) = &event.container else {
        return None;
    };

    let channel = container.channel_id.as_ref().or(event.channel.as_ref().map(|c| &c.id))?;

    Some(MessageRef::new(channel.0.clone(), container.message_ts.0.clone()))
}

/// Extracts the impression text from the submitted form state.
fn form_text(values: &HashMap<SlackBlockId, HashMap<SlackActionId, SlackViewStateValue>>) -> Option<String> {
    values.get(&SlackBlockId(FORM_BLOCK_ID.to_string()))?.get(&SlackActionId(FORM_ACTION_ID.to_string()))?.value.clone()
}

fn parse_form_metadata(metadata: &str) -> Option<MessageRef> {
    serde_json::from_str(metadata).ok()
}

// Rendering.

fn plain(text: &str) -> SlackBlockPlainTextOnly {
    SlackBlockPlainText::new(text.to_string()).into()
}

fn mrkdwn(text: String) -> SlackBlockText {
    SlackBlockMarkDownText::new(text).into()
}

/// The modal with a single multiline text field; the origin rides along in the private metadata.
fn submission_form(origin: &MessageRef) -> Res<SlackModalView> {
    let input = SlackBlockPlainTextInputElement::new().with_action_id(SlackActionId(FORM_ACTION_ID.to_string())).with_multiline(true);

    let block = SlackInputBlock::new(plain("Your impression"), SlackInputBlockElement::PlainTextInput(input)).with_block_id(SlackBlockId(FORM_BLOCK_ID.to_string()));

    let view = SlackModalView::new(plain("Submit an impression"), vec![SlackBlock::Input(block)])
        .with_callback_id(SlackCallbackId(FORM_CALLBACK_ID.to_string()))
        .with_submit(plain("Submit"))
        .with_close(plain("Cancel"))
        .with_private_metadata(serde_json::to_string(origin)?);

    Ok(view)
}

/// Renders a review card; only pending cards get the accept/deny buttons.
///
/// Long bodies are spread over several sections to stay within the section limit.
fn review_card_blocks(card: &ReviewCard) -> Vec<SlackBlock> {
    let mut blocks = vec![SlackBlock::Section(SlackSectionBlock::new().with_text(mrkdwn(format!("*From:* `{}`", card.fingerprint_prefix))))];

    blocks.extend(card.body_sections(SECTION_TEXT_LIMIT).into_iter().map(|section| SlackBlock::Section(SlackSectionBlock::new().with_text(mrkdwn(section)))));
    blocks.push(SlackBlock::Section(SlackSectionBlock::new().with_text(mrkdwn(format!("_{}_", card.footer())))));

    if card.has_actions() {
        let value = card.submission_id.to_string();

        let accept = SlackBlockButtonElement::new(plain("Accept"))
            .with_action_id(SlackActionId(Decision::Accept.action_id().to_string()))
            .with_value(value.clone())
            .with_style(SlackBlockButtonStyle::Primary);
        let deny = SlackBlockButtonElement::new(plain("Deny"))
            .with_action_id(SlackActionId(Decision::Deny.action_id().to_string()))
            .with_value(value)
            .with_style(SlackBlockButtonStyle::Danger);

        blocks.push(SlackBlock::Actions(SlackActionsBlock::new(vec![
            SlackActionBlockElement::Button(accept),
            SlackActionBlockElement::Button(deny),
        ])));
    }

    blocks
}

// Tests.
