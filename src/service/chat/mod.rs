pub mod slack;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::{
    card::ReviewCard,
    types::{MessageRef, Res, Void},
};

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the calls the moderation flow makes against a chat
/// platform like Slack. Implementing this trait allows different chat services
/// to be used with the relay.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Start the chat client listener.
    ///
    /// This sets up event listeners for the chat platform and processes
    /// incoming shortcuts, form submissions, and button clicks until shutdown.
    async fn start(&self) -> Void;

    /// Open the single-field submission form.
    ///
    /// The origin is carried through the form so the submission can be
    /// relayed back into the thread it was started from.
    async fn open_submission_form(&self, trigger_id: &str, origin: &MessageRef) -> Void;

    /// Post a review card into a channel and return a reference to it.
    async fn post_review_card(&self, channel_id: &str, card: &ReviewCard) -> Res<MessageRef>;

    /// Replace an existing review card.
    async fn update_review_card(&self, review_ref: &MessageRef, card: &ReviewCard) -> Void;

    /// Send a message to a channel thread.
    ///
    /// The text is sent as-is; implementations escape it so it cannot mention anyone.
    async fn send_message(&self, channel_id: &str, thread_ts: &str, text: &str) -> Void;

    /// Send a message only `user_id` can see.
    async fn send_ephemeral(&self, channel_id: &str, user_id: &str, text: &str) -> Void;

    /// Delete a message.
    async fn delete_message(&self, channel_id: &str, ts: &str) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
