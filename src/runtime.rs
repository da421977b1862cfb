//! Runtime services and shared state for the impression relay.

use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::review,
    service::{chat::ChatClient, db::DbClient},
};

/// Runtime service context that can be shared across the application.
///
/// Holds the store, the chat client, and the configuration. All three are
/// `Arc` handles, so cloning is cheap.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The database client instance.
    pub db: DbClient,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the database.
        let db = DbClient::surreal(&config).await?;

        // Initialize the chat client.
        let chat = ChatClient::slack(&config, db.clone()).await?;

        Ok(Self { config, db, chat })
    }

    /// Publish review cards for any submission left without one.
    pub async fn reconcile(&self) -> Res<usize> {
        review::reconcile_orphans(&self.config, &self.db, &self.chat).await
    }

    /// Serve chat events until shutdown.
    pub async fn start(&self) -> Void {
        if self.config.reconcile_on_start {
            let published = self.reconcile().await?;
            info!("Reconciled {} orphaned submission(s).", published);
        }

        self.chat.start().await
    }
}
