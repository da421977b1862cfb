//! Library root for `impression-relay`.
//!
//! Impression-relay is a Slack bot for anonymous, moderated feedback:
//! - Users submit an "impression" about a thread through a message shortcut and form
//! - Submissions are stored as pending and posted to a review channel with accept/deny buttons
//! - Accepted impressions are relayed anonymously into the original thread
//!
//! The bot integrates with Slack for chat and SurrealDB for storage. The
//! architecture is built around traits that allow for different implementations
//! of each service.

pub mod base;
pub mod interaction;
pub mod prelude;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// What the binary should do once the runtime is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Serve chat events until shutdown.
    Serve,
    /// Publish cards for orphaned submissions, then exit.
    ReconcileOnly,
}

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the relay runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with database and chat clients
/// - Starts the event loop, or runs a single reconciliation pass
pub async fn start(config: Config, mode: Mode) -> Void {
    info!("Starting impression-relay ...");

    // Start the crypto provider.
    crypto::ring::default_provider().install_default().map_err(|_| anyhow::anyhow!("Failed to install the crypto provider."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    match mode {
        Mode::Serve => runtime.start().await?,
        Mode::ReconcileOnly => {
            let published = runtime.reconcile().await?;
            info!("Reconciled {} orphaned submission(s).", published);
        }
    }

    Ok(())
}
