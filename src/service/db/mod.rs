pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::base::types::{MessageRef, NewSubmission, Res, Submission, SubmissionId, SubmissionStatus};

// Traits.

/// Generic database client trait that clients must implement.
///
/// This trait defines the persistence operations of the moderation flow.
/// Implementing this trait allows different database backends to be used
/// with the relay.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Creates a new pending submission and returns it with its assigned id.
    ///
    /// Ids are unique and monotonically increasing.
    async fn create_submission(&self, submission: &NewSubmission) -> Res<Submission>;

    /// Gets a submission by its id.
    async fn get_submission(&self, id: SubmissionId) -> Res<Option<Submission>>;

    /// Records the review card of a submission.
    ///
    /// The reference is only written when none is set yet; returns whether it was written.
    async fn set_review_ref(&self, id: SubmissionId, review_ref: &MessageRef) -> Res<bool>;

    /// Atomically moves a pending submission to `status`, stamping `reviewed_at`.
    ///
    /// Only rows that are still pending are touched. Returns the number of rows updated,
    /// so two racing decisions on the same id yield exactly one `1`.
    async fn set_status(&self, id: SubmissionId, status: SubmissionStatus, reviewed_at: DateTime<Utc>) -> Res<u64>;

    /// Lists pending submissions that never got a review card, oldest first.
    async fn list_orphaned_pending(&self) -> Res<Vec<Submission>>;
}

// Structs.

/// Database client for the relay.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}
