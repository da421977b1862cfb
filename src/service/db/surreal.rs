//! SurrealDB implementation for submission storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tokio::sync::Mutex;

use crate::{
    base::types::{MessageRef, NewSubmission, Submission, SubmissionId, SubmissionStatus},
    prelude::*,
};

use super::{DbClient, GenericDbClient};

/// Fields selected for every submission read; the record id itself is never returned.
const SUBMISSION_FIELDS: &str = "seq, fingerprint, text, status, created_at, reviewed_at, review_ref, origin, review_channel_id";

/// Schema for the submission table.
const SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS submission SCHEMALESS;
DEFINE INDEX IF NOT EXISTS submission_seq ON TABLE submission FIELDS seq UNIQUE;
"#;

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Connects to the database configured by `config`.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }

    /// Creates a client backed by a fresh in-memory database.
    pub async fn surreal_memory() -> Res<Self> {
        let db = any::connect("mem://").await?;
        db.use_ns("test").use_db("test").await?;

        let client = SurrealDbClient::from_connection(db).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

#[derive(Deserialize)]
struct SeqRow {
    seq: i64,
}

/// SurrealDB client implementation.
///
/// Ids are allocated in-process. Creates hold `last_seq` until the record is
/// written, so concurrent submissions never contend in the store; the unique
/// index on `seq` catches a second writer on the same database.
#[derive(Clone)]
struct SurrealDbClient {
    db: Surreal<Any>,
    last_seq: Arc<Mutex<i64>>,
}

impl SurrealDbClient {
    /// Connects, signs in when credentials are configured, and bootstraps the schema.
    #[instrument(name = "SurrealDbClient::new", skip_all)]
    async fn new(config: &Config) -> Res<Self> {
        let db = any::connect(config.db_endpoint.as_str())
            .await
            .map_err(|e| ModerationError::StoreUnavailable(format!("failed to connect to `{}`: {e}", config.db_endpoint)))?;

        if let (Some(username), Some(password)) = (&config.db_username, &config.db_password) {
            db.signin(Root { username: username.as_str(), password: password.as_str() }).await.map_err(|e| ModerationError::StoreUnavailable(format!("failed to sign in: {e}")))?;
        }

        db.use_ns(config.db_namespace.as_str()).use_db(config.db_database.as_str()).await?;

        Self::from_connection(db).await
    }

    async fn from_connection(db: Surreal<Any>) -> Res<Self> {
        db.query(SCHEMA).await?.check().map_err(|e| ModerationError::StoreUnavailable(format!("failed to define schema: {e}")))?;

        let last: Option<SeqRow> = db.query("SELECT seq FROM submission ORDER BY seq DESC LIMIT 1").await?.take(0)?;
        let last_seq = last.map(|row| row.seq).unwrap_or(0);

        info!("Database initialized successfully (last submission id {}).", last_seq);

        Ok(Self {
            db,
            last_seq: Arc::new(Mutex::new(last_seq)),
        })
    }

    async fn update_status(&self, id: SubmissionId, status: SubmissionStatus, reviewed_at: DateTime<Utc>) -> Res<u64> {
        let updated: Vec<i64> = self
            .db
            .query("UPDATE submission SET status = $status, reviewed_at = $reviewed_at WHERE seq = $seq AND status = 'pending' RETURN VALUE seq")
            .bind(("seq", id.0))
            .bind(("status", status.as_str()))
            .bind(("reviewed_at", reviewed_at))
            .await?
            .take(0)?;

        Ok(updated.len() as u64)
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip(self, submission))]
    async fn create_submission(&self, submission: &NewSubmission) -> Res<Submission> {
        let mut last_seq = self.last_seq.lock().await;
        let id = SubmissionId(*last_seq + 1);

        let record = Submission {
            id,
            fingerprint: submission.fingerprint.clone(),
            text: submission.text.clone(),
            status: SubmissionStatus::Pending,
            created_at: Utc::now(),
            reviewed_at: None,
            review_ref: None,
            origin: submission.origin.clone(),
            review_channel_id: submission.review_channel_id.clone(),
        };

        self.db.query("CREATE submission CONTENT $content RETURN NONE").bind(("content", record.clone())).await?.check()?;

        *last_seq = id.0;

        debug!("Created submission {}.", id);

        Ok(record)
    }

    #[instrument(skip(self))]
    async fn get_submission(&self, id: SubmissionId) -> Res<Option<Submission>> {
        let rows: Vec<Submission> = self
            .db
            .query(format!("SELECT {SUBMISSION_FIELDS} FROM submission WHERE seq = $seq"))
            .bind(("seq", id.0))
            .await?
            .take(0)?;

        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn set_review_ref(&self, id: SubmissionId, review_ref: &MessageRef) -> Res<bool> {
        let updated: Vec<i64> = self
            .db
            .query("UPDATE submission SET review_ref = $review_ref WHERE seq = $seq AND (review_ref IS NONE OR review_ref IS NULL) RETURN VALUE seq")
            .bind(("seq", id.0))
            .bind(("review_ref", review_ref.clone()))
            .await?
            .take(0)?;

        Ok(!updated.is_empty())
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: SubmissionId, status: SubmissionStatus, reviewed_at: DateTime<Utc>) -> Res<u64> {
        match self.update_status(id, status, reviewed_at).await {
            Ok(rows) => Ok(rows),
            Err(err) => {
                // A decision committed first aborts this transaction; that is a lost race.
                match self.get_submission(id).await? {
                    Some(current) if current.status.is_terminal() => {
                        debug!("Status update on submission {} lost to `{}`: {}", id, current.status, err);
                        Ok(0)
                    }
                    _ => Err(err),
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn list_orphaned_pending(&self) -> Res<Vec<Submission>> {
        let rows: Vec<Submission> = self
            .db
            .query(format!(
                "SELECT {SUBMISSION_FIELDS} FROM submission WHERE status = 'pending' AND (review_ref IS NONE OR review_ref IS NULL) ORDER BY seq ASC"
            ))
            .await?
            .take(0)?;

        Ok(rows)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn new_submission(text: &str) -> NewSubmission {
        NewSubmission {
            fingerprint: crate::base::fingerprint::fingerprint("pepper", "U1").unwrap(),
            text: text.to_string(),
            origin: MessageRef::new("C1", "1700000000.000100"),
            review_channel_id: "CREVIEW".to_string(),
        }
    }

    #[tokio::test]
    async fn ids_are_monotonic() {
        let db = DbClient::surreal_memory().await.unwrap();

        let first = db.create_submission(&new_submission("one")).await.unwrap();
        let second = db.create_submission(&new_submission("two")).await.unwrap();

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn created_submission_is_pending_and_readable() {
        let db = DbClient::surreal_memory().await.unwrap();

        let created = db.create_submission(&new_submission("nice job")).await.unwrap();
        let loaded = db.get_submission(created.id).await.unwrap().unwrap();

        assert_eq!(loaded.status, SubmissionStatus::Pending);
        assert_eq!(loaded.text, "nice job");
        assert_eq!(loaded.origin, MessageRef::new("C1", "1700000000.000100"));
        assert!(loaded.reviewed_at.is_none());
        assert!(loaded.review_ref.is_none());
        assert_eq!(loaded.review_channel_id, "CREVIEW");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn parallel_creates_all_succeed_with_unique_ids() {
        let db = DbClient::surreal_memory().await.unwrap();

        let tasks = (0..32)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move { db.create_submission(&new_submission(&format!("impression {i}"))).await })
            })
            .collect::<Vec<_>>();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().id);
        }

        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 32);
        assert_eq!(ids.first(), Some(&SubmissionId(1)));
        assert_eq!(ids.last(), Some(&SubmissionId(32)));
    }

    #[tokio::test]
    async fn ids_continue_after_existing_records() {
        let db = any::connect("mem://").await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();

        let first = SurrealDbClient::from_connection(db.clone()).await.unwrap();
        first.create_submission(&new_submission("one")).await.unwrap();
        first.create_submission(&new_submission("two")).await.unwrap();

        let second = SurrealDbClient::from_connection(db).await.unwrap();
        let third = second.create_submission(&new_submission("three")).await.unwrap();

        assert_eq!(third.id, SubmissionId(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_status_changes_have_one_winner() {
        let db = DbClient::surreal_memory().await.unwrap();

        for _ in 0..20 {
            let created = db.create_submission(&new_submission("text")).await.unwrap();

            let accept = {
                let db = db.clone();
                tokio::spawn(async move { db.set_status(created.id, SubmissionStatus::Accepted, Utc::now()).await })
            };
            let deny = {
                let db = db.clone();
                tokio::spawn(async move { db.set_status(created.id, SubmissionStatus::Denied, Utc::now()).await })
            };

            let mut rows = vec![accept.await.unwrap().unwrap(), deny.await.unwrap().unwrap()];
            rows.sort();

            assert_eq!(rows, vec![0, 1]);
        }
    }

    #[tokio::test]
    async fn missing_submission_is_none() {
        let db = DbClient::surreal_memory().await.unwrap();

        assert!(db.get_submission(SubmissionId(9999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn review_ref_is_set_at_most_once() {
        let db = DbClient::surreal_memory().await.unwrap();
        let created = db.create_submission(&new_submission("text")).await.unwrap();

        assert!(db.set_review_ref(created.id, &MessageRef::new("CREVIEW", "1.1")).await.unwrap());
        assert!(!db.set_review_ref(created.id, &MessageRef::new("CREVIEW", "2.2")).await.unwrap());

        let loaded = db.get_submission(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.review_ref, Some(MessageRef::new("CREVIEW", "1.1")));
    }

    #[tokio::test]
    async fn status_changes_only_once() {
        let db = DbClient::surreal_memory().await.unwrap();
        let created = db.create_submission(&new_submission("text")).await.unwrap();

        assert_eq!(db.set_status(created.id, SubmissionStatus::Accepted, Utc::now()).await.unwrap(), 1);
        assert_eq!(db.set_status(created.id, SubmissionStatus::Denied, Utc::now()).await.unwrap(), 0);

        let loaded = db.get_submission(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SubmissionStatus::Accepted);
        assert!(loaded.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn status_change_on_missing_submission_touches_nothing() {
        let db = DbClient::surreal_memory().await.unwrap();

        assert_eq!(db.set_status(SubmissionId(9999), SubmissionStatus::Accepted, Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn orphaned_lists_only_pending_without_card() {
        let db = DbClient::surreal_memory().await.unwrap();

        let orphan = db.create_submission(&new_submission("orphan")).await.unwrap();
        let carded = db.create_submission(&new_submission("carded")).await.unwrap();
        let decided = db.create_submission(&new_submission("decided")).await.unwrap();

        db.set_review_ref(carded.id, &MessageRef::new("CREVIEW", "1.1")).await.unwrap();
        db.set_status(decided.id, SubmissionStatus::Denied, Utc::now()).await.unwrap();

        let orphans = db.list_orphaned_pending().await.unwrap();

        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, orphan.id);
    }
}
