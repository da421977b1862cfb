//! Common types shared by the services and interaction handlers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Monotonically assigned identifier of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub i64);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubmissionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(SubmissionId)
    }
}

/// Moderation status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Denied,
}

impl SubmissionStatus {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a chat message: the channel it lives in and its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: String,
    pub ts: String,
}

impl MessageRef {
    pub fn new(channel_id: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ts: ts.into(),
        }
    }
}

/// A persisted anonymous submission.
///
/// Stored with `seq` as the numeric key; the datastore's own record id is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "seq")]
    pub id: SubmissionId,
    pub fingerprint: String,
    pub text: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_ref: Option<MessageRef>,
    /// The thread the submission was made from; `ts` is the thread root and accepted text is posted there.
    pub origin: MessageRef,
    /// Channel the review card belongs in. Empty for records written before it was stored.
    #[serde(default)]
    pub review_channel_id: String,
}

/// The fields needed to create a new pending submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub fingerprint: String,
    pub text: String,
    pub origin: MessageRef,
    pub review_channel_id: String,
}

// Intents.
//
// These are the platform-neutral shapes of the inbound chat events.

/// A user invoked the "submit impression" shortcut on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitIntent {
    pub user_id: String,
    pub trigger_id: String,
    /// Channel and thread the shortcut was invoked in.
    pub origin: MessageRef,
}

/// A user submitted the impression form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub user_id: String,
    pub origin: MessageRef,
    pub text: String,
}

/// A reviewer clicked one of the buttons on a review card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionIntent {
    pub decision: Decision,
    pub submission_id: SubmissionId,
    pub actor_id: String,
    /// The card that was clicked. Private notices to the reviewer go to its channel.
    pub card: MessageRef,
}

/// A user invoked the "delete" shortcut on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteIntent {
    pub user_id: String,
    pub target: MessageRef,
}

/// A reviewer decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Deny,
}

impl Decision {
    /// Action id carried by the review card button.
    pub fn action_id(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Deny => "deny",
        }
    }

    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            "accept" => Some(Decision::Accept),
            "deny" => Some(Decision::Deny),
            _ => None,
        }
    }
}
