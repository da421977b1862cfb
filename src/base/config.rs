//! Load configuration via `config` crate with env-override support.

use std::{collections::HashSet, ops::Deref, sync::Arc};

use serde::Deserialize;

use super::{error::ModerationError, types::Res};

/// Keys that may be given as comma separated lists in the environment.
const LIST_KEYS: [&str; 4] = ["override_user_ids", "admin_user_ids", "denied_user_ids", "permitted_channel_ids"];

/// Default database endpoint (in-memory).
fn default_db_endpoint() -> String {
    "mem://".to_string()
}

/// Default database namespace.
fn default_db_namespace() -> String {
    "impressions".to_string()
}

/// Default database name.
fn default_db_database() -> String {
    "relay".to_string()
}

/// Default callback id of the "submit impression" message shortcut.
fn default_submit_callback_id() -> String {
    "submit_impression".to_string()
}

/// Default callback id of the "delete message" shortcut.
fn default_delete_callback_id() -> String {
    "delete_impression".to_string()
}

/// Default number of fingerprint characters shown on review cards.
fn default_fingerprint_display_len() -> usize {
    8
}

/// Default maximum submission length, in characters.
fn default_max_text_len() -> usize {
    3000
}

fn default_true() -> bool {
    true
}

/// Configuration for the impression relay.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// Slack app token (`SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Slack signing secret (`SLACK_SIGNING_SECRET`).
    pub slack_signing_secret: String,
    /// Key for submitter fingerprints (`FINGERPRINT_SECRET`). Changing it changes every fingerprint.
    pub fingerprint_secret: String,
    /// Database endpoint URL (`DB_ENDPOINT`), e.g. `mem://` or `ws://localhost:8000`.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`).
    #[serde(default)]
    pub db_username: Option<String>,
    /// Database password (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: Option<String>,
    /// Database namespace (`DB_NAMESPACE`).
    #[serde(default = "default_db_namespace")]
    pub db_namespace: String,
    /// Database name (`DB_DATABASE`).
    #[serde(default = "default_db_database")]
    pub db_database: String,
    /// Channel where review cards are posted (`REVIEW_CHANNEL_ID`).
    pub review_channel_id: String,
    /// Review channel used for submissions made by override users (`REVIEW_OVERRIDE_CHANNEL_ID`).
    #[serde(default)]
    pub review_override_channel_id: Option<String>,
    /// Users allowed to submit from any channel (`OVERRIDE_USER_IDS`).
    #[serde(default)]
    pub override_user_ids: HashSet<String>,
    /// Users allowed to delete bot messages (`ADMIN_USER_IDS`).
    #[serde(default)]
    pub admin_user_ids: HashSet<String>,
    /// Users who may not submit (`DENIED_USER_IDS`).
    #[serde(default)]
    pub denied_user_ids: HashSet<String>,
    /// Channels submissions may originate from (`PERMITTED_CHANNEL_IDS`).
    #[serde(default)]
    pub permitted_channel_ids: HashSet<String>,
    /// Callback id of the submit shortcut (`SUBMIT_CALLBACK_ID`).
    #[serde(default = "default_submit_callback_id")]
    pub submit_callback_id: String,
    /// Callback id of the delete shortcut (`DELETE_CALLBACK_ID`).
    #[serde(default = "default_delete_callback_id")]
    pub delete_callback_id: String,
    /// Fingerprint characters shown on review cards (`FINGERPRINT_DISPLAY_LEN`).
    #[serde(default = "default_fingerprint_display_len")]
    pub fingerprint_display_len: usize,
    /// Maximum submission length in characters (`MAX_TEXT_LEN`).
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
    /// Publish cards for orphaned pending submissions at startup (`RECONCILE_ON_START`).
    #[serde(default = "default_true")]
    pub reconcile_on_start: bool,
}

impl ConfigInner {
    /// Review destination for submissions made by `user_id`.
    pub fn review_channel_for(&self, user_id: &str) -> &str {
        match &self.review_override_channel_id {
            Some(channel) if self.override_user_ids.contains(user_id) => channel,
            _ => &self.review_channel_id,
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut env = config::Environment::default().prefix("IMPRESSION_RELAY").try_parsing(true).list_separator(",");

        for key in LIST_KEYS {
            env = env.with_list_parse_key(key);
        }

        let mut cfg = config::Config::builder().add_source(env);

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let inner: ConfigInner = cfg.build()?.try_deserialize().map_err(|e| ModerationError::ConfigMissing(e.to_string()))?;
        let result = Config::from(inner);

        result.validate()?;

        Ok(result)
    }

    /// Checks the loaded values for anything that would prevent serving.
    pub fn validate(&self) -> Res<()> {
        let required = [
            ("slack_app_token", &self.slack_app_token),
            ("slack_bot_token", &self.slack_bot_token),
            ("slack_signing_secret", &self.slack_signing_secret),
            ("fingerprint_secret", &self.fingerprint_secret),
            ("review_channel_id", &self.review_channel_id),
            ("db_endpoint", &self.db_endpoint),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ModerationError::ConfigMissing(format!("`{name}` must be set.")).into());
            }
        }

        if self.permitted_channel_ids.is_empty() && self.override_user_ids.is_empty() {
            return Err(ModerationError::ConfigMissing("at least one of `permitted_channel_ids` or `override_user_ids` must be set.".to_string()).into());
        }

        if self.fingerprint_display_len < 1 || self.fingerprint_display_len > 64 {
            return Err(anyhow::anyhow!("Fingerprint display length must be between 1 and 64."));
        }

        if self.max_text_len < 1 || self.max_text_len > 3000 {
            return Err(anyhow::anyhow!("Max text length must be between 1 and 3000."));
        }

        Ok(())
    }
}
