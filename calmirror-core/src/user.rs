//! Connected users, as seen by the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CalMirrorResult;

fn default_remind_before_minutes() -> i64 {
    10
}

fn default_allow_notify() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    /// Whether change notifications and reminders are delivered.
    #[serde(default = "default_allow_notify")]
    pub allow_notify: bool,
    #[serde(default = "default_remind_before_minutes")]
    pub remind_before_minutes: i64,
}

impl UserAccount {
    pub fn new(user_id: impl Into<String>) -> Self {
        UserAccount {
            user_id: user_id.into(),
            email: String::new(),
            allow_notify: default_allow_notify(),
            remind_before_minutes: default_remind_before_minutes(),
        }
    }
}

/// Source of connected users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &str) -> CalMirrorResult<Option<UserAccount>>;

    /// One page of users, ordered by id. Pages are 1-based; a page past the end is
    /// empty.
    async fn list_users(&self, page: usize, limit: usize) -> CalMirrorResult<Vec<UserAccount>>;

    /// Forget the user. Removing an unknown user is not an error.
    async fn remove_user(&self, user_id: &str) -> CalMirrorResult<()>;
}
