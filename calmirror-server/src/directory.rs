//! Users registered on disk: `<users_dir>/<user>/account.toml`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use calmirror_core::store::path_segment;
use calmirror_core::user::{UserAccount, UserDirectory};
use calmirror_core::{CalMirrorError, CalMirrorResult};

const ACCOUNT_FILE: &str = "account.toml";

pub struct FileUserDirectory {
    root: PathBuf,
}

impl FileUserDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileUserDirectory { root: root.into() }
    }

    fn account_path(&self, user_id: &str) -> PathBuf {
        self.root.join(path_segment(user_id)).join(ACCOUNT_FILE)
    }

    /// Register a user, or rewrite their settings.
    pub async fn save(&self, account: &UserAccount) -> CalMirrorResult<()> {
        let path = self.account_path(&account.user_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = toml::to_string_pretty(account)
            .map_err(|e| CalMirrorError::Store(format!("Failed to serialize account: {e}")))?;
        tokio::fs::write(&path, contents).await?;
        Ok(())
    }

    async fn read_account(path: &Path) -> CalMirrorResult<Option<UserAccount>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&contents).map(Some).map_err(|e| {
            CalMirrorError::Store(format!("Failed to parse {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl UserDirectory for FileUserDirectory {
    async fn get_user(&self, user_id: &str) -> CalMirrorResult<Option<UserAccount>> {
        Self::read_account(&self.account_path(user_id)).await
    }

    async fn list_users(&self, page: usize, limit: usize) -> CalMirrorResult<Vec<UserAccount>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut accounts = Vec::new();
        for dir in dirs.iter().skip(page.saturating_sub(1) * limit).take(limit) {
            match Self::read_account(&dir.join(ACCOUNT_FILE)).await {
                Ok(Some(account)) => accounts.push(account),
                Ok(None) => {}
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable account"),
            }
        }
        Ok(accounts)
    }

    async fn remove_user(&self, user_id: &str) -> CalMirrorResult<()> {
        match tokio::fs::remove_dir_all(self.root.join(path_segment(user_id))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_get_and_page() {
        let dir = tempfile::tempdir().unwrap();
        let directory = FileUserDirectory::new(dir.path());

        for id in ["carol", "alice", "bob"] {
            directory.save(&UserAccount::new(id)).await.unwrap();
        }

        let alice = directory.get_user("alice").await.unwrap().unwrap();
        assert_eq!(alice.remind_before_minutes, 10);
        assert!(alice.allow_notify);
        assert!(directory.get_user("dave").await.unwrap().is_none());

        let first: Vec<_> = directory
            .list_users(1, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.user_id)
            .collect();
        assert_eq!(first, vec!["alice", "bob"]);

        let second = directory.list_users(2, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(directory.list_users(3, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hand_written_account_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("u1")).unwrap();
        std::fs::write(
            dir.path().join("u1").join(ACCOUNT_FILE),
            "user_id = \"u1\"\nemail = \"u1@example.com\"\n",
        )
        .unwrap();

        let account = FileUserDirectory::new(dir.path())
            .get_user("u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.email, "u1@example.com");
        assert_eq!(account.remind_before_minutes, 10);
    }

    #[tokio::test]
    async fn removed_user_is_gone_from_lookups_and_listings() {
        let dir = tempfile::tempdir().unwrap();
        let directory = FileUserDirectory::new(dir.path());
        directory.save(&UserAccount::new("alice")).await.unwrap();
        directory.save(&UserAccount::new("bob")).await.unwrap();

        directory.remove_user("alice").await.unwrap();
        directory.remove_user("alice").await.unwrap();
        directory.remove_user("never-registered").await.unwrap();

        assert!(directory.get_user("alice").await.unwrap().is_none());
        let left: Vec<_> = directory
            .list_users(1, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.user_id)
            .collect();
        assert_eq!(left, vec!["bob"]);
    }

    #[tokio::test]
    async fn missing_root_lists_nobody() {
        let dir = tempfile::tempdir().unwrap();
        let directory = FileUserDirectory::new(dir.path().join("nope"));
        assert!(directory.list_users(1, 10).await.unwrap().is_empty());
    }
}
