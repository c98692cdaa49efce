use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// One async mutex per user.
///
/// Everything that reads and rewrites a user's mirror or cursor holds that user's
/// guard. Different users never contend; the map itself is locked only while an
/// entry is looked up or released. An entry lives only while someone holds or
/// waits for it.
#[derive(Default, Clone)]
pub struct UserLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Exclusive access to one user's state until dropped.
pub struct UserGuard {
    guard: Option<OwnedMutexGuard<()>>,
    user_id: String,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map's own reference left: nobody holds or waits
        if locks
            .get(&self.user_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s state.
    pub async fn lock(&self, user_id: &str) -> UserGuard {
        let guard = self.entry(user_id).lock_owned().await;
        UserGuard {
            guard: Some(guard),
            user_id: user_id.to_string(),
            locks: Arc::clone(&self.locks),
        }
    }

    fn entry(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        // A poisoned map still holds valid entries
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
