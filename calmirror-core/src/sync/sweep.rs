//! Bounded fan-out over every connected user.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::CalMirrorResult;
use crate::user::{UserAccount, UserDirectory};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub users: usize,
    pub failures: usize,
}

/// Run `job` for every user in the directory.
///
/// Users are listed a page at a time. At most `max_concurrency` jobs run at once,
/// and a page finishes completely before the next one is listed. Job failures are
/// logged and counted; only a failing directory aborts the sweep.
pub async fn sweep<F, Fut>(
    directory: &dyn UserDirectory,
    page_size: usize,
    max_concurrency: usize,
    job: F,
) -> CalMirrorResult<SweepStats>
where
    F: Fn(UserAccount) -> Fut,
    Fut: Future<Output = CalMirrorResult<()>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut stats = SweepStats::default();
    let mut page = 1;

    loop {
        let users = directory.list_users(page, page_size.max(1)).await?;
        if users.is_empty() {
            break;
        }

        let mut tasks = JoinSet::new();
        for user in users {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let user_id = user.user_id.clone();
            let fut = job(user);
            tasks.spawn(async move {
                let _permit = permit;
                (user_id, fut.await)
            });
            stats.users += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((user_id, Err(e))) => {
                    stats.failures += 1;
                    tracing::warn!(user = %user_id, error = %e, "sweep job failed");
                }
                Err(e) => {
                    stats.failures += 1;
                    tracing::error!(error = %e, "sweep job panicked");
                }
            }
        }

        tracing::debug!(page, users = stats.users, "sweep page done");
        page += 1;
    }

    Ok(stats)
}
