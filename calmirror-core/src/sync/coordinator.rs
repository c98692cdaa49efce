//! One sync run per user: full or incremental, with recovery.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::compose::NotificationComposer;
use crate::constants::FULL_SYNC_MONTHS;
use crate::diff::EventMerger;
use crate::error::{CalMirrorError, CalMirrorResult};
use crate::event::MirroredEvent;
use crate::messenger::{Messenger, post_or_log};
use crate::remote::{ListQuery, RemoteCalendar, RemoteConnector};
use crate::state::{EventMirror, TokenStore};
use crate::store::KeyValueStore;
use crate::sync::UserLocks;
use crate::user::{UserAccount, UserDirectory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Incremental,
}

/// What one run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Events in the mirror after the run.
    pub events: usize,
    /// Changes with something to announce.
    pub changes: usize,
    pub notified: bool,
    /// The stored state was discarded and rebuilt by a full sync.
    pub recovered: bool,
}

/// Every page of a listing plus the cursor from the last page.
struct Listing {
    events: Vec<MirroredEvent>,
    next_sync_token: Option<String>,
}

pub struct SyncCoordinator {
    connector: Arc<dyn RemoteConnector>,
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn KeyValueStore>,
    tokens: TokenStore,
    composer: Arc<NotificationComposer>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    locks: UserLocks,
}

impl SyncCoordinator {
    pub fn new(
        connector: Arc<dyn RemoteConnector>,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn KeyValueStore>,
        composer: Arc<NotificationComposer>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        SyncCoordinator {
            connector,
            directory,
            tokens: TokenStore::new(store.clone()),
            store,
            composer,
            messenger,
            clock: Arc::new(SystemClock),
            locks: UserLocks::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_locks(mut self, locks: UserLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn composer(&self) -> &NotificationComposer {
        &self.composer
    }

    pub fn messenger(&self) -> &dyn Messenger {
        self.messenger.as_ref()
    }

    pub fn directory(&self) -> &dyn UserDirectory {
        self.directory.as_ref()
    }

    pub fn locks(&self) -> &UserLocks {
        &self.locks
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Look up a user, failing with `UserNotConnected` when unknown.
    pub async fn account(&self, user_id: &str) -> CalMirrorResult<UserAccount> {
        self.directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| CalMirrorError::UserNotConnected(user_id.to_string()))
    }

    pub async fn remote(&self, account: &UserAccount) -> CalMirrorResult<Arc<dyn RemoteCalendar>> {
        self.connector.connect(account).await
    }

    /// The remote calendar's zone, or UTC when it can't be determined.
    pub async fn time_zone(&self, remote: &dyn RemoteCalendar) -> Tz {
        match remote.time_zone().await {
            Ok(name) => name.parse().unwrap_or_else(|_| {
                tracing::warn!(zone = %name, "unknown time zone, using UTC");
                Tz::UTC
            }),
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch time zone, using UTC");
                Tz::UTC
            }
        }
    }

    /// Bring the user's mirror up to date with the remote.
    pub async fn sync(&self, user_id: &str) -> CalMirrorResult<SyncReport> {
        let _guard = self.locks.lock(user_id).await;
        self.sync_locked(user_id).await
    }

    /// [`Self::sync`] for callers already holding the user's guard.
    pub(crate) async fn sync_locked(&self, user_id: &str) -> CalMirrorResult<SyncReport> {
        let account = self.account(user_id).await?;
        let remote = self.remote(&account).await?;

        match self.run(&account, remote.as_ref()).await {
            Err(e) if e.requires_full_resync() => {
                tracing::warn!(user = user_id, error = %e, "discarding local state, running full sync");
                self.reset(user_id).await?;

                let mut report = self.full_sync(&account, remote.as_ref()).await?;
                report.recovered = true;
                Ok(report)
            }
            result => result,
        }
    }

    /// Forget the cursor and the mirror so the next run is a full sync.
    pub(crate) async fn reset(&self, user_id: &str) -> CalMirrorResult<()> {
        self.tokens.clear_sync_cursor(user_id).await?;
        EventMirror::clear(&self.store, user_id).await
    }

    /// Drop the user's credentials and unregister them. Later syncs fail with
    /// `UserNotConnected` and sweeps skip them.
    pub(crate) async fn forget(&self, user_id: &str) -> CalMirrorResult<()> {
        self.connector.forget(user_id).await?;
        self.directory.remove_user(user_id).await
    }

    async fn run(
        &self,
        account: &UserAccount,
        remote: &dyn RemoteCalendar,
    ) -> CalMirrorResult<SyncReport> {
        match self.tokens.sync_cursor(&account.user_id).await? {
            Some(cursor) => self.incremental_sync(account, remote, cursor).await,
            None => self.full_sync(account, remote).await,
        }
    }

    async fn full_sync(
        &self,
        account: &UserAccount,
        remote: &dyn RemoteCalendar,
    ) -> CalMirrorResult<SyncReport> {
        let user_id = account.user_id.as_str();
        let time_min = self.clock.now();
        let time_max = time_min
            .checked_add_months(Months::new(FULL_SYNC_MONTHS))
            .unwrap_or(time_min);

        let listing = fetch_all(remote, &ListQuery::Window { time_min, time_max }).await?;
        let mirror = EventMirror::from_listing(listing.events);

        self.commit(user_id, &mirror, listing.next_sync_token.as_deref())
            .await?;

        tracing::info!(user = user_id, events = mirror.len(), "full sync complete");

        Ok(SyncReport {
            mode: SyncMode::Full,
            events: mirror.len(),
            changes: 0,
            notified: false,
            recovered: false,
        })
    }

    async fn incremental_sync(
        &self,
        account: &UserAccount,
        remote: &dyn RemoteCalendar,
        cursor: String,
    ) -> CalMirrorResult<SyncReport> {
        let user_id = account.user_id.as_str();
        let listing = fetch_all(remote, &ListQuery::Changes { sync_token: cursor }).await?;

        let mirror = EventMirror::load(&self.store, user_id)
            .await?
            .ok_or_else(|| CalMirrorError::MalformedMirror {
                user: user_id.to_string(),
                reason: "cursor stored without events".into(),
            })?;

        let outcome = EventMerger::merge(mirror, &listing.events);
        self.commit(user_id, &outcome.mirror, listing.next_sync_token.as_deref())
            .await?;

        let summary = outcome.summary;
        let mut notified = false;
        if account.allow_notify && summary.has_semantic_change() && !summary.self_authored {
            let tz = self.time_zone(remote).await;
            let text = self.composer.compose(&summary, tz, self.clock.now());
            if summary.should_notify(&text) {
                post_or_log(self.messenger.as_ref(), user_id, &text).await;
                notified = true;
            }
        }

        tracing::info!(
            user = user_id,
            fetched = listing.events.len(),
            changes = summary.meaningful_count(),
            notified,
            "incremental sync complete"
        );

        Ok(SyncReport {
            mode: SyncMode::Incremental,
            events: outcome.mirror.len(),
            changes: summary.meaningful_count(),
            notified,
            recovered: false,
        })
    }

    /// Mirror first, then cursor. A run interrupted in between replays the same
    /// changes next time, and they merge as no-ops.
    async fn commit(
        &self,
        user_id: &str,
        mirror: &EventMirror,
        next_sync_token: Option<&str>,
    ) -> CalMirrorResult<()> {
        mirror.save(&self.store, user_id).await?;
        match next_sync_token {
            Some(token) => self.tokens.set_sync_cursor(user_id, token).await,
            None => {
                tracing::warn!(user = user_id, "listing ended without a sync token");
                self.tokens.clear_sync_cursor(user_id).await
            }
        }
    }
}

/// Follow page tokens to the end. Nothing is returned unless every page succeeded.
async fn fetch_all(remote: &dyn RemoteCalendar, query: &ListQuery) -> CalMirrorResult<Listing> {
    let mut events = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = remote.list_events(query, page_token.as_deref()).await?;
        pages += 1;
        events.extend(page.events);

        match page.next_page_token {
            Some(next) if !next.is_empty() => page_token = Some(next),
            _ => {
                tracing::debug!(
                    pages,
                    events = events.len(),
                    incremental = query.is_incremental(),
                    "listing fetched"
                );
                return Ok(Listing {
                    events,
                    next_sync_token: page.next_sync_token,
                });
            }
        }
    }
}
