//! Core engine for calmirror.
//!
//! This crate keeps a local mirror of a user's remote calendar up to date and
//! turns what changed into chat messages:
//! - `sync` runs full and incremental syncs, one user at a time
//! - `diff` merges changed events into the mirror
//! - `compose` renders change summaries and reminders
//! - `watch` manages push channels and inbound webhooks
//!
//! Providers implement the contracts in `remote`; hosts supply a `KeyValueStore`,
//! a `UserDirectory` and a `Messenger`.

pub mod actions;
pub mod clock;
pub mod compose;
pub mod constants;
pub mod diff;
pub mod error;
pub mod event;
pub mod messenger;
pub mod reminder;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;
pub mod user;
pub mod watch;

pub use actions::CalendarActions;
pub use compose::NotificationComposer;
pub use error::{CalMirrorError, CalMirrorResult};
pub use event::*;
pub use sync::{SyncCoordinator, SyncMode, SyncReport};
pub use watch::{WatchChannelManager, WebhookNotification, WebhookOutcome};
