use std::sync::Arc;

use calmirror_core::{CalendarActions, SyncCoordinator, WatchChannelManager};

use crate::directory::FileUserDirectory;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SyncCoordinator>,
    pub watch: Arc<WatchChannelManager>,
    pub actions: Arc<CalendarActions>,
    /// The same directory the coordinator reads, kept concrete for registration.
    pub directory: Arc<FileUserDirectory>,
}

impl AppState {
    pub fn new(coordinator: Arc<SyncCoordinator>, directory: Arc<FileUserDirectory>) -> Self {
        let watch = Arc::new(WatchChannelManager::new(coordinator.clone()));
        Self::with_watch(watch, directory)
    }

    pub fn with_watch(watch: Arc<WatchChannelManager>, directory: Arc<FileUserDirectory>) -> Self {
        AppState {
            coordinator: watch.coordinator().clone(),
            actions: Arc::new(CalendarActions::new(watch.clone())),
            watch,
            directory,
        }
    }
}
