//! Running syncs: per-user exclusivity, the coordinator, and the sweep pool.

mod coordinator;
mod locks;
mod sweep;

pub use coordinator::{SyncCoordinator, SyncMode, SyncReport};
pub use locks::{UserGuard, UserLocks};
pub use sweep::{SweepStats, sweep};
