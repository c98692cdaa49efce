//! Merge of changed remote events into the mirror, and the resulting diffs.

mod change_kind;
mod event_change;
mod merger;
mod summary;

pub use change_kind::ChangeKind;
pub use event_change::{EventChange, Field, FieldDiff};
pub use merger::{EventMerger, MergeOutcome};
pub use summary::ChangeSummary;
