//! Per-user sync state: cursor, channel descriptor and the event mirror.

mod mirror;
mod token_store;

pub use mirror::EventMirror;
pub use token_store::TokenStore;

#[cfg(test)]
pub(crate) use mirror::tests::event_at;
