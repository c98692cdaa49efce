//! Google Calendar provider for calmirror.
//!
//! Talks to the Calendar v3 REST API for one user's primary calendar and
//! refreshes stored OAuth sessions when they expire.

mod client;
mod connector;
mod convert;
pub mod session;
pub mod wire;

pub use client::{API_BASE, GoogleCalendar};
pub use connector::GoogleConnector;
pub use convert::{FromGoogle, ToGoogle};
pub use session::Credentials;
