/// Store key holding the serialized mirror.
pub const EVENTS_KEY: &str = "events";
/// Store key holding the incremental sync cursor.
pub const SYNC_TOKEN_KEY: &str = "sync_token";
/// Store key holding the watch channel descriptor.
pub const WATCH_CHANNEL_KEY: &str = "watch_channel";

/// How far ahead a full sync looks.
pub const FULL_SYNC_MONTHS: u32 = 1;

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_CONCURRENT_SYNCS: usize = 20;

/// Resource state sent by the remote when a channel is first opened.
pub const RESOURCE_STATE_SYNC: &str = "sync";

pub const MSG_CONNECT_FIRST: &str =
    "Please connect your google calendar with command => `/calendar connect`";
pub const MSG_WELCOME: &str = "#### Welcome to the Google Calendar integration!\n\
    You've successfully connected your account to your Google Calendar.\n\
    Please type **/calendar help** to understand how to use this integration.";
pub const MSG_HANDSHAKE: &str =
    "Google Calendar notifications have synchronized with your account!";
pub const MSG_DISCONNECTED: &str = "Disconnected calendar";
pub const MSG_DELETE_NOT_ORGANIZER: &str = "You can only delete events that you have created.";
