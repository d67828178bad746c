/// Application name
pub const APP_NAME: &str = "Coral";

/// Number of events kept in a summary's recent-contributions window
pub const RECENT_CONTRIBUTIONS_LIMIT: usize = 10;

/// Maximum length of an award reason, in characters
pub const MAX_REASON_CHARS: usize = 500;

/// Maximum length of a user id, in bytes
pub const MAX_USER_ID_LEN: usize = 128;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default page size for history queries
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
