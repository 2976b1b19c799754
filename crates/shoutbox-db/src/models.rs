/// Database row types that map directly to SQLite rows.
/// Distinct from the shoutbox-types API models to keep the DB layer independent.

pub struct SessionRow {
    pub user_id: i64,
    pub user_ip: String,
    pub user_lastupdate: i64,
}

/// A chat message joined against the host `users` table.
/// `username` is `None` when the author no longer exists.
pub struct MessageRow {
    pub message_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub user_ip: String,
    pub message: String,
    pub message_time: i64,
    pub post_id: i64,
    pub forum_id: i64,
}

/// A chat session joined against the host `sessions` table (online-visibility
/// flag) and `users` (display name).
pub struct PresenceRow {
    pub user_id: i64,
    pub username: String,
    pub viewonline: bool,
}

pub struct LogRow {
    pub log_id: i64,
    pub log_kind: i64,
    pub user_id: i64,
    pub message_id: i64,
    pub log_ip: String,
    pub log_time: i64,
}

pub struct AuthorRow {
    pub user_id: i64,
    pub message_time: i64,
    pub post_id: i64,
}
