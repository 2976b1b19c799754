use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chat_sessions (
            user_id          INTEGER PRIMARY KEY,
            user_ip          TEXT NOT NULL DEFAULT '',
            user_lastupdate  INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_lastupdate
            ON chat_sessions(user_lastupdate);

        CREATE TABLE IF NOT EXISTS chat_messages (
            message_id   INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      INTEGER NOT NULL DEFAULT 0,
            user_ip      TEXT NOT NULL DEFAULT '',
            message      TEXT NOT NULL DEFAULT '',
            message_time INTEGER NOT NULL DEFAULT 0,
            post_id      INTEGER NOT NULL DEFAULT 0,
            forum_id     INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_user_time
            ON chat_messages(user_id, message_time);

        CREATE TABLE IF NOT EXISTS chat_message_log (
            log_id     INTEGER PRIMARY KEY AUTOINCREMENT,
            log_kind   INTEGER NOT NULL,
            user_id    INTEGER NOT NULL DEFAULT 0,
            message_id INTEGER NOT NULL DEFAULT 0,
            log_ip     TEXT NOT NULL DEFAULT '',
            log_time   INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_chat_message_log_message
            ON chat_message_log(message_id);
        ",
    )?;

    info!("Chat schema migrations complete");
    Ok(())
}
