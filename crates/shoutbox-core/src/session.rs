use std::sync::Arc;

use shoutbox_db::Database;
use shoutbox_types::models::Identity;
use shoutbox_types::settings::ChatSettings;

use crate::error::ChatResult;

/// Tracks which users are currently present in the chat, one row per
/// registered user, refreshed on every qualifying action.
pub struct SessionTracker {
    db: Arc<Database>,
    settings: ChatSettings,
}

impl SessionTracker {
    pub fn new(db: Arc<Database>, settings: ChatSettings) -> Self {
        Self { db, settings }
    }

    /// Refreshes the caller's presence row, creating it on first activity.
    /// Returns true when a new session row was created. Anonymous,
    /// unregistered and bot identities never reach the store.
    pub fn touch(&self, identity: &Identity, now: i64) -> ChatResult<bool> {
        if !identity.tracks_presence() {
            return Ok(false);
        }

        Ok(self.db.touch_session(identity.user_id, &identity.ip, now)?)
    }

    /// Removes sessions idle past the session window. Idempotent; running it
    /// twice back to back removes nothing the second time.
    pub fn gc(&self, now: i64) -> ChatResult<usize> {
        let cutoff = now - self.settings.session_window();
        Ok(self.db.delete_expired_sessions(cutoff)?)
    }
}
