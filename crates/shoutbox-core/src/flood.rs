use std::sync::Arc;

use shoutbox_db::Database;
use shoutbox_types::models::UserId;
use shoutbox_types::settings::ChatSettings;

use crate::error::ChatResult;
use crate::seams::{Capabilities, Capability};

/// Gates new-message submission on the spacing between a user's messages.
pub struct FloodGuard {
    db: Arc<Database>,
    settings: ChatSettings,
    capabilities: Arc<dyn Capabilities>,
}

impl FloodGuard {
    pub fn new(db: Arc<Database>, settings: ChatSettings, capabilities: Arc<dyn Capabilities>) -> Self {
        Self {
            db,
            settings,
            capabilities,
        }
    }

    /// Whether the user must wait before posting again. A denial is an
    /// ordinary result, not an error: callers check this before inserting.
    pub fn is_flooding(&self, user_id: UserId, now: i64) -> ChatResult<bool> {
        let window = self.settings.flood_time;
        if window == 0
            || self
                .capabilities
                .has_capability(user_id, Capability::FloodExempt)
        {
            return Ok(false);
        }

        let last = self.db.latest_message_time(user_id)?;
        Ok(match last {
            Some(message_time) => now - message_time < window,
            None => false,
        })
    }
}
