use std::sync::Arc;

use shoutbox_db::Database;
use shoutbox_types::models::{Identity, MessageId, UserId};
use shoutbox_types::settings::{ChatSettings, PruneMode};
use tracing::debug;

use crate::error::ChatResult;
use crate::history::MessageHistory;
use crate::seams::{AuditEvent, AuditSink, ChatHooks};

/// Policy-driven bulk deletion of chat messages with cascading history
/// cleanup. Stateless between calls. Selection and deletion are two steps:
/// an insert racing into the candidate window survives until the next run
/// (under-pruning, never over-pruning).
pub struct PruneEngine {
    db: Arc<Database>,
    settings: ChatSettings,
    history: Arc<MessageHistory>,
    audit: Arc<dyn AuditSink>,
    hooks: Arc<dyn ChatHooks>,
}

impl PruneEngine {
    pub fn new(
        db: Arc<Database>,
        settings: ChatSettings,
        history: Arc<MessageHistory>,
        audit: Arc<dyn AuditSink>,
        hooks: Arc<dyn ChatHooks>,
    ) -> Self {
        Self {
            db,
            settings,
            history,
            audit,
            hooks,
        }
    }

    /// Prunes per the configured retention policy, or everything authored by
    /// `user_ids` when non-empty (user-removal cascades). Returns the pruned
    /// message ids; an unrecognized prune mode prunes nothing.
    pub fn prune(
        &self,
        actor: &Identity,
        user_ids: &[UserId],
        now: i64,
    ) -> ChatResult<Vec<MessageId>> {
        let Some(mode) = self.settings.prune_mode() else {
            return Ok(Vec::new());
        };

        let candidates = if !user_ids.is_empty() {
            self.db.message_ids_by_authors(user_ids)?
        } else {
            match mode {
                PruneMode::Count => self.db.message_ids_beyond_newest(self.settings.prune_num)?,
                PruneMode::Age { unit_hours } => {
                    let cutoff = now - self.settings.prune_num * unit_hours * 3600;
                    self.db.message_ids_older_than(cutoff)?
                }
            }
        };

        self.hooks.before_prune(&candidates);

        if candidates.is_empty() {
            return Ok(candidates);
        }

        self.db.delete_messages(&candidates)?;
        self.db.delete_logs_for_messages(&candidates)?;
        self.history.invalidate_cache();

        debug!("Pruned {} chat messages", candidates.len());

        // User-scoped cascades are reported by whoever removed the users;
        // only the general prune records an event here.
        if user_ids.is_empty() {
            self.audit.record(&AuditEvent {
                actor: actor.user_id,
                ip: actor.ip.clone(),
                event: "chat_table_pruned",
                details: vec![candidates.len().to_string()],
            });
        }

        Ok(candidates)
    }
}
