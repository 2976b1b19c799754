use std::sync::Arc;

use shoutbox_db::Database;
use shoutbox_db::models::MessageRow;
use shoutbox_types::models::{
    ANONYMOUS_USER, ChatAction, ChatMessage, Identity, LogKind, MessageAuthor, MessageId,
};

use crate::error::{ChatError, ChatResult};
use crate::filter::MessageFilter;
use crate::history::MessageHistory;
use crate::seams::{AuditEvent, AuditSink, ChatHooks};
use crate::session::SessionTracker;

/// Orchestrates the add/edit/del client actions: hook seam, session touch,
/// store mutation, history append and host log record where applicable.
/// Flood and ownership checks happen upstream, before any call lands here.
pub struct ChatActions {
    db: Arc<Database>,
    sessions: Arc<SessionTracker>,
    history: Arc<MessageHistory>,
    audit: Arc<dyn AuditSink>,
    hooks: Arc<dyn ChatHooks>,
}

impl ChatActions {
    pub fn new(
        db: Arc<Database>,
        sessions: Arc<SessionTracker>,
        history: Arc<MessageHistory>,
        audit: Arc<dyn AuditSink>,
        hooks: Arc<dyn ChatHooks>,
    ) -> Self {
        Self {
            db,
            sessions,
            history,
            audit,
            hooks,
        }
    }

    /// Performs one client action. Returns whether the action opened a new
    /// presence session for the actor.
    pub fn perform(&self, actor: &Identity, action: ChatAction, now: i64) -> ChatResult<bool> {
        self.hooks.before_action(&action);

        let is_new_session = self.sessions.touch(actor, now)?;

        match &action {
            ChatAction::Add(message) => {
                self.db.insert_message(message)?;
            }
            ChatAction::Edit { message_id, patch } => {
                if self.db.update_message(*message_id, patch)? == 0 {
                    return Err(ChatError::MessageNotFound(*message_id));
                }
                self.history.append(LogKind::Edit, *message_id, actor, now)?;
                self.audit.record(&AuditEvent {
                    actor: actor.user_id,
                    ip: actor.ip.clone(),
                    event: "chat_message_edited",
                    details: Vec::new(),
                });
            }
            ChatAction::Delete { message_id } => {
                if self.db.delete_message(*message_id)? == 0 {
                    return Err(ChatError::MessageNotFound(*message_id));
                }
                self.history.append(LogKind::Delete, *message_id, actor, now)?;
                self.audit.record(&AuditEvent {
                    actor: actor.user_id,
                    ip: actor.ip.clone(),
                    event: "chat_message_deleted",
                    details: Vec::new(),
                });
            }
        }

        self.hooks.after_action(&action);
        Ok(is_new_session)
    }
}

/// Read path over the message store.
pub struct MessageReader {
    db: Arc<Database>,
}

impl MessageReader {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// New messages past `since_id` and/or the explicitly requested ids
    /// (edited messages a client re-fetches), newest first. `limit == 0`
    /// means no limit.
    pub fn fetch(
        &self,
        message_ids: &[MessageId],
        since_id: MessageId,
        limit: u32,
        offset: u32,
        filter: Option<&dyn MessageFilter>,
    ) -> ChatResult<Vec<ChatMessage>> {
        let filter_sql = filter.and_then(|f| f.sql_where());
        let rows =
            self.db
                .fetch_messages(message_ids, since_id, limit, offset, filter_sql.as_deref())?;
        Ok(rows.into_iter().map(normalize_author).collect())
    }

    pub fn count(&self, filter: Option<&dyn MessageFilter>) -> ChatResult<i64> {
        let filter_sql = filter.and_then(|f| f.sql_where());
        Ok(self.db.count_messages(filter_sql.as_deref())?)
    }

    /// Author info for ownership checks upstream of edit/delete.
    pub fn author_of(&self, message_id: MessageId) -> ChatResult<Option<MessageAuthor>> {
        let row = self.db.message_author(message_id)?;
        Ok(row.map(|row| MessageAuthor {
            user_id: row.user_id,
            message_time: row.message_time,
            post_id: row.post_id,
        }))
    }
}

/// Messages whose author no longer resolves are re-attributed to the
/// anonymous pseudo-user instead of being dropped. Kept as a step over the
/// fetched rows so the query and the identity policy stay independent.
fn normalize_author(row: MessageRow) -> ChatMessage {
    let user_id = if row.username.is_none() {
        ANONYMOUS_USER
    } else {
        row.user_id
    };
    ChatMessage {
        message_id: row.message_id,
        user_id,
        username: row.username,
        user_ip: row.user_ip,
        message: row.message,
        message_time: row.message_time,
        post_id: row.post_id,
        forum_id: row.forum_id,
    }
}
