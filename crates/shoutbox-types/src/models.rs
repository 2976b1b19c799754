use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type MessageId = i64;
pub type LogId = i64;

/// The host forum's anonymous pseudo-user. Deleted authors are re-attributed
/// to this id, and it never appears in the presence list.
pub const ANONYMOUS_USER: UserId = 1;

/// The host's current-user contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub ip: String,
    pub is_registered: bool,
    pub is_bot: bool,
}

impl Identity {
    /// Whether chat activity by this identity creates a presence session.
    /// Anonymous, unregistered and bot identities are never tracked.
    pub fn tracks_presence(&self) -> bool {
        self.is_registered && self.user_id != ANONYMOUS_USER && !self.is_bot
    }
}

/// One presence row per registered, non-anonymous, non-bot user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub ip: String,
    pub last_update: i64,
}

/// A chat message as returned by the read path, joined against the host
/// `users` table. `username` is `None` when the author no longer exists;
/// such rows carry the anonymous pseudo-user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub user_ip: String,
    pub message: String,
    pub message_time: i64,
    pub post_id: i64,
    pub forum_id: i64,
}

/// Payload for inserting a message. The store assigns the message id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub user_id: UserId,
    pub user_ip: String,
    pub message: String,
    pub message_time: i64,
    pub post_id: i64,
    pub forum_id: i64,
}

/// Fields to change on an existing message. Only fields that are `Some` are
/// written; in particular, an edit never re-timestamps the message on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    pub message: Option<String>,
    pub post_id: Option<i64>,
    pub forum_id: Option<i64>,
}

impl MessagePatch {
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.post_id.is_none() && self.forum_id.is_none()
    }
}

/// Author info for a single message, used for ownership checks upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub user_id: UserId,
    pub message_time: i64,
    pub post_id: i64,
}

/// A client action against the chat. Edit and delete ids are validated for
/// existence by the store; ownership checks happen upstream.
#[derive(Debug, Clone)]
pub enum ChatAction {
    Add(NewMessage),
    Edit {
        message_id: MessageId,
        patch: MessagePatch,
    },
    Delete {
        message_id: MessageId,
    },
}

/// Kind of a message history entry. Stored as an integer; nothing outside
/// this set is ever written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    Edit,
    Delete,
}

impl LogKind {
    pub fn as_i64(self) -> i64 {
        match self {
            LogKind::Edit => 1,
            LogKind::Delete => 2,
        }
    }

    pub fn from_i64(raw: i64) -> Option<Self> {
        match raw {
            1 => Some(LogKind::Edit),
            2 => Some(LogKind::Delete),
            _ => None,
        }
    }
}

/// One edit/delete history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub log_id: LogId,
    pub log_kind: LogKind,
    pub user_id: UserId,
    pub message_id: MessageId,
    pub ip: String,
    pub log_time: i64,
}

/// Result of an incremental history fetch. `last_id` is the client's next
/// cursor: the highest id seen, or the requested cursor when nothing matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatch {
    pub last_id: LogId,
    pub entries: Vec<LogEntry>,
}

/// Computed view of who is currently chatting. Memoized per request by the
/// presence service; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveUsers {
    pub user_list: String,
    pub count_label: String,
    pub total_label: String,
    pub refresh_hint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_and_bots_are_not_tracked() {
        let member = Identity {
            user_id: 7,
            ip: "127.0.0.1".into(),
            is_registered: true,
            is_bot: false,
        };
        assert!(member.tracks_presence());

        let anonymous = Identity {
            user_id: ANONYMOUS_USER,
            is_registered: true,
            ..member.clone()
        };
        assert!(!anonymous.tracks_presence());

        let bot = Identity {
            is_bot: true,
            ..member.clone()
        };
        assert!(!bot.tracks_presence());

        let guest = Identity {
            is_registered: false,
            ..member
        };
        assert!(!guest.tracks_presence());
    }

    #[test]
    fn log_kind_round_trips_and_rejects_foreign_values() {
        assert_eq!(LogKind::from_i64(LogKind::Edit.as_i64()), Some(LogKind::Edit));
        assert_eq!(LogKind::from_i64(LogKind::Delete.as_i64()), Some(LogKind::Delete));
        assert_eq!(LogKind::from_i64(0), None);
        assert_eq!(LogKind::from_i64(3), None);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(MessagePatch::default().is_empty());
        assert!(!MessagePatch {
            message: Some("hi".into()),
            ..Default::default()
        }
        .is_empty());
    }
}
