//! Shared fixtures for the service tests: an in-memory store with the host
//! forum tables, plus recording doubles for the collaborator seams.

use std::sync::{Arc, Mutex};

use shoutbox_db::Database;
use shoutbox_types::models::{ChatAction, Identity, MessageId, NewMessage, UserId};

use crate::seams::{AuditEvent, AuditSink, Capabilities, Capability, ChatHooks};

pub fn test_db() -> Arc<Database> {
    let db = Database::open_in_memory().unwrap();
    db.with_conn(|conn| {
        conn.execute_batch(
            "CREATE TABLE users (
                 user_id  INTEGER PRIMARY KEY,
                 username TEXT NOT NULL
             );
             CREATE TABLE sessions (
                 session_user_id    INTEGER NOT NULL,
                 session_viewonline INTEGER NOT NULL DEFAULT 1
             );",
        )?;
        Ok(())
    })
    .unwrap();
    Arc::new(db)
}

pub fn add_host_user(db: &Database, user_id: UserId, username: &str, viewonline: bool) {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO users (user_id, username) VALUES (?1, ?2)",
            (user_id, username),
        )?;
        conn.execute(
            "INSERT INTO sessions (session_user_id, session_viewonline) VALUES (?1, ?2)",
            (user_id, viewonline as i64),
        )?;
        Ok(())
    })
    .unwrap();
}

pub fn member(user_id: UserId) -> Identity {
    Identity {
        user_id,
        ip: "127.0.0.1".into(),
        is_registered: true,
        is_bot: false,
    }
}

pub fn new_message(user_id: UserId, time: i64) -> NewMessage {
    NewMessage {
        user_id,
        user_ip: "127.0.0.1".into(),
        message: "hello".into(),
        message_time: time,
        post_id: 0,
        forum_id: 0,
    }
}

/// Grants a fixed set of capabilities to every user.
pub struct GrantedCaps(pub Vec<Capability>);

impl Capabilities for GrantedCaps {
    fn has_capability(&self, _user_id: UserId, capability: Capability) -> bool {
        self.0.contains(&capability)
    }
}

pub fn no_caps() -> Arc<GrantedCaps> {
    Arc::new(GrantedCaps(Vec::new()))
}

pub fn caps(granted: &[Capability]) -> Arc<GrantedCaps> {
    Arc::new(GrantedCaps(granted.to_vec()))
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    pub actions: Mutex<Vec<String>>,
    pub prune_candidates: Mutex<Vec<Vec<MessageId>>>,
}

impl ChatHooks for RecordingHooks {
    fn before_action(&self, action: &ChatAction) {
        self.actions
            .lock()
            .unwrap()
            .push(format!("before:{}", action_name(action)));
    }

    fn after_action(&self, action: &ChatAction) {
        self.actions
            .lock()
            .unwrap()
            .push(format!("after:{}", action_name(action)));
    }

    fn before_prune(&self, candidates: &[MessageId]) {
        self.prune_candidates.lock().unwrap().push(candidates.to_vec());
    }
}

fn action_name(action: &ChatAction) -> &'static str {
    match action {
        ChatAction::Add(_) => "add",
        ChatAction::Edit { .. } => "edit",
        ChatAction::Delete { .. } => "del",
    }
}
