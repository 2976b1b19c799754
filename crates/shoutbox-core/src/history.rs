use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use shoutbox_db::Database;
use shoutbox_types::models::{Identity, LogBatch, LogEntry, LogId, LogKind, MessageId};
use tracing::warn;

use crate::error::ChatResult;

const READ_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Per-message edit/delete history with a monotonic id cursor. Entries are
/// append-only apart from bulk prune deletes, so reads are served through a
/// short-lived cursor-keyed cache standing in for the host's per-table query
/// cache.
pub struct MessageHistory {
    db: Arc<Database>,
    cache: ReadCache,
}

impl MessageHistory {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            cache: ReadCache::new(READ_CACHE_TTL),
        }
    }

    /// Records one history entry and returns its store-assigned id.
    pub fn append(
        &self,
        kind: LogKind,
        message_id: MessageId,
        actor: &Identity,
        now: i64,
    ) -> ChatResult<LogId> {
        let log_id = self
            .db
            .insert_log(kind.as_i64(), actor.user_id, message_id, &actor.ip, now)?;
        self.cache.invalidate();
        Ok(log_id)
    }

    /// Entries past the cursor, oldest first, plus the client's next cursor:
    /// the highest id seen, or the given cursor when nothing matched.
    pub fn fetch_since(&self, cursor: LogId) -> ChatResult<LogBatch> {
        if let Some(batch) = self.cache.get(cursor) {
            return Ok(batch);
        }

        let rows = self.db.logs_since(cursor)?;
        let mut last_id = cursor;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(log_kind) = LogKind::from_i64(row.log_kind) else {
                // only the two known kinds are ever written
                warn!(
                    "Skipping history row {} with foreign kind {}",
                    row.log_id, row.log_kind
                );
                continue;
            };
            last_id = last_id.max(row.log_id);
            entries.push(LogEntry {
                log_id: row.log_id,
                log_kind,
                user_id: row.user_id,
                message_id: row.message_id,
                ip: row.log_ip,
                log_time: row.log_time,
            });
        }

        let batch = LogBatch { last_id, entries };
        self.cache.put(cursor, batch.clone());
        Ok(batch)
    }

    pub fn latest_log_id(&self) -> ChatResult<LogId> {
        Ok(self.db.latest_log_id()?)
    }

    /// Drops cached reads after a log mutation elsewhere (pruning). The cache
    /// is in-process, so invalidation can never block the mutation itself.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }
}

/// Cursor-keyed TTL cache for history reads.
struct ReadCache {
    ttl: Duration,
    slots: Mutex<HashMap<LogId, (Instant, LogBatch)>>,
}

impl ReadCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, cursor: LogId) -> Option<LogBatch> {
        let slots = self.lock();
        let (cached_at, batch) = slots.get(&cursor)?;
        if cached_at.elapsed() > self.ttl {
            return None;
        }
        Some(batch.clone())
    }

    fn put(&self, cursor: LogId, batch: LogBatch) {
        self.lock().insert(cursor, (Instant::now(), batch));
    }

    fn invalidate(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<LogId, (Instant, LogBatch)>> {
        // a poisoned cache is still usable
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
