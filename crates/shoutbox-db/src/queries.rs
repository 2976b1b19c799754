use crate::Database;
use crate::models::{AuthorRow, LogRow, MessageRow, PresenceRow, SessionRow};
use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use shoutbox_types::models::{ANONYMOUS_USER, MessagePatch, NewMessage};

impl Database {
    // -- Sessions --

    /// Refreshes a user's presence row, inserting it when none exists yet.
    /// Returns true when a new row was inserted.
    pub fn touch_session(&self, user_id: i64, ip: &str, now: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "UPDATE chat_sessions SET user_lastupdate = ?1 WHERE user_id = ?2",
                params![now, user_id],
            )?;

            let is_new_session = affected < 1;
            if is_new_session {
                conn.execute(
                    "INSERT INTO chat_sessions (user_id, user_ip, user_lastupdate) VALUES (?1, ?2, ?3)",
                    params![user_id, ip, now],
                )?;
            }

            Ok(is_new_session)
        })
    }

    pub fn get_session(&self, user_id: i64) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, user_ip, user_lastupdate FROM chat_sessions WHERE user_id = ?1",
                    [user_id],
                    |row| {
                        Ok(SessionRow {
                            user_id: row.get(0)?,
                            user_ip: row.get(1)?,
                            user_lastupdate: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Deletes sessions idle since `cutoff` or earlier. Returns the count.
    pub fn delete_expired_sessions(&self, cutoff: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "DELETE FROM chat_sessions WHERE user_lastupdate <= ?1",
                [cutoff],
            )?;
            Ok(affected)
        })
    }

    /// Sessions active after `active_since`, joined with the host's online
    /// visibility flag and display name, ordered by username. The anonymous
    /// pseudo-user and users without a live host session are excluded.
    pub fn active_sessions(&self, active_since: i64) -> Result<Vec<PresenceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.user_id, u.username, s.session_viewonline
                 FROM chat_sessions cs
                 LEFT JOIN sessions s ON cs.user_id = s.session_user_id
                 LEFT JOIN users u ON cs.user_id = u.user_id
                 WHERE u.user_id <> ?1
                   AND s.session_viewonline IS NOT NULL
                   AND cs.user_lastupdate > ?2
                 ORDER BY u.username ASC",
            )?;

            let rows = stmt
                .query_map(params![ANONYMOUS_USER, active_since], |row| {
                    Ok(PresenceRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        viewonline: row.get::<_, i64>(2)? != 0,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    /// Appends one message; the store assigns the id.
    pub fn insert_message(&self, message: &NewMessage) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (user_id, user_ip, message, message_time, post_id, forum_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.user_id,
                    message.user_ip,
                    message.message,
                    message.message_time,
                    message.post_id,
                    message.forum_id
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Writes the patch fields in place. Returns the number of matched rows;
    /// an empty patch writes nothing but still reports whether the row exists.
    pub fn update_message(&self, message_id: i64, patch: &MessagePatch) -> Result<usize> {
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(message) = &patch.message {
            sets.push(format!("message = ?{}", values.len() + 1));
            values.push(Box::new(message.clone()));
        }
        if let Some(post_id) = patch.post_id {
            sets.push(format!("post_id = ?{}", values.len() + 1));
            values.push(Box::new(post_id));
        }
        if let Some(forum_id) = patch.forum_id {
            sets.push(format!("forum_id = ?{}", values.len() + 1));
            values.push(Box::new(forum_id));
        }

        if sets.is_empty() {
            return self.with_conn(|conn| {
                let exists: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE message_id = ?1",
                    [message_id],
                    |row| row.get(0),
                )?;
                Ok(exists as usize)
            });
        }

        let sql = format!(
            "UPDATE chat_messages SET {} WHERE message_id = ?{}",
            sets.join(", "),
            values.len() + 1
        );
        values.push(Box::new(message_id));

        self.with_conn_mut(|conn| {
            let bound: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(|v| v.as_ref()).collect();
            let affected = conn.execute(&sql, bound.as_slice())?;
            Ok(affected)
        })
    }

    pub fn delete_message(&self, message_id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let affected = conn.execute(
                "DELETE FROM chat_messages WHERE message_id = ?1",
                [message_id],
            )?;
            Ok(affected)
        })
    }

    /// Fetches messages newest first: rows past `since_id` and/or the
    /// explicitly requested ids, optionally restricted by a filter fragment
    /// (which may reference the message alias `m`). `limit == 0` means no
    /// limit, per the host contract.
    pub fn fetch_messages(
        &self,
        message_ids: &[i64],
        since_id: i64,
        limit: u32,
        offset: u32,
        filter_sql: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        let mut id_terms: Vec<String> = Vec::new();
        if since_id > 0 {
            id_terms.push(format!("m.message_id > {since_id}"));
        }
        if !message_ids.is_empty() {
            id_terms.push(format!("m.message_id IN ({})", join_ids(message_ids)));
        }

        let mut where_terms: Vec<String> = Vec::new();
        if !id_terms.is_empty() {
            where_terms.push(format!("({})", id_terms.join(" OR ")));
        }
        if let Some(filter) = filter_sql {
            where_terms.push(format!("({filter})"));
        }

        let where_clause = if where_terms.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_terms.join(" AND "))
        };

        // SQLite treats LIMIT -1 as unlimited
        let limit = if limit == 0 { -1 } else { limit as i64 };

        let sql = format!(
            "SELECT m.message_id, m.user_id, u.username, m.user_ip, m.message, m.message_time, m.post_id, m.forum_id
             FROM chat_messages m
             LEFT JOIN users u ON m.user_id = u.user_id
             {where_clause}
             ORDER BY m.message_id DESC
             LIMIT {limit} OFFSET {offset}"
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(MessageRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        username: row.get(2)?,
                        user_ip: row.get(3)?,
                        message: row.get(4)?,
                        message_time: row.get(5)?,
                        post_id: row.get(6)?,
                        forum_id: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_messages(&self, filter_sql: Option<&str>) -> Result<i64> {
        let sql = match filter_sql {
            Some(filter) => format!("SELECT COUNT(*) FROM chat_messages m WHERE {filter}"),
            None => "SELECT COUNT(*) FROM chat_messages m".to_string(),
        };
        self.with_conn(|conn| {
            let count = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count)
        })
    }

    /// Timestamp of the user's most recent message, for flood control.
    pub fn latest_message_time(&self, user_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let time = conn
                .query_row(
                    "SELECT message_time FROM chat_messages
                     WHERE user_id = ?1
                     ORDER BY message_time DESC
                     LIMIT 1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(time)
        })
    }

    pub fn message_author(&self, message_id: i64) -> Result<Option<AuthorRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, message_time, post_id FROM chat_messages WHERE message_id = ?1",
                    [message_id],
                    |row| {
                        Ok(AuthorRow {
                            user_id: row.get(0)?,
                            message_time: row.get(1)?,
                            post_id: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// All message ids authored by the given users (user-removal cascades).
    pub fn message_ids_by_authors(&self, user_ids: &[i64]) -> Result<Vec<i64>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT message_id FROM chat_messages WHERE user_id IN ({})",
            join_ids(user_ids)
        );
        self.select_ids(&sql)
    }

    /// Message ids past the newest `keep` (count-retention candidates).
    pub fn message_ids_beyond_newest(&self, keep: i64) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT message_id FROM chat_messages ORDER BY message_id DESC LIMIT -1 OFFSET {}",
            keep.max(0)
        );
        self.select_ids(&sql)
    }

    /// Message ids older than `cutoff` (age-retention candidates).
    pub fn message_ids_older_than(&self, cutoff: i64) -> Result<Vec<i64>> {
        let sql = format!("SELECT message_id FROM chat_messages WHERE message_time < {cutoff}");
        self.select_ids(&sql)
    }

    pub fn delete_messages(&self, message_ids: &[i64]) -> Result<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM chat_messages WHERE message_id IN ({})",
            join_ids(message_ids)
        );
        self.with_conn_mut(|conn| {
            let affected = conn.execute(&sql, [])?;
            Ok(affected)
        })
    }

    // -- Message log --

    /// Appends one history entry and returns its store-assigned id.
    pub fn insert_log(
        &self,
        log_kind: i64,
        user_id: i64,
        message_id: i64,
        ip: &str,
        now: i64,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_message_log (log_kind, user_id, message_id, log_ip, log_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![log_kind, user_id, message_id, ip, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Entries with `log_id > since`, oldest first.
    pub fn logs_since(&self, since: i64) -> Result<Vec<LogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT log_id, log_kind, user_id, message_id, log_ip, log_time
                 FROM chat_message_log
                 WHERE log_id > ?1
                 ORDER BY log_id ASC",
            )?;

            let rows = stmt
                .query_map([since], |row| {
                    Ok(LogRow {
                        log_id: row.get(0)?,
                        log_kind: row.get(1)?,
                        user_id: row.get(2)?,
                        message_id: row.get(3)?,
                        log_ip: row.get(4)?,
                        log_time: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn latest_log_id(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let id = conn.query_row(
                "SELECT COALESCE(MAX(log_id), 0) FROM chat_message_log",
                [],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub fn delete_logs_for_messages(&self, message_ids: &[i64]) -> Result<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM chat_message_log WHERE message_id IN ({})",
            join_ids(message_ids)
        );
        self.with_conn_mut(|conn| {
            let affected = conn.execute(&sql, [])?;
            Ok(affected)
        })
    }

    fn select_ids(&self, sql: &str) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory chat store plus the minimal host forum tables the read
    /// queries join against.
    fn test_db() -> Database {
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
        db
    }

    fn add_host_user(db: &Database, user_id: i64, username: &str, viewonline: bool) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id, username) VALUES (?1, ?2)",
                params![user_id, username],
            )?;
            conn.execute(
                "INSERT INTO sessions (session_user_id, session_viewonline) VALUES (?1, ?2)",
                params![user_id, viewonline as i64],
            )?;
            Ok(())
        })
        .unwrap();
    }

    fn add_message(db: &Database, user_id: i64, time: i64) -> i64 {
        db.insert_message(&NewMessage {
            user_id,
            user_ip: "127.0.0.1".into(),
            message: "hello".into(),
            message_time: time,
            post_id: 0,
            forum_id: 0,
        })
        .unwrap()
    }

    #[test]
    fn touch_session_inserts_once_then_updates() {
        let db = test_db();

        assert!(db.touch_session(2, "10.0.0.1", 1000).unwrap());
        assert!(!db.touch_session(2, "10.0.0.1", 1100).unwrap());

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM chat_sessions", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);

        let session = db.get_session(2).unwrap().unwrap();
        assert_eq!(session.user_lastupdate, 1100);
    }

    #[test]
    fn expired_sessions_are_deleted_on_the_boundary() {
        let db = test_db();
        db.touch_session(2, "", 1000).unwrap();
        db.touch_session(3, "", 2000).unwrap();

        // cutoff is inclusive
        assert_eq!(db.delete_expired_sessions(1000).unwrap(), 1);
        assert!(db.get_session(2).unwrap().is_none());
        assert!(db.get_session(3).unwrap().is_some());

        assert_eq!(db.delete_expired_sessions(1000).unwrap(), 0);
    }

    #[test]
    fn active_sessions_exclude_anonymous_and_sessionless_users() {
        let db = test_db();
        add_host_user(&db, 4, "alice", true);
        add_host_user(&db, 5, "bob", false);
        add_host_user(&db, ANONYMOUS_USER, "Anonymous", true);

        db.touch_session(4, "", 1000).unwrap();
        db.touch_session(5, "", 1000).unwrap();
        db.touch_session(ANONYMOUS_USER, "", 1000).unwrap();
        // no host session row at all
        db.touch_session(9, "", 1000).unwrap();

        let rows = db.active_sessions(500).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert!(rows[0].viewonline);
        assert!(!rows[1].viewonline);

        // everyone is stale past the window
        assert!(db.active_sessions(1000).unwrap().is_empty());
    }

    #[test]
    fn fetch_is_descending_and_paginated() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        for time in [10, 20, 30, 40, 50, 60, 70, 80] {
            add_message(&db, 2, time);
        }

        let rows = db.fetch_messages(&[], 5, 2, 0, None).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![8, 7]);

        let rows = db.fetch_messages(&[], 5, 2, 2, None).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![6]);
    }

    #[test]
    fn fetch_combines_cursor_and_id_set_disjunctively() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        for time in [10, 20, 30, 40, 50] {
            add_message(&db, 2, time);
        }

        let rows = db.fetch_messages(&[1, 2], 4, 0, 0, None).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![5, 2, 1]);
    }

    #[test]
    fn fetch_applies_the_filter_fragment() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        add_host_user(&db, 3, "bob", true);
        add_message(&db, 2, 10);
        add_message(&db, 3, 20);

        let rows = db
            .fetch_messages(&[], 0, 0, 0, Some("m.user_id NOT IN (3)"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, 2);

        assert_eq!(db.count_messages(Some("m.user_id NOT IN (3)")).unwrap(), 1);
        assert_eq!(db.count_messages(None).unwrap(), 2);
    }

    #[test]
    fn fetch_keeps_rows_with_unresolved_authors() {
        let db = test_db();
        // user 9 has no row in the host users table
        add_message(&db, 9, 10);

        let rows = db.fetch_messages(&[], 0, 0, 0, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].username.is_none());
        assert_eq!(rows[0].user_id, 9);
    }

    #[test]
    fn update_message_patches_only_given_fields() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        let id = add_message(&db, 2, 10);

        let affected = db
            .update_message(
                id,
                &MessagePatch {
                    message: Some("edited".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = db.fetch_messages(&[id], 0, 0, 0, None).unwrap();
        assert_eq!(rows[0].message, "edited");
        assert_eq!(rows[0].message_time, 10);

        // empty patch reports existence without writing
        assert_eq!(db.update_message(id, &MessagePatch::default()).unwrap(), 1);
        assert_eq!(db.update_message(999, &MessagePatch::default()).unwrap(), 0);

        let affected = db
            .update_message(
                999,
                &MessagePatch {
                    message: Some("nope".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[test]
    fn latest_message_time_and_author() {
        let db = test_db();
        add_message(&db, 2, 10);
        let id = add_message(&db, 2, 30);
        add_message(&db, 3, 20);

        assert_eq!(db.latest_message_time(2).unwrap(), Some(30));
        assert_eq!(db.latest_message_time(7).unwrap(), None);

        let author = db.message_author(id).unwrap().unwrap();
        assert_eq!(author.user_id, 2);
        assert_eq!(author.message_time, 30);
        assert!(db.message_author(999).unwrap().is_none());
    }

    #[test]
    fn prune_candidate_selection() {
        let db = test_db();
        for i in 0..15 {
            add_message(&db, if i < 5 { 2 } else { 3 }, 100 + i);
        }

        let mut by_author = db.message_ids_by_authors(&[2]).unwrap();
        by_author.sort();
        assert_eq!(by_author, vec![1, 2, 3, 4, 5]);

        let mut beyond = db.message_ids_beyond_newest(10).unwrap();
        beyond.sort();
        assert_eq!(beyond, vec![1, 2, 3, 4, 5]);

        let mut old = db.message_ids_older_than(105).unwrap();
        old.sort();
        assert_eq!(old, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn log_append_fetch_and_cascade_delete() {
        let db = test_db();
        assert_eq!(db.latest_log_id().unwrap(), 0);

        let first = db.insert_log(1, 2, 42, "10.0.0.1", 1000).unwrap();
        let second = db.insert_log(2, 2, 43, "10.0.0.1", 1001).unwrap();
        assert!(second > first);
        assert_eq!(db.latest_log_id().unwrap(), second);

        let rows = db.logs_since(0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].log_id, first);
        assert_eq!(rows[0].message_id, 42);

        let rows = db.logs_since(first).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].log_id, second);

        assert_eq!(db.delete_logs_for_messages(&[42]).unwrap(), 1);
        assert_eq!(db.logs_since(0).unwrap().len(), 1);
        assert_eq!(db.delete_logs_for_messages(&[]).unwrap(), 0);
    }
}
