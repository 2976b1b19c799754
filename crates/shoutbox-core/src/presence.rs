use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shoutbox_db::Database;
use shoutbox_types::models::{ActiveUsers, Identity, UserId};
use shoutbox_types::settings::ChatSettings;

use crate::error::ChatResult;
use crate::seams::{Capabilities, Capability, UserRenderer};

/// Host-compatible default renderer: hidden users are wrapped in an
/// emphasis marker.
pub struct EmphasisRenderer;

impl UserRenderer for EmphasisRenderer {
    fn render(&self, _user_id: UserId, username: &str, hidden: bool) -> String {
        if hidden {
            format!("<em>{username}</em>")
        } else {
            username.to_string()
        }
    }
}

/// Computes the "who is chatting" snapshot. Build one service per request:
/// the snapshot memo is request-scoped and must not outlive it.
pub struct PresenceService {
    db: Arc<Database>,
    settings: ChatSettings,
    capabilities: Arc<dyn Capabilities>,
    renderer: Box<dyn UserRenderer>,
    snapshot: Mutex<Option<ActiveUsers>>,
}

impl PresenceService {
    pub fn new(db: Arc<Database>, settings: ChatSettings, capabilities: Arc<dyn Capabilities>) -> Self {
        Self::with_renderer(db, settings, capabilities, Box::new(EmphasisRenderer))
    }

    pub fn with_renderer(
        db: Arc<Database>,
        settings: ChatSettings,
        capabilities: Arc<dyn Capabilities>,
        renderer: Box<dyn UserRenderer>,
    ) -> Self {
        Self {
            db,
            settings,
            capabilities,
            renderer,
            snapshot: Mutex::new(None),
        }
    }

    /// Users active within the session window, as seen by `viewer`. Users who
    /// chose to hide their online state are suppressed unless the viewer may
    /// see hidden presence or the row is the viewer's own; surviving hidden
    /// rows are rendered in the invisible marker style.
    pub fn active_users(&self, viewer: &Identity, now: i64, cached: bool) -> ChatResult<ActiveUsers> {
        if cached {
            if let Some(snapshot) = self.memo().clone() {
                return Ok(snapshot);
            }
        }

        let window = self.settings.session_window();
        let rows = self.db.active_sessions(now - window)?;

        let can_view_hidden = self
            .capabilities
            .has_capability(viewer.user_id, Capability::ViewHiddenPresence);

        let mut names = Vec::new();
        for row in rows {
            let hidden = !row.viewonline;
            if hidden && !can_view_hidden && row.user_id != viewer.user_id {
                continue;
            }
            names.push(self.renderer.render(row.user_id, &row.username, hidden));
        }

        let count = names.len();
        let snapshot = ActiveUsers {
            user_list: names.join(", "),
            count_label: count_label(count),
            total_label: total_label(count),
            refresh_hint: format_duration(window as f64),
        };

        *self.memo() = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn memo(&self) -> MutexGuard<'_, Option<ActiveUsers>> {
        // the memo is a plain cache; a poisoned guard is still usable
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn count_label(count: usize) -> String {
    match count {
        1 => "1 user is chatting".to_string(),
        n => format!("{n} users are chatting"),
    }
}

fn total_label(count: usize) -> String {
    match count {
        1 => "1 chatter total".to_string(),
        n => format!("{n} chatters total"),
    }
}

/// Human-readable session window, e.g. "1 hour 5 minutes 20 seconds".
/// Hours and minutes round down; the leftover seconds round up, so 59.4
/// seconds reads as "60 seconds" rather than rolling into a minute.
pub fn format_duration(seconds: f64) -> String {
    let mut components = Vec::new();
    let mut remainder = seconds;

    let hours = (remainder / 3600.0).floor();
    if hours > 0.0 {
        remainder -= hours * 3600.0;
        components.push(unit(hours as i64, "hour"));
    }

    let minutes = (remainder / 60.0).floor();
    if minutes > 0.0 {
        remainder -= minutes * 60.0;
        components.push(unit(minutes as i64, "minute"));
    }

    let secs = remainder.ceil();
    if secs > 0.0 {
        components.push(unit(secs as i64, "second"));
    }

    format!(
        "Listing users active in the last {}",
        components.join("\u{a0}")
    )
}

fn unit(amount: i64, name: &str) -> String {
    if amount == 1 {
        format!("1 {name}")
    } else {
        format!("{amount} {name}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_host_user, caps, member, no_caps, test_db};

    const WINDOW: i64 = 300;

    fn service(db: Arc<Database>, capabilities: Arc<dyn Capabilities>) -> PresenceService {
        PresenceService::new(
            db,
            ChatSettings {
                chat_timeout: WINDOW,
                ..Default::default()
            },
            capabilities,
        )
    }

    #[test]
    fn format_duration_decomposes_without_losing_seconds() {
        assert_eq!(
            format_duration(3661.0),
            "Listing users active in the last 1 hour\u{a0}1 minute\u{a0}1 second"
        );
        assert_eq!(
            format_duration(3600.0),
            "Listing users active in the last 1 hour"
        );
        assert_eq!(
            format_duration(3720.0),
            "Listing users active in the last 1 hour\u{a0}2 minutes"
        );
    }

    #[test]
    fn format_duration_rounds_leftover_seconds_up() {
        assert_eq!(
            format_duration(59.4),
            "Listing users active in the last 60 seconds"
        );
    }

    #[test]
    fn format_duration_of_zero_has_no_components() {
        assert_eq!(format_duration(0.0), "Listing users active in the last ");
    }

    #[test]
    fn hidden_users_are_suppressed_for_ordinary_viewers() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        add_host_user(&db, 3, "bob", false);
        db.touch_session(2, "", 1000).unwrap();
        db.touch_session(3, "", 1000).unwrap();

        let service = service(db, no_caps());
        let snapshot = service.active_users(&member(4), 1100, false).unwrap();

        assert_eq!(snapshot.user_list, "alice");
        assert_eq!(snapshot.count_label, "1 user is chatting");
        assert_eq!(snapshot.total_label, "1 chatter total");
    }

    #[test]
    fn hidden_users_see_themselves_in_marker_style() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        add_host_user(&db, 3, "bob", false);
        db.touch_session(2, "", 1000).unwrap();
        db.touch_session(3, "", 1000).unwrap();

        let service = service(db, no_caps());
        let snapshot = service.active_users(&member(3), 1100, false).unwrap();

        assert_eq!(snapshot.user_list, "alice, <em>bob</em>");
    }

    #[test]
    fn privileged_viewers_see_hidden_users() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        add_host_user(&db, 3, "bob", false);
        db.touch_session(2, "", 1000).unwrap();
        db.touch_session(3, "", 1000).unwrap();

        let service = service(db, caps(&[Capability::ViewHiddenPresence]));
        let snapshot = service.active_users(&member(4), 1100, false).unwrap();

        assert_eq!(snapshot.user_list, "alice, <em>bob</em>");
        assert_eq!(snapshot.count_label, "2 users are chatting");
    }

    #[test]
    fn stale_sessions_fall_out_of_the_snapshot() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        db.touch_session(2, "", 1000).unwrap();

        let service = service(db, no_caps());
        // last_update must be strictly newer than now - window
        let snapshot = service
            .active_users(&member(4), 1000 + WINDOW, false)
            .unwrap();

        assert!(snapshot.user_list.is_empty());
        assert_eq!(snapshot.count_label, "0 users are chatting");
        assert_eq!(
            snapshot.refresh_hint,
            "Listing users active in the last 5 minutes"
        );
    }

    #[test]
    fn cached_calls_return_the_memoized_snapshot() {
        let db = test_db();
        add_host_user(&db, 2, "alice", true);
        add_host_user(&db, 3, "bob", true);
        db.touch_session(2, "", 1000).unwrap();

        let service = service(db.clone(), no_caps());
        let first = service.active_users(&member(4), 1100, false).unwrap();
        assert_eq!(first.user_list, "alice");

        // data changes, but the memo wins for cached reads
        db.touch_session(3, "", 1000).unwrap();
        let cached = service.active_users(&member(4), 1100, true).unwrap();
        assert_eq!(cached.user_list, "alice");

        let fresh = service.active_users(&member(4), 1100, false).unwrap();
        assert_eq!(fresh.user_list, "alice, bob");
    }
}
