use shoutbox_types::models::UserId;

/// WHERE-clause contract for notification/visibility filtering. The fragment
/// may reference the message alias `m` and is ANDed onto the id predicate of
/// fetch and count queries.
pub trait MessageFilter: Send + Sync {
    fn sql_where(&self) -> Option<String>;
}

/// Hides messages authored by the given users (the host's foe list).
pub struct ExcludeAuthors {
    user_ids: Vec<UserId>,
}

impl ExcludeAuthors {
    pub fn new(user_ids: Vec<UserId>) -> Self {
        Self { user_ids }
    }
}

impl MessageFilter for ExcludeAuthors {
    fn sql_where(&self) -> Option<String> {
        if self.user_ids.is_empty() {
            return None;
        }
        let ids: Vec<String> = self.user_ids.iter().map(|id| id.to_string()).collect();
        Some(format!("m.user_id NOT IN ({})", ids.join(", ")))
    }
}
