use shoutbox_types::models::{ANONYMOUS_USER, Identity, UserId};
use shoutbox_types::settings::ChatSettings;

use crate::seams::{Capabilities, Capability};

/// Host group data needed for the who's-online legend. Group membership and
/// label markup stay with the host.
pub trait GroupDirectory: Send + Sync {
    /// Groups flagged for the legend, ordered by name or by legend rank.
    /// When `admin_user` is set, hidden groups that user belongs to are
    /// included; otherwise hidden groups are omitted.
    fn legend_groups(&self, sort_by_name: bool, admin_user: Option<UserId>) -> Vec<LegendGroup>;

    /// Plain display label for a group.
    fn group_label(&self, group: &LegendGroup) -> String;

    /// Label linked to the group's member list.
    fn linked_group_label(&self, group: &LegendGroup) -> String;
}

#[derive(Debug, Clone)]
pub struct LegendGroup {
    pub group_id: i64,
    pub name: String,
    pub is_bot_group: bool,
}

/// Builds the legend labels. Bot groups are never linked, and registered
/// viewers need the view-profile capability to get linked labels.
pub fn build_legend(
    groups: &dyn GroupDirectory,
    capabilities: &dyn Capabilities,
    viewer: &Identity,
    settings: &ChatSettings,
) -> Vec<String> {
    let admin_user = capabilities
        .has_capability(viewer.user_id, Capability::GroupAdmin)
        .then_some(viewer.user_id);

    groups
        .legend_groups(settings.legend_sort_by_name, admin_user)
        .iter()
        .map(|group| {
            let linkable = !group.is_bot_group
                && (viewer.user_id == ANONYMOUS_USER
                    || capabilities.has_capability(viewer.user_id, Capability::ViewProfile));
            if linkable {
                groups.linked_group_label(group)
            } else {
                groups.group_label(group)
            }
        })
        .collect()
}
