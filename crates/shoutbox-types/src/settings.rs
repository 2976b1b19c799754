use serde::{Deserialize, Serialize};

/// Retention policy for the prune engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneMode {
    /// Keep only the newest `prune_num` messages.
    Count,
    /// Delete messages older than `prune_num * unit_hours` hours.
    Age { unit_hours: i64 },
}

/// Chat configuration as handed over by the host forum. All durations are
/// seconds unless noted; `0` means "not set" for the fallback options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Explicit chat session timeout. Takes precedence when non-zero.
    pub chat_timeout: i64,
    /// The host's "load online time", in minutes.
    pub load_online_time: i64,
    /// The host's platform session length, the final fallback.
    pub session_length: i64,
    /// Message count or age units, depending on `prune_mode`.
    pub prune_num: i64,
    /// Raw host prune-mode value, decoded by `prune_mode()`.
    pub prune_mode: i64,
    /// Minimum spacing between messages from one user; 0 disables the check.
    pub flood_time: i64,
    /// Legend ordering: by group name when true, by legend rank otherwise.
    pub legend_sort_by_name: bool,
    /// Pipe-delimited markup tags users may not post.
    pub disallowed_markup: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            chat_timeout: 0,
            load_online_time: 0,
            session_length: 3600,
            prune_num: 0,
            prune_mode: 0,
            flood_time: 30,
            legend_sort_by_name: false,
            disallowed_markup: String::new(),
        }
    }
}

impl ChatSettings {
    /// Duration after which an inactive user is no longer considered present.
    /// Fallback order: explicit chat timeout, then the host's load-online-time
    /// setting (minutes), then the platform session length.
    pub fn session_window(&self) -> i64 {
        if self.chat_timeout > 0 {
            return self.chat_timeout;
        }
        if self.load_online_time > 0 {
            return self.load_online_time * 60;
        }
        self.session_length
    }

    /// Decodes the raw host prune-mode value. `None` (mode 0 or anything
    /// unrecognized) makes pruning a no-op.
    pub fn prune_mode(&self) -> Option<PruneMode> {
        match self.prune_mode {
            1 => Some(PruneMode::Count),
            2 => Some(PruneMode::Age { unit_hours: 1 }),
            3 => Some(PruneMode::Age { unit_hours: 24 }),
            4 => Some(PruneMode::Age { unit_hours: 168 }),
            _ => None,
        }
    }

    /// Markup tags users may not post, for the host's WHERE-clause contract.
    pub fn disallowed_markup(&self) -> Vec<&str> {
        self.disallowed_markup
            .split('|')
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}
