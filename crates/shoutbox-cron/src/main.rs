//! Maintenance daemon: the cron-equivalent that garbage-collects stale chat
//! sessions and prunes messages per the configured retention policy. Safe to
//! run alongside live traffic.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use shoutbox_core::history::MessageHistory;
use shoutbox_core::prune::PruneEngine;
use shoutbox_core::seams::{AuditEvent, AuditSink, NoHooks};
use shoutbox_core::session::SessionTracker;
use shoutbox_types::models::{ANONYMOUS_USER, Identity};
use shoutbox_types::settings::ChatSettings;

/// Audit sink for standalone runs: administrative events land in the
/// process log instead of a host forum's admin log.
struct LogSink;

impl AuditSink for LogSink {
    fn record(&self, event: &AuditEvent) {
        info!("Audit: {} by user {} {:?}", event.event, event.actor, event.details);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shoutbox=info".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("SHOUTBOX_DB_PATH").unwrap_or_else(|_| "shoutbox.db".into());
    let interval_secs: u64 = env_or("SHOUTBOX_MAINTENANCE_INTERVAL", 300)?;
    let settings = settings_from_env()?;

    let db = Arc::new(shoutbox_db::Database::open(&PathBuf::from(&db_path))?);
    let sessions = SessionTracker::new(db.clone(), settings.clone());
    let history = Arc::new(MessageHistory::new(db.clone()));
    let pruner = PruneEngine::new(
        db,
        settings,
        history,
        Arc::new(LogSink),
        Arc::new(NoHooks),
    );

    // The host's cron runs as the anonymous pseudo-user
    let cron_identity = Identity {
        user_id: ANONYMOUS_USER,
        ip: String::new(),
        is_registered: false,
        is_bot: false,
    };

    info!("Maintenance loop starting, every {}s", interval_secs);

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        let now = chrono::Utc::now().timestamp();

        match sessions.gc(now) {
            Ok(removed) => {
                if removed > 0 {
                    info!("Session GC: removed {} stale sessions", removed);
                }
            }
            Err(e) => {
                warn!("Session GC error: {}", e);
            }
        }

        match pruner.prune(&cron_identity, &[], now) {
            Ok(pruned) => {
                if !pruned.is_empty() {
                    info!("Pruned {} chat messages", pruned.len());
                }
            }
            Err(e) => {
                warn!("Prune error: {}", e);
            }
        }
    }
}

fn settings_from_env() -> anyhow::Result<ChatSettings> {
    let defaults = ChatSettings::default();
    Ok(ChatSettings {
        chat_timeout: env_or("SHOUTBOX_TIMEOUT", defaults.chat_timeout)?,
        load_online_time: env_or("SHOUTBOX_LOAD_ONLINE_TIME", defaults.load_online_time)?,
        session_length: env_or("SHOUTBOX_SESSION_LENGTH", defaults.session_length)?,
        prune_num: env_or("SHOUTBOX_PRUNE_NUM", defaults.prune_num)?,
        prune_mode: env_or("SHOUTBOX_PRUNE_MODE", defaults.prune_mode)?,
        flood_time: env_or("SHOUTBOX_FLOOD_TIME", defaults.flood_time)?,
        legend_sort_by_name: env_or("SHOUTBOX_LEGEND_SORT_BY_NAME", 0i64)? != 0,
        disallowed_markup: std::env::var("SHOUTBOX_DISALLOWED_MARKUP").unwrap_or_default(),
    })
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => Ok(raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e))?),
        Err(_) => Ok(default),
    }
}
