//! Collaborator contracts. The host forum owns permissions, the admin log
//! and any extension hooks; the core reaches them only through these traits.

use shoutbox_types::models::{ChatAction, MessageId, UserId};

/// Host capability checks (ACL). The core never inspects permissions itself.
pub trait Capabilities: Send + Sync {
    fn has_capability(&self, user_id: UserId, capability: Capability) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ViewHiddenPresence,
    FloodExempt,
    ViewProfile,
    GroupAdmin,
}

/// Sink for the host's administrative log.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor: UserId,
    pub ip: String,
    pub event: &'static str,
    pub details: Vec<String>,
}

/// Audit sink that drops everything, for contexts without a host log.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Observation seams around message mutations and pruning. All methods
/// default to no-ops; hosts implement only what they need. Hooks are handed
/// in explicitly at construction; there is no global registration.
pub trait ChatHooks: Send + Sync {
    fn before_action(&self, _action: &ChatAction) {}
    fn after_action(&self, _action: &ChatAction) {}
    /// Called with the candidate ids after selection, before deletion.
    fn before_prune(&self, _candidates: &[MessageId]) {}
}

pub struct NoHooks;

impl ChatHooks for NoHooks {}

/// Renders one presence-list entry. The default implementation lives in the
/// presence module; hosts substitute their own markup here.
pub trait UserRenderer: Send + Sync {
    fn render(&self, user_id: UserId, username: &str, hidden: bool) -> String;
}
