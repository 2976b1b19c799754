use shoutbox_types::models::MessageId;
use thiserror::Error;

/// Service-level error. Store failures pass through untouched and are never
/// retried here; retry policy, if any, belongs to the caller.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message {0} does not exist")]
    MessageNotFound(MessageId),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;
