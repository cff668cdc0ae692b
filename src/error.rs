use std::error::Error as StdError;
use thiserror::Error;

/// Error surface of the conversation engine. Every operation returns one of
/// these; nothing is swallowed on the way up.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("chat not found: {0}")]
    NotFound(String),

    #[error("message index {index} out of range for {len} messages")]
    Index { index: usize, len: usize },

    #[error("can only edit user messages")]
    Forbidden,

    #[error("completion provider error: {0}")]
    Provider(#[source] Box<dyn StdError + Send + Sync>),

    #[error("history store error: {0}")]
    Store(#[source] Box<dyn StdError + Send + Sync>),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        ChatError::Validation(message.into())
    }

    pub fn provider(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        ChatError::Provider(err.into())
    }
}

impl From<redis::RedisError> for ChatError {
    fn from(err: redis::RedisError) -> Self {
        ChatError::Store(Box::new(err))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Store(Box::new(err))
    }
}
