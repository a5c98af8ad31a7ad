use directory_client::DirectoryError;
use redis_utils::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotificationError>;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotificationError {
    /// Whether trying again later can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            NotificationError::Directory(e) => e.is_retryable(),
            NotificationError::Transport(_) | NotificationError::Store(_) => true,
            NotificationError::InvalidAddress { .. } | NotificationError::Config(_) => false,
        }
    }
}
