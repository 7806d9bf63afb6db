use serde::Serialize;
use sessiontree_host::{HostError, StorageError};
use sessiontree_tree::TreeError;

/// Failure of a session tree operation.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "message")]
pub enum SessionTreeError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to (de)serialize session tree: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SessionTreeError {
    fn from(e: serde_json::Error) -> Self {
        SessionTreeError::Serialization(e.to_string())
    }
}

impl From<SessionTreeError> for String {
    fn from(e: SessionTreeError) -> Self {
        e.to_string()
    }
}

pub type SessionTreeResult<T> = Result<T, SessionTreeError>;
