use serde::Serialize;
use std::fmt;

/// Error types for session tree mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum TreeError {
    NotFound(String),
    InvalidState(String),
    DuplicateUid(String),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::NotFound(msg) => write!(f, "tree node not found: {}", msg),
            TreeError::InvalidState(msg) => write!(f, "invalid tree state: {}", msg),
            TreeError::DuplicateUid(msg) => write!(f, "duplicate uid: {}", msg),
        }
    }
}

impl std::error::Error for TreeError {}

impl From<TreeError> for String {
    fn from(e: TreeError) -> Self {
        e.to_string()
    }
}

pub type TreeResult<T> = Result<T, TreeError>;
