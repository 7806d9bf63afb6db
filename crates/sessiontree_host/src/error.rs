use serde::Serialize;
use std::fmt;

/// Failures reported by the browser host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum HostError {
    CallFailed(String),
    NotFound(String),
    InvalidResponse(String),
    Timeout(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::CallFailed(msg) => write!(f, "host call failed: {}", msg),
            HostError::NotFound(msg) => write!(f, "host object not found: {}", msg),
            HostError::InvalidResponse(msg) => write!(f, "invalid host response: {}", msg),
            HostError::Timeout(msg) => write!(f, "host call timed out: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl From<HostError> for String {
    fn from(e: HostError) -> Self {
        e.to_string()
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Error types for key-value persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum StorageError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ReadError(msg) => write!(f, "failed to read storage: {}", msg),
            StorageError::WriteError(msg) => write!(f, "failed to write storage: {}", msg),
            StorageError::ParseError(msg) => write!(f, "failed to parse storage: {}", msg),
            StorageError::SerializeError(msg) => write!(f, "failed to serialize storage: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::ReadError(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::ParseError(e.to_string())
    }
}

impl From<StorageError> for String {
    fn from(e: StorageError) -> Self {
        e.to_string()
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
