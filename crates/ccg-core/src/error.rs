//! Error types for the consent service.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed consent record: {0}")]
    MalformedRecord(String),

    #[error("Cannot {action} while banner is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Category '{0}' is always on and cannot be changed")]
    LockedCategory(String),

    #[error("Unknown consent category: {0}")]
    UnknownCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
