use thiserror::Error;

use crate::types::ListKind;

/// Failures of the list and configuration repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entry} not found in {kind}")]
    NotFound { kind: ListKind, entry: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid network: {0}")]
    InvalidNetwork(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{op} error: {source}")]
    List {
        op: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("counter error: {0}")]
    Counter(#[from] CounterError),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::List {
                source: StoreError::NotFound { .. },
                ..
            }
        )
    }
}
