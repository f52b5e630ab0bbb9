use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientStoreError {
    #[error("Client not found: {0}")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ClientStoreResult<T> = Result<T, ClientStoreError>;
