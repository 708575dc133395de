use newsrank_core::error::{ErrorCode, NewsrankError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error in {table}: {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Missing table file: {0}")]
    MissingTable(PathBuf),
}

impl NewsrankError for StorageError {
    fn error_code(&self) -> ErrorCode {
        match self {
            StorageError::Io(_) => ErrorCode::Internal,
            StorageError::Decode { .. } => ErrorCode::InvalidArgument,
            StorageError::Encode(_) => ErrorCode::Internal,
            StorageError::MissingTable(_) => ErrorCode::NotFound,
        }
    }
}
