//! Error types for the storage façade

use axum::http::StatusCode;
use blobdock_core::problemdetails::{self, Problem};
use thiserror::Error;

/// Errors that can occur in the storage façade
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Container already exists: {0}")]
    AlreadyExists(String),

    #[error("Remote storage error: {0}")]
    Remote(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<azure_core::Error> for StorageError {
    fn from(error: azure_core::Error) -> Self {
        StorageError::Remote(error.to_string())
    }
}

impl From<StorageError> for Problem {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(name) => problemdetails::new(StatusCode::NOT_FOUND)
                .with_title("Blob Not Found")
                .with_detail(format!("Blob '{}' does not exist", name)),

            StorageError::AlreadyExists(name) => problemdetails::new(StatusCode::CONFLICT)
                .with_title("Container Already Exists")
                .with_detail(format!("Container '{}' already exists", name)),

            StorageError::Remote(msg) => problemdetails::new(StatusCode::BAD_GATEWAY)
                .with_title("Storage Error")
                .with_detail(msg),

            StorageError::Cancelled(operation) => {
                problemdetails::new(StatusCode::SERVICE_UNAVAILABLE)
                    .with_title("Operation Cancelled")
                    .with_detail(format!("{} was cancelled before it completed", operation))
            }

            StorageError::InvalidConfiguration(msg) => {
                problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .with_title("Invalid Configuration")
                    .with_detail(msg)
            }

            StorageError::InvalidRequest(msg) => problemdetails::new(StatusCode::BAD_REQUEST)
                .with_title("Invalid Request")
                .with_detail(msg),
        }
    }
}
