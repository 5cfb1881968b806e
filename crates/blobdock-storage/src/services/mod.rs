//! Blob façade and its settings

mod blob_service;
mod config;

pub use blob_service::BlobStorageService;
pub use config::{StorageSettings, DEFAULT_CONTAINER_NAME};
