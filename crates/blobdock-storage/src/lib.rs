//! blobdock-storage: Azure Blob Storage façade
//!
//! Builds an authenticated container handle, wraps it in a small blob
//! service (list, download, upload, tiering) and exposes that service over
//! HTTP.

pub mod client;
pub mod error;
pub mod handlers;
pub mod services;
pub mod store;

pub use client::{ContainerClientBuilder, ContainerHandle, Credential};
pub use error::StorageError;
pub use services::{BlobStorageService, StorageSettings};
pub use store::{AccessTier, AzureBlobStore, BlobItem, BlobStore, MemoryBlobStore, RehydratePriority};
