//! Container-scoped blob store seam and its backends

mod azure;
mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::StorageError;

pub use azure::AzureBlobStore;
pub use memory::MemoryBlobStore;

/// Blob content delivered chunk by chunk.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// One listing page per item, in the order the store returns them.
pub type BlobPages = BoxStream<'static, Result<Vec<BlobItem>, StorageError>>;

/// Storage cost/latency class of a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AccessTier {
    /// Immediately readable
    Hot,
    /// Readable, cheaper storage with higher access cost
    Cool,
    /// Offline; must be rehydrated before it can be read
    Archive,
}

/// How quickly an Archive to Hot transition is processed by the remote store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RehydratePriority {
    /// Processed in order received, up to 15 hours
    #[default]
    Standard,
    /// Prioritised, usually under 1 hour for blobs below 10 GB
    High,
}

impl fmt::Display for RehydratePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RehydratePriority::Standard => f.write_str("Standard"),
            RehydratePriority::High => f.write_str("High"),
        }
    }
}

/// Descriptor of a blob as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub content_type: Option<String>,
    pub access_tier: Option<AccessTier>,
}

/// An opened blob read.
pub struct BlobDownload {
    /// Total size when the store reports it up front
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub stream: ByteStream,
}

impl fmt::Debug for BlobDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobDownload")
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Operations on one container of a storage account.
///
/// Implementations report an absent blob as [`StorageError::NotFound`] from
/// the call that needed it, and a container name collision as
/// [`StorageError::AlreadyExists`]. Every other failure is
/// [`StorageError::Remote`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn account_name(&self) -> &str;

    fn container_name(&self) -> &str;

    /// Paginated listing of the container. Nothing is requested until the
    /// stream is polled.
    fn list_pages(&self) -> BlobPages;

    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Read the whole blob into memory.
    async fn get(&self, name: &str) -> Result<Bytes, StorageError>;

    /// Open a streaming read. Absence is reported here, not mid-stream.
    async fn open_read(&self, name: &str) -> Result<BlobDownload, StorageError>;

    /// Create or replace `name` with `body`.
    async fn put(&self, name: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Create a sibling container in the same account and return a store for it.
    async fn create_container(&self, name: &str) -> Result<Arc<dyn BlobStore>, StorageError>;

    /// Request an access tier change. `priority` only matters when leaving Archive.
    async fn set_tier(
        &self,
        name: &str,
        tier: AccessTier,
        priority: Option<RehydratePriority>,
    ) -> Result<(), StorageError>;
}
