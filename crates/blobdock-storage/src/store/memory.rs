//! In-process storage account for local development and tests

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AccessTier, BlobDownload, BlobItem, BlobPages, BlobStore, RehydratePriority};
use crate::error::StorageError;

/// Listing page size when none is configured
pub const DEFAULT_PAGE_SIZE: usize = 5000;

#[derive(Debug, Clone)]
struct MemoryBlob {
    content: Bytes,
    content_type: String,
    tier: AccessTier,
    rehydrate_priority: Option<RehydratePriority>,
}

type Containers = BTreeMap<String, BTreeMap<String, MemoryBlob>>;

/// A container inside an in-memory account.
///
/// Stores created through [`BlobStore::create_container`] share the account
/// with the store that created them. Tier changes complete immediately.
#[derive(Clone)]
pub struct MemoryBlobStore {
    account: Arc<RwLock<Containers>>,
    account_name: String,
    container: String,
    page_size: usize,
}

impl MemoryBlobStore {
    /// New account holding a single, empty container.
    pub fn new(account_name: impl Into<String>, container: impl Into<String>) -> Self {
        let container = container.into();
        let mut containers = Containers::new();
        containers.insert(container.clone(), BTreeMap::new());

        Self {
            account: Arc::new(RwLock::new(containers)),
            account_name: account_name.into(),
            container,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Maximum number of items per listing page (at least one).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Current access tier of `name`, if it exists.
    pub async fn access_tier(&self, name: &str) -> Option<AccessTier> {
        let account = self.account.read().await;
        account
            .get(&self.container)
            .and_then(|blobs| blobs.get(name))
            .map(|blob| blob.tier)
    }

    /// Priority recorded by the last rehydration of `name`.
    pub async fn rehydrate_priority(&self, name: &str) -> Option<RehydratePriority> {
        let account = self.account.read().await;
        account
            .get(&self.container)
            .and_then(|blobs| blobs.get(name))
            .and_then(|blob| blob.rehydrate_priority)
    }

    fn container_missing(&self) -> StorageError {
        StorageError::Remote(format!(
            "The specified container does not exist. (ContainerNotFound: {})",
            self.container
        ))
    }

    async fn read_blob(&self, name: &str) -> Result<MemoryBlob, StorageError> {
        let account = self.account.read().await;
        let blobs = account
            .get(&self.container)
            .ok_or_else(|| self.container_missing())?;
        let blob = blobs
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        if blob.tier == AccessTier::Archive {
            return Err(StorageError::Remote(format!(
                "This operation is not permitted on an archived blob. (BlobArchived: {})",
                name
            )));
        }

        Ok(blob.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn account_name(&self) -> &str {
        &self.account_name
    }

    fn container_name(&self) -> &str {
        &self.container
    }

    fn list_pages(&self) -> BlobPages {
        let store = self.clone();

        stream::once(async move {
            let account = store.account.read().await;
            let blobs = account
                .get(&store.container)
                .ok_or_else(|| store.container_missing())?;

            let items: Vec<BlobItem> = blobs
                .iter()
                .map(|(name, blob)| BlobItem {
                    name: name.clone(),
                    size: blob.content.len() as u64,
                    content_type: Some(blob.content_type.clone()),
                    access_tier: Some(blob.tier),
                })
                .collect();

            debug!(
                "LIST {}/{} ({} blobs, page size {})",
                store.account_name,
                store.container,
                items.len(),
                store.page_size
            );

            let pages: Vec<Result<Vec<BlobItem>, StorageError>> = items
                .chunks(store.page_size)
                .map(|page| Ok(page.to_vec()))
                .collect();
            Ok::<_, StorageError>(pages)
        })
        .map_ok(stream::iter)
        .try_flatten()
        .boxed()
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let account = self.account.read().await;
        let blobs = account
            .get(&self.container)
            .ok_or_else(|| self.container_missing())?;
        Ok(blobs.contains_key(name))
    }

    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        debug!("GET {}/{}", self.container, name);
        Ok(self.read_blob(name).await?.content)
    }

    async fn open_read(&self, name: &str) -> Result<BlobDownload, StorageError> {
        debug!("GET (stream) {}/{}", self.container, name);
        let blob = self.read_blob(name).await?;

        Ok(BlobDownload {
            content_length: Some(blob.content.len() as u64),
            content_type: Some(blob.content_type),
            stream: stream::iter([Ok(blob.content)]).boxed(),
        })
    }

    async fn put(&self, name: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        debug!("PUT {}/{} ({} bytes, {})", self.container, name, body.len(), content_type);

        let mut account = self.account.write().await;
        let blobs = account
            .get_mut(&self.container)
            .ok_or_else(|| self.container_missing())?;

        blobs.insert(
            name.to_string(),
            MemoryBlob {
                content: body,
                content_type: content_type.to_string(),
                tier: AccessTier::Hot,
                rehydrate_priority: None,
            },
        );
        Ok(())
    }

    async fn create_container(&self, name: &str) -> Result<Arc<dyn BlobStore>, StorageError> {
        let mut account = self.account.write().await;
        if account.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }
        account.insert(name.to_string(), BTreeMap::new());

        Ok(Arc::new(MemoryBlobStore {
            account: self.account.clone(),
            account_name: self.account_name.clone(),
            container: name.to_string(),
            page_size: self.page_size,
        }))
    }

    async fn set_tier(
        &self,
        name: &str,
        tier: AccessTier,
        priority: Option<RehydratePriority>,
    ) -> Result<(), StorageError> {
        let mut account = self.account.write().await;
        let blobs = account
            .get_mut(&self.container)
            .ok_or_else(|| self.container_missing())?;
        let blob = blobs
            .get_mut(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        if blob.tier == AccessTier::Archive && tier != AccessTier::Archive {
            blob.rehydrate_priority = Some(priority.unwrap_or_default());
        }
        blob.tier = tier;
        Ok(())
    }
}
