//! Azure Blob Storage backend

use std::sync::Arc;

use async_trait::async_trait;
use azure_core::StatusCode;
use azure_storage_blobs::prelude::{
    AccessTier as SdkAccessTier, Blob, RehydratePriority as SdkRehydratePriority,
};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

use super::{AccessTier, BlobDownload, BlobItem, BlobPages, BlobStore, RehydratePriority};
use crate::client::ContainerHandle;
use crate::error::StorageError;

/// A container reached through the Azure Blob Storage REST API.
#[derive(Clone, Debug)]
pub struct AzureBlobStore {
    handle: ContainerHandle,
}

impl AzureBlobStore {
    pub fn new(handle: ContainerHandle) -> Self {
        Self { handle }
    }
}

/// Turn the SDK's native "not found" into the façade's taxonomy.
fn translate_blob_error(error: azure_core::Error, name: &str) -> StorageError {
    if has_status(&error, StatusCode::NotFound) {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::from(error)
    }
}

fn translate_container_error(error: azure_core::Error, name: &str) -> StorageError {
    if has_status(&error, StatusCode::Conflict) {
        StorageError::AlreadyExists(name.to_string())
    } else {
        StorageError::from(error)
    }
}

fn has_status(error: &azure_core::Error, status: StatusCode) -> bool {
    error
        .as_http_error()
        .is_some_and(|http_error| http_error.status() == status)
}

fn blob_item(blob: &Blob) -> BlobItem {
    let content_type = &blob.properties.content_type;
    BlobItem {
        name: blob.name.clone(),
        size: blob.properties.content_length,
        content_type: (!content_type.is_empty()).then(|| content_type.clone()),
        access_tier: blob.properties.access_tier.as_ref().and_then(access_tier),
    }
}

fn access_tier(tier: &SdkAccessTier) -> Option<AccessTier> {
    match tier {
        SdkAccessTier::Hot => Some(AccessTier::Hot),
        SdkAccessTier::Cool => Some(AccessTier::Cool),
        SdkAccessTier::Archive => Some(AccessTier::Archive),
        _ => None,
    }
}

impl From<AccessTier> for SdkAccessTier {
    fn from(tier: AccessTier) -> Self {
        match tier {
            AccessTier::Hot => SdkAccessTier::Hot,
            AccessTier::Cool => SdkAccessTier::Cool,
            AccessTier::Archive => SdkAccessTier::Archive,
        }
    }
}

impl From<RehydratePriority> for SdkRehydratePriority {
    fn from(priority: RehydratePriority) -> Self {
        match priority {
            RehydratePriority::Standard => SdkRehydratePriority::Standard,
            RehydratePriority::High => SdkRehydratePriority::High,
        }
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn account_name(&self) -> &str {
        self.handle.account_name()
    }

    fn container_name(&self) -> &str {
        self.handle.container_name()
    }

    fn list_pages(&self) -> BlobPages {
        debug!("LIST {}", self.handle.container_name());

        self.handle
            .container_client()
            .list_blobs()
            .into_stream()
            .map(|page| -> Result<Vec<BlobItem>, StorageError> {
                let page = page?;
                Ok(page.blobs.blobs().map(blob_item).collect())
            })
            .boxed()
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.handle.container_client().blob_client(name).exists().await?)
    }

    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        debug!("GET {}/{}", self.handle.container_name(), name);

        self.handle
            .container_client()
            .blob_client(name)
            .get_content()
            .await
            .map(Bytes::from)
            .map_err(|e| translate_blob_error(e, name))
    }

    async fn open_read(&self, name: &str) -> Result<BlobDownload, StorageError> {
        debug!("GET (stream) {}/{}", self.handle.container_name(), name);

        let mut chunks = self
            .handle
            .container_client()
            .blob_client(name)
            .get()
            .into_stream();

        // The first ranged GET surfaces a missing blob before any body is sent.
        let first = match chunks.next().await {
            Some(Ok(response)) => response,
            Some(Err(e)) => return Err(translate_blob_error(e, name)),
            None => return Err(StorageError::NotFound(name.to_string())),
        };

        let content_type = Some(first.blob.properties.content_type.clone())
            .filter(|content_type| !content_type.is_empty());
        let rest = chunks.map_ok(|response| response.data).try_flatten();

        let stream = first
            .data
            .chain(rest)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .boxed();

        Ok(BlobDownload {
            content_length: None,
            content_type,
            stream,
        })
    }

    async fn put(&self, name: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
        debug!(
            "PUT {}/{} ({} bytes, {})",
            self.handle.container_name(),
            name,
            body.len(),
            content_type
        );

        self.handle
            .container_client()
            .blob_client(name)
            .put_block_blob(body)
            .content_type(content_type.to_string())
            .await?;
        Ok(())
    }

    async fn create_container(&self, name: &str) -> Result<Arc<dyn BlobStore>, StorageError> {
        let handle = self.handle.sibling(name);

        handle
            .container_client()
            .create()
            .await
            .map_err(|e| translate_container_error(e, name))?;

        Ok(Arc::new(AzureBlobStore::new(handle)))
    }

    async fn set_tier(
        &self,
        name: &str,
        tier: AccessTier,
        priority: Option<RehydratePriority>,
    ) -> Result<(), StorageError> {
        debug!("SET TIER {}/{} -> {:?}", self.handle.container_name(), name, tier);

        let mut request = self
            .handle
            .container_client()
            .blob_client(name)
            .set_blob_tier(tier.into());
        if let Some(priority) = priority {
            request = request.rehydrate_priority(SdkRehydratePriority::from(priority));
        }

        request.await.map_err(|e| translate_blob_error(e, name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use azure_core::error::{ErrorKind, HttpError};
    use azure_core::headers::Headers;
    use azure_core::Response;

    use super::*;

    async fn http_error(status: StatusCode) -> azure_core::Error {
        let body = futures::stream::empty::<azure_core::Result<Bytes>>();
        let response = Response::new(status, Headers::new(), Box::pin(body));
        let http_error = HttpError::new(response).await;
        azure_core::Error::new(ErrorKind::http_response(status, None), http_error)
    }

    #[tokio::test]
    async fn test_not_found_status_names_the_blob() {
        let error = translate_blob_error(http_error(StatusCode::NotFound).await, "a.txt");
        assert!(matches!(error, StorageError::NotFound(ref name) if name == "a.txt"));
    }

    #[tokio::test]
    async fn test_conflict_status_names_the_container() {
        let error = translate_container_error(http_error(StatusCode::Conflict).await, "images");
        assert!(matches!(error, StorageError::AlreadyExists(ref name) if name == "images"));
    }

    #[tokio::test]
    async fn test_statuses_outside_the_operation_stay_remote() {
        let error = translate_container_error(http_error(StatusCode::NotFound).await, "images");
        assert!(matches!(error, StorageError::Remote(_)));

        let error = translate_blob_error(http_error(StatusCode::Forbidden).await, "a.txt");
        assert!(matches!(error, StorageError::Remote(_)));
    }

    #[test]
    fn test_rehydrate_priority_maps_to_sdk_enum() {
        assert!(matches!(
            SdkRehydratePriority::from(RehydratePriority::High),
            SdkRehydratePriority::High
        ));
        assert!(matches!(
            SdkRehydratePriority::from(RehydratePriority::Standard),
            SdkRehydratePriority::Standard
        ));
    }

    #[test]
    fn test_tier_round_trips_through_sdk_enum() {
        for tier in [AccessTier::Hot, AccessTier::Cool, AccessTier::Archive] {
            let sdk: SdkAccessTier = tier.into();
            assert_eq!(access_tier(&sdk), Some(tier));
        }
    }

    #[test]
    fn test_plain_errors_are_remote_faults() {
        let error = azure_core::Error::message(azure_core::error::ErrorKind::Io, "connection reset");
        assert!(matches!(
            translate_blob_error(error, "a.txt"),
            StorageError::Remote(_)
        ));
    }
}
