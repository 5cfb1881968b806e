//! Blob façade over a container-scoped store

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::StorageError;
use crate::store::{AccessTier, BlobDownload, BlobItem, BlobStore, RehydratePriority};

/// Blob operations for one container, plus container creation in its account.
///
/// Every call races the store against `cancel`; a token that fires first
/// fails the call with [`StorageError::Cancelled`] and drops the in-flight
/// request. Work already committed remotely is not undone.
#[derive(Clone)]
pub struct BlobStorageService {
    store: Arc<dyn BlobStore>,
}

impl BlobStorageService {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn container_name(&self) -> &str {
        self.store.container_name()
    }

    pub fn account_name(&self) -> &str {
        self.store.account_name()
    }

    /// Every blob in the container, each name once, drained across pages.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<BlobItem>, StorageError> {
        info!(
            "Listing all blobs in container {} in storage account {}",
            self.store.container_name(),
            self.store.account_name()
        );

        let drain = async {
            let mut pages = self.store.list_pages();
            let mut seen = HashSet::new();
            let mut items = Vec::new();

            while let Some(page) = pages.try_next().await? {
                for item in page {
                    if seen.insert(item.name.clone()) {
                        items.push(item);
                    }
                }
            }
            Ok::<_, StorageError>(items)
        };

        with_cancellation(cancel, "list", drain).await
    }

    pub async fn exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool, StorageError> {
        with_cancellation(cancel, "exists", self.store.exists(name)).await
    }

    /// Whole blob content, buffered in memory.
    pub async fn download(&self, name: &str, cancel: &CancellationToken) -> Result<Bytes, StorageError> {
        info!("Downloading blob {}", name);

        with_cancellation(cancel, "download", self.store.get(name))
            .await
            .inspect_err(|e| log_missing(e, "download", name))
    }

    /// Open the blob for streaming. A missing blob fails here, before any
    /// content is handed out.
    pub async fn download_stream(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<BlobDownload, StorageError> {
        info!("Downloading blob {} as a stream", name);

        with_cancellation(cancel, "download", self.store.open_read(name))
            .await
            .inspect_err(|e| log_missing(e, "download", name))
    }

    /// Create or replace `name`. Concurrent uploads to one name race and the
    /// last writer wins.
    pub async fn upload(
        &self,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        info!("Uploading blob {} ({} bytes)", name, body.len());

        let content_type = content_type
            .filter(|content_type| !content_type.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(name));

        with_cancellation(cancel, "upload", self.store.put(name, body, &content_type)).await
    }

    /// Create a container in the same account. Fails with
    /// [`StorageError::AlreadyExists`] when the name is taken.
    pub async fn create_container(
        &self,
        container: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn BlobStore>, StorageError> {
        info!("Adding new container {} to storage account {}", container, self.store.account_name());

        with_cancellation(cancel, "create container", self.store.create_container(container)).await
    }

    /// Request the move to the Archive tier. Success means the request was
    /// accepted; the remote transition happens in the background.
    pub async fn archive(&self, name: &str, cancel: &CancellationToken) -> Result<(), StorageError> {
        with_cancellation(
            cancel,
            "archive",
            self.store.set_tier(name, AccessTier::Archive, None),
        )
        .await
        .inspect_err(|e| log_missing(e, "archive", name))?;

        info!("Archiving process has started for blob {}", name);
        Ok(())
    }

    /// Request rehydration back to the Hot tier at `priority`.
    pub async fn rehydrate(
        &self,
        name: &str,
        priority: RehydratePriority,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        with_cancellation(
            cancel,
            "rehydrate",
            self.store.set_tier(name, AccessTier::Hot, Some(priority)),
        )
        .await
        .inspect_err(|e| log_missing(e, "rehydrate", name))?;

        info!(
            "Rehydrating process has started for blob {} with priority {}, it can take up to {} hours",
            name,
            priority,
            rehydrate_hours(priority)
        );
        Ok(())
    }
}

async fn with_cancellation<T, F>(
    cancel: &CancellationToken,
    operation: &str,
    future: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StorageError::Cancelled(operation.to_string())),
        result = future => result,
    }
}

fn log_missing(error: &StorageError, operation: &str, name: &str) {
    if error.is_not_found() {
        error!("Cannot {} {}, it doesn't exist", operation, name);
    }
}

fn rehydrate_hours(priority: RehydratePriority) -> u8 {
    match priority {
        RehydratePriority::High => 1,
        RehydratePriority::Standard => 15,
    }
}

/// Guess content type from the blob name's extension
fn guess_content_type(name: &str) -> String {
    let extension = match name.rsplit_once('.') {
        Some((_, extension)) => extension.to_lowercase(),
        None => String::new(),
    };

    match extension.as_str() {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        // Documents
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        // Text
        "txt" | "log" => "text/plain",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        // Archives
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",
        // Media
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;

    fn service() -> (BlobStorageService, MemoryBlobStore) {
        let store = MemoryBlobStore::new("devstoreaccount1", "files").with_page_size(3);
        (BlobStorageService::new(Arc::new(store.clone())), store)
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a.txt"), "text/plain");
        assert_eq!(guess_content_type("photo.JPG"), "image/jpeg");
        assert_eq!(guess_content_type("report.pdf"), "application/pdf");
        assert_eq!(guess_content_type("README"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_upload_download_archive_rehydrate_scenario() {
        let (service, store) = service();
        let cancel = CancellationToken::new();

        service
            .upload("a.txt", Bytes::from_static(b"hello"), None, &cancel)
            .await
            .unwrap();
        assert!(service.exists("a.txt", &cancel).await.unwrap());
        assert_eq!(
            service.download("a.txt", &cancel).await.unwrap(),
            Bytes::from_static(b"hello")
        );

        service.archive("a.txt", &cancel).await.unwrap();
        assert_eq!(store.access_tier("a.txt").await, Some(AccessTier::Archive));

        service
            .rehydrate("a.txt", RehydratePriority::High, &cancel)
            .await
            .unwrap();
        assert_eq!(store.access_tier("a.txt").await, Some(AccessTier::Hot));

        assert!(matches!(
            service.download("missing.txt", &cancel).await,
            Err(StorageError::NotFound(name)) if name == "missing.txt"
        ));
    }

    #[tokio::test]
    async fn test_missing_blob_operations_fail_without_mutation() {
        let (service, store) = service();
        let cancel = CancellationToken::new();

        assert!(service.download("ghost", &cancel).await.unwrap_err().is_not_found());
        assert!(service.download_stream("ghost", &cancel).await.unwrap_err().is_not_found());
        assert!(service.archive("ghost", &cancel).await.unwrap_err().is_not_found());
        assert!(service
            .rehydrate("ghost", RehydratePriority::Standard, &cancel)
            .await
            .unwrap_err()
            .is_not_found());

        assert!(!service.exists("ghost", &cancel).await.unwrap());
        assert_eq!(store.access_tier("ghost").await, None);
        assert!(service.list(&cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_overwrites_and_is_idempotent() {
        let (service, _) = service();
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            service
                .upload("notes.txt", Bytes::from_static(b"v1"), None, &cancel)
                .await
                .unwrap();
        }
        let listed = service.list(&cancel).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(service.download("notes.txt", &cancel).await.unwrap(), "v1");

        service
            .upload("notes.txt", Bytes::from_static(b"v2"), None, &cancel)
            .await
            .unwrap();
        assert_eq!(service.download("notes.txt", &cancel).await.unwrap(), "v2");
        assert_eq!(service.list(&cancel).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_returns_each_name_once_across_pages() {
        let (service, _) = service();
        let cancel = CancellationToken::new();

        let names: Vec<String> = (0..10).map(|i| format!("blob-{:02}", i)).collect();
        for name in &names {
            service
                .upload(name, Bytes::from_static(b"x"), Some("text/plain"), &cancel)
                .await
                .unwrap();
        }

        let listed: Vec<String> = service
            .list(&cancel)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(listed, names);
    }

    #[tokio::test]
    async fn test_create_container_twice_fails() {
        let (service, _) = service();
        let cancel = CancellationToken::new();

        let created = service.create_container("images", &cancel).await.unwrap();
        assert_eq!(created.container_name(), "images");

        assert!(matches!(
            service.create_container("images", &cancel).await,
            Err(StorageError::AlreadyExists(name)) if name == "images"
        ));
    }

    #[tokio::test]
    async fn test_upload_keeps_explicit_content_type() {
        let (service, _) = service();
        let cancel = CancellationToken::new();

        service
            .upload("data", Bytes::from_static(b"{}"), Some("application/json"), &cancel)
            .await
            .unwrap();
        let download = service.download_stream("data", &cancel).await.unwrap();
        assert_eq!(download.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_upload() {
        let (service, store) = service();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = service
            .upload("late.txt", Bytes::from_static(b"late"), None, &cancel)
            .await;
        assert!(matches!(result, Err(StorageError::Cancelled(op)) if op == "upload"));
        assert!(!store.exists("late.txt").await.unwrap());
    }
}
