//! Request and response types for storage account HTTP handlers

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::BlobStorageService;
use crate::store::{AccessTier, BlobItem, RehydratePriority};

/// Application state for storage account handlers
pub struct StorageAppState {
    pub blob_service: Arc<BlobStorageService>,
}

impl StorageAppState {
    pub fn new(blob_service: Arc<BlobStorageService>) -> Self {
        Self { blob_service }
    }
}

/// A blob in the configured container
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlobItemResponse {
    #[schema(example = "reports/2024-q1.pdf")]
    pub name: String,
    /// Size in bytes
    #[schema(example = 12345)]
    pub size: u64,
    #[schema(example = "application/pdf")]
    pub content_type: Option<String>,
    pub access_tier: Option<AccessTier>,
}

impl From<BlobItem> for BlobItemResponse {
    fn from(item: BlobItem) -> Self {
        Self {
            name: item.name,
            size: item.size,
            content_type: item.content_type,
            access_tier: item.access_tier,
        }
    }
}

/// Multipart body for uploads
#[derive(Debug, ToSchema)]
pub struct UploadBlobForm {
    /// File content; the part's file name becomes the blob name
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Request to create a container in the storage account
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddContainerRequest {
    #[schema(example = "images")]
    pub container_name: String,
}

/// Response after creating a container
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddContainerResponse {
    #[schema(example = "images")]
    pub container_name: String,
}

/// Request to move a blob to the Archive tier
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveBlobRequest {
    #[schema(example = "reports/2024-q1.pdf")]
    pub blob_name: String,
}

/// Request to bring an archived blob back to the Hot tier
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RehydrateBlobRequest {
    #[schema(example = "reports/2024-q1.pdf")]
    pub blob_name: String,
    /// Defaults to `High`
    #[serde(default)]
    pub priority: Option<RehydratePriority>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_item_response_is_camel_case() {
        let response = BlobItemResponse::from(BlobItem {
            name: "a.txt".to_string(),
            size: 5,
            content_type: Some("text/plain".to_string()),
            access_tier: Some(AccessTier::Hot),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["contentType"], "text/plain");
        assert_eq!(json["accessTier"], "Hot");
    }

    #[test]
    fn test_rehydrate_priority_is_optional() {
        let request: RehydrateBlobRequest =
            serde_json::from_str(r#"{"blobName":"a.txt"}"#).unwrap();
        assert_eq!(request.priority, None);

        let request: RehydrateBlobRequest =
            serde_json::from_str(r#"{"blobName":"a.txt","priority":"Standard"}"#).unwrap();
        assert_eq!(request.priority, Some(RehydratePriority::Standard));
    }
}
