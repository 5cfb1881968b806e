//! HTTP handlers for the storage account API

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use blobdock_core::problemdetails::{self, Problem, ProblemDetails};
use tracing::{debug, warn};
use utoipa::OpenApi;

use super::cancellation::RequestCancellation;
use super::types::*;
use crate::error::StorageError;
use crate::store::{AccessTier, RehydratePriority};

/// OpenAPI documentation for the storage account API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_blobs,
        download_blob,
        upload_blob,
        add_container,
        archive_blob,
        rehydrate_blob,
    ),
    components(
        schemas(
            BlobItemResponse,
            UploadBlobForm,
            AddContainerRequest,
            AddContainerResponse,
            ArchiveBlobRequest,
            RehydrateBlobRequest,
            AccessTier,
            RehydratePriority,
            ProblemDetails,
        )
    ),
    tags(
        (name = "Storage Account", description = "Blob operations on the configured container"),
        (name = "Storage Account Management", description = "Container and access tier operations")
    )
)]
pub struct StorageApiDoc;

/// Configure storage account routes
///
/// The management paths also answer GET as downloads, so blobs named
/// `add-container`, `archive` or `rehydrate` stay reachable.
pub fn configure_routes() -> Router<Arc<StorageAppState>> {
    Router::new()
        .route("/storage-account", get(list_blobs).post(upload_blob))
        .route("/storage-account/{file_name}", get(download_blob))
        .route(
            "/storage-account/add-container",
            download_named("add-container").post(add_container),
        )
        .route(
            "/storage-account/archive",
            download_named("archive").post(archive_blob),
        )
        .route(
            "/storage-account/rehydrate",
            download_named("rehydrate").post(rehydrate_blob),
        )
}

/// GET handler downloading the blob whose name equals a static path segment
fn download_named(file_name: &'static str) -> MethodRouter<Arc<StorageAppState>> {
    get(
        move |State(state): State<Arc<StorageAppState>>, cancellation: RequestCancellation| async move {
            stream_blob(&state, file_name, &cancellation).await
        },
    )
}

/// List blobs in the container
#[utoipa::path(
    tag = "Storage Account",
    get,
    path = "/storage-account",
    responses(
        (status = 200, description = "Every blob in the container", body = Vec<BlobItemResponse>),
        (status = 502, description = "Storage account error", body = ProblemDetails)
    )
)]
async fn list_blobs(
    State(state): State<Arc<StorageAppState>>,
    cancellation: RequestCancellation,
) -> Result<impl IntoResponse, Problem> {
    let items = state.blob_service.list(cancellation.token()).await?;

    Ok(Json(
        items
            .into_iter()
            .map(BlobItemResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Download a blob
#[utoipa::path(
    tag = "Storage Account",
    get,
    path = "/storage-account/{file_name}",
    params(
        ("file_name" = String, Path, description = "Blob name"),
    ),
    responses(
        (status = 200, description = "Blob content"),
        (status = 404, description = "Blob not found", body = ProblemDetails),
        (status = 502, description = "Storage account error", body = ProblemDetails)
    )
)]
async fn download_blob(
    State(state): State<Arc<StorageAppState>>,
    Path(file_name): Path<String>,
    cancellation: RequestCancellation,
) -> Result<Response, Problem> {
    stream_blob(&state, &file_name, &cancellation).await
}

async fn stream_blob(
    state: &StorageAppState,
    file_name: &str,
    cancellation: &RequestCancellation,
) -> Result<Response, Problem> {
    let download = state
        .blob_service
        .download_stream(file_name, cancellation.token())
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(file_name)?);
    if let Some(length) = download.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    // The stream outlives the handler; body chunks are pulled by hyper.
    Ok((StatusCode::OK, headers, Body::from_stream(download.stream)).into_response())
}

/// Upload a file, replacing any blob with the same name
#[utoipa::path(
    tag = "Storage Account",
    post,
    path = "/storage-account",
    request_body(content = UploadBlobForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Blob uploaded"),
        (status = 204, description = "Empty file, nothing uploaded"),
        (status = 400, description = "Missing file or file name", body = ProblemDetails),
        (status = 413, description = "File exceeds the upload limit", body = ProblemDetails),
        (status = 502, description = "Storage account error", body = ProblemDetails)
    )
)]
async fn upload_blob(
    State(state): State<Arc<StorageAppState>>,
    cancellation: RequestCancellation,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Problem> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                problemdetails::new(StatusCode::BAD_REQUEST)
                    .with_title("Missing File Name")
                    .with_detail("The 'file' part must carry a file name")
            })?;
        let content_type = field.content_type().map(str::to_string);
        let content = field.bytes().await.map_err(bad_multipart)?;

        if content.is_empty() {
            debug!("Skipping empty upload for {}", file_name);
            return Ok(StatusCode::NO_CONTENT);
        }

        state
            .blob_service
            .upload(
                &file_name,
                content,
                content_type.as_deref(),
                cancellation.token(),
            )
            .await?;

        return Ok(StatusCode::OK);
    }

    Err(problemdetails::new(StatusCode::BAD_REQUEST)
        .with_title("Missing File")
        .with_detail("Expected a multipart field named 'file'"))
}

/// Create a container in the storage account
#[utoipa::path(
    tag = "Storage Account Management",
    post,
    path = "/storage-account/add-container",
    request_body = AddContainerRequest,
    responses(
        (status = 200, description = "Container created", body = AddContainerResponse),
        (status = 400, description = "Invalid request", body = ProblemDetails),
        (status = 409, description = "Container already exists", body = ProblemDetails),
        (status = 502, description = "Storage account error", body = ProblemDetails)
    )
)]
async fn add_container(
    State(state): State<Arc<StorageAppState>>,
    cancellation: RequestCancellation,
    Json(request): Json<AddContainerRequest>,
) -> Result<impl IntoResponse, Problem> {
    require_name("containerName", &request.container_name)?;

    let created = state
        .blob_service
        .create_container(&request.container_name, cancellation.token())
        .await?;

    Ok(Json(AddContainerResponse {
        container_name: created.container_name().to_string(),
    }))
}

/// Move a blob to the Archive tier
#[utoipa::path(
    tag = "Storage Account Management",
    post,
    path = "/storage-account/archive",
    request_body = ArchiveBlobRequest,
    responses(
        (status = 200, description = "Archival requested"),
        (status = 400, description = "Invalid request", body = ProblemDetails),
        (status = 404, description = "Blob not found", body = ProblemDetails),
        (status = 502, description = "Storage account error", body = ProblemDetails)
    )
)]
async fn archive_blob(
    State(state): State<Arc<StorageAppState>>,
    cancellation: RequestCancellation,
    Json(request): Json<ArchiveBlobRequest>,
) -> Result<impl IntoResponse, Problem> {
    require_name("blobName", &request.blob_name)?;

    state
        .blob_service
        .archive(&request.blob_name, cancellation.token())
        .await?;

    Ok(StatusCode::OK)
}

/// Bring an archived blob back to the Hot tier
#[utoipa::path(
    tag = "Storage Account Management",
    post,
    path = "/storage-account/rehydrate",
    request_body = RehydrateBlobRequest,
    responses(
        (status = 200, description = "Rehydration requested"),
        (status = 400, description = "Invalid request", body = ProblemDetails),
        (status = 404, description = "Blob not found", body = ProblemDetails),
        (status = 502, description = "Storage account error", body = ProblemDetails)
    )
)]
async fn rehydrate_blob(
    State(state): State<Arc<StorageAppState>>,
    cancellation: RequestCancellation,
    Json(request): Json<RehydrateBlobRequest>,
) -> Result<impl IntoResponse, Problem> {
    require_name("blobName", &request.blob_name)?;

    let priority = request.priority.unwrap_or(RehydratePriority::High);
    state
        .blob_service
        .rehydrate(&request.blob_name, priority, cancellation.token())
        .await?;

    Ok(StatusCode::OK)
}

fn require_name(field: &str, value: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidRequest(format!(
            "'{}' cannot be empty",
            field
        )));
    }
    Ok(())
}

fn bad_multipart(error: axum::extract::multipart::MultipartError) -> Problem {
    warn!("Rejected multipart upload: {}", error);
    problemdetails::new(error.status())
        .with_title("Invalid Multipart Body")
        .with_detail(error.body_text())
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// percent-encoded in `filename*`.
fn content_disposition(file_name: &str) -> Result<HeaderValue, Problem> {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();

    let value = if fallback == file_name {
        format!("attachment; filename=\"{}\"", file_name)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(file_name)
        )
    };

    HeaderValue::from_str(&value).map_err(|e| {
        problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR)
            .with_title("Invalid Header")
            .with_detail(e.to_string())
    })
}
