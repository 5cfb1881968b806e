use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{Extension, Router};
use blobdock_core::openapi::build_api_doc;
use blobdock_storage::handlers::{configure_routes, StorageApiDoc, StorageAppState};
use blobdock_storage::BlobStorageService;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Full application: storage routes, Swagger UI and request tracing.
pub fn build_router(
    blob_service: Arc<BlobStorageService>,
    abort: CancellationToken,
    max_upload_bytes: usize,
) -> Router {
    let state = Arc::new(StorageAppState::new(blob_service));
    let api_doc = build_api_doc(
        "Blobdock API",
        env!("CARGO_PKG_VERSION"),
        vec![StorageApiDoc::openapi()],
    );

    Router::new()
        .merge(configure_routes().with_state(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(Extension(abort))
        .layer(TraceLayer::new_for_http())
}
