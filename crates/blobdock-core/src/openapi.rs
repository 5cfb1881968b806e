//! OpenAPI document assembly

use utoipa::openapi::{InfoBuilder, OpenApi, OpenApiBuilder, PathsBuilder};

/// Build the service-level document and fold every module document into it.
///
/// Title and version come from the caller; paths, component schemas and tags
/// come from `modules`. A later module wins when two define the same path.
pub fn build_api_doc(title: &str, version: &str, modules: Vec<OpenApi>) -> OpenApi {
    let base = OpenApiBuilder::new()
        .info(InfoBuilder::new().title(title).version(version).build())
        .paths(PathsBuilder::new().build())
        .build();

    merge_openapi_schemas(base, modules)
}

/// Merges multiple OpenAPI schemas into `base`.
pub fn merge_openapi_schemas(mut base: OpenApi, schemas: Vec<OpenApi>) -> OpenApi {
    for schema in schemas {
        base.paths.paths.extend(schema.paths.paths);

        if let Some(components) = schema.components {
            let base_components = base.components.get_or_insert_with(Default::default);
            base_components.schemas.extend(components.schemas);
            base_components.responses.extend(components.responses);
        }

        if let Some(tags) = schema.tags {
            base.tags.get_or_insert_with(Vec::new).extend(tags);
        }
    }

    base
}
