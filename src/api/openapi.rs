//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the dirindex REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the dirindex REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "dirindex REST API",
        version = "0.1.0",
        description = "Directory listing and on-demand zip archives with a live progress feed",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        // Archives
        crate::api::routes::create_archive,
        crate::api::routes::download_archive,

        // Listing
        crate::api::routes::list_root,
        crate::api::routes::list_path,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::DirectoryEntry,
        crate::types::ArchiveMode,
        crate::types::ArchiveStats,
        crate::types::ProgressStatus,
        crate::types::ProgressEvent,
        crate::types::QuotaKind,

        // API request/response types from routes
        crate::api::routes::ArchiveForm,
        crate::api::routes::DownloadQuery,
        crate::api::routes::ListingResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "archive", description = "Archives - Build a zip of a selection, follow its progress, download it once"),
        (name = "listing", description = "Listing - Directory contents used to build selections"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the API key schemes (header and query) to the spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Api-Key"))),
            );
            components.add_security_scheme(
                "api_key_query",
                SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("api_key"))),
            );
        }
    }
}
