//! REST API server module
//!
//! Provides an OpenAPI 3.1 compliant REST API for browsing the served
//! directory and building downloadable archives of a selection.

use crate::archive::ArchiveService;
use crate::config::Config;
use crate::error::Result;
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Prefix every API route is served under
pub const API_PREFIX: &str = "/api/v1";

/// Base of the download URLs handed out in progress events
pub const DOWNLOAD_BASE: &str = "/api/v1/download";

/// Create the API router with all route definitions
///
/// # Routes
///
/// All routes live under `/api/v1`.
///
/// ## Archives
/// - `POST /archive` - Build an archive (progress feed or blocking download)
/// - `GET /download/:token` - Download a finished archive, exactly once
///
/// ## Listing
/// - `GET /list` - List the served root
/// - `GET /list/*path` - List a subdirectory
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(service: Arc<ArchiveService>, config: Arc<Config>) -> Router {
    let state = AppState::new(service, config.clone());

    let api = Router::new()
        // Archives
        .route("/archive", post(routes::create_archive))
        .route("/download/:token", get(routes::download_archive))
        // Listing
        .route("/list", get(routes::list_root))
        .route("/list/*path", get(routes::list_path))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    let router = Router::new().nest(API_PREFIX, api);

    // Swagger UI reuses the /api/v1/openapi.json endpoint defined above
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    let router = if config.server.api.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            config.server.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    // CORS is the outermost layer so preflight requests never need a key
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// An empty list or `"*"` allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails. See [`serve_with_shutdown`] for a server
/// that stops on a signal.
///
/// # Example
///
/// ```no_run
/// use dirindex::{ArchiveService, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let service = Arc::new(ArchiveService::new(&config)?);
///
/// // Start API server (blocks until shutdown)
/// dirindex::api::start_api_server(service, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(service: Arc<ArchiveService>, config: Arc<Config>) -> Result<()> {
    serve_with_shutdown(service, config, std::future::pending()).await
}

/// Serve the API until `shutdown` completes, then drain in-flight requests
pub async fn serve_with_shutdown<F>(
    service: Arc<ArchiveService>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.api.bind_address;

    tracing::info!(
        address = %bind_address,
        root = ?config.listing.root_dir,
        scratch = ?config.archive.scratch_dir,
        "Starting API server"
    );

    let app = create_router(service, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
