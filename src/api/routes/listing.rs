//! Directory listing handlers.

use super::ListingResponse;
use crate::api::AppState;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
};

/// GET /list - List the served root
#[utoipa::path(
    get,
    path = "/api/v1/list",
    tag = "listing",
    responses(
        (status = 200, description = "Entries of the served root", body = ListingResponse),
        (status = 404, description = "Root directory not accessible", body = crate::error::ApiError)
    )
)]
pub async fn list_root(State(state): State<AppState>) -> Result<Json<ListingResponse>> {
    list(&state, String::new()).await
}

/// GET /list/*path - List a directory below the served root
#[utoipa::path(
    get,
    path = "/api/v1/list/{path}",
    tag = "listing",
    params(
        ("path" = String, Path, description = "Directory relative to the served root")
    ),
    responses(
        (status = 200, description = "Entries of the directory", body = ListingResponse),
        (status = 400, description = "Path escapes the served root", body = crate::error::ApiError),
        (status = 404, description = "Directory not found", body = crate::error::ApiError)
    )
)]
pub async fn list_path(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<ListingResponse>> {
    list(&state, path).await
}

async fn list(state: &AppState, path: String) -> Result<Json<ListingResponse>> {
    let dir = state.service.locate_directory(&path).await?;
    let entries = state.service.scanner().list_directory(&dir).await?;
    Ok(Json(ListingResponse { path, entries }))
}
