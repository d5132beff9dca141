//! Archive handlers: build, progress feed, download handoff.

use super::{ArchiveForm, DownloadQuery};
use crate::api::{AppState, DOWNLOAD_BASE};
use crate::archive::Artifact;
use crate::error::Result;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderName, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;

/// Tells reverse proxies (nginx) not to buffer the progress feed
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// POST /archive - Build an archive of a selection
///
/// With `progress: true` the response is a `text/event-stream` of
/// [`ProgressEvent`](crate::types::ProgressEvent)s ending with a `done` event
/// carrying the download URL, or an `error` event. Otherwise the request
/// waits for the archive and returns it directly.
#[utoipa::path(
    post,
    path = "/api/v1/archive",
    tag = "archive",
    request_body = ArchiveForm,
    responses(
        (status = 200, description = "Progress feed (text/event-stream) or the archive itself (application/zip)"),
        (status = 400, description = "Invalid path or empty selection", body = crate::error::ApiError),
        (status = 404, description = "Directory not found", body = crate::error::ApiError),
        (status = 413, description = "Selection exceeds the size limit", body = crate::error::ApiError),
        (status = 503, description = "Compressor unavailable", body = crate::error::ApiError),
        (status = 504, description = "Archive took too long (blocking mode)", body = crate::error::ApiError),
        (status = 507, description = "Not enough scratch space", body = crate::error::ApiError)
    )
)]
pub async fn create_archive(
    State(state): State<AppState>,
    Json(form): Json<ArchiveForm>,
) -> Result<Response> {
    let request = form.to_request();
    let dir = state.service.locate_directory(&form.path).await?;
    let handle = state.service.start(&dir, &request).await?;
    let monitor = state.service.monitor(handle);

    if request.wants_live_progress {
        let events = monitor
            .into_events(DOWNLOAD_BASE.to_string())
            .filter_map(|event| match serde_json::to_string(&event) {
                Ok(json_data) => Some(Ok::<_, Infallible>(SseEvent::default().data(json_data))),
                Err(e) => {
                    tracing::warn!("Failed to serialize progress event to JSON: {}", e);
                    None
                }
            });

        let headers = [
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ];
        return Ok((headers, Sse::new(events).keep_alive(KeepAlive::default())).into_response());
    }

    let job = monitor.wait().await?;
    let artifact = state
        .service
        .handoff(&job.id, Some(&job.display_name))
        .await?;
    Ok(attachment_response(artifact))
}

/// GET /download/:token - Download a finished archive (once)
#[utoipa::path(
    get,
    path = "/api/v1/download/{token}",
    tag = "archive",
    params(
        ("token" = String, Path, description = "Job token from the progress feed's download URL"),
        ("name" = Option<String>, Query, description = "Attachment filename")
    ),
    responses(
        (status = 200, description = "The archive (application/zip)"),
        (status = 400, description = "Malformed token", body = crate::error::ApiError),
        (status = 404, description = "Archive already downloaded, expired or failed", body = crate::error::ApiError)
    )
)]
pub async fn download_archive(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let artifact = state.service.handoff(&token, query.name.as_deref()).await?;
    Ok(attachment_response(artifact))
}

/// Stream a claimed artifact as a zip attachment
fn attachment_response(artifact: Artifact) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        ),
        (header::CONTENT_LENGTH, artifact.len.to_string()),
        (header::CACHE_CONTROL, "no-cache, must-revalidate".to_string()),
        (header::PRAGMA, "no-cache".to_string()),
    ];
    (headers, Body::from_stream(artifact.into_stream())).into_response()
}
