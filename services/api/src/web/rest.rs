//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use slideshow_core::{DeleteOutcome, SlideRecord, SlideshowError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        download_photos_handler,
        list_slides_handler,
        delete_slides_handler,
    ),
    components(
        schemas(SlideResponse, DeleteSlidesRequest, DeleteSlidesResponse)
    ),
    tags(
        (name = "Slideshow API", description = "Refreshes and serves a random photo slideshow from a Synology NAS.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One photo of the slideshow, served under `/photos/{relative_url}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SlideResponse {
    relative_url: String,
    /// Capture time, ISO 8601, with an offset when the photo recorded one.
    date_taken: Option<String>,
    google_maps_link: String,
    location: String,
}

impl From<SlideRecord> for SlideResponse {
    fn from(slide: SlideRecord) -> Self {
        Self {
            relative_url: slide.relative_url,
            date_taken: slide.taken_at.map(|t| t.to_string()),
            google_maps_link: slide.map_link,
            location: slide.place,
        }
    }
}

/// The slides to delete, identified by their relative URL.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteSlidesRequest {
    ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteSlidesResponse {
    deleted: Vec<String>,
    not_found: Vec<String>,
}

impl From<DeleteOutcome> for DeleteSlidesResponse {
    fn from(outcome: DeleteOutcome) -> Self {
        Self {
            deleted: outcome.deleted,
            not_found: outcome.not_found,
        }
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Gives each pipeline failure kind its own status code.
pub fn status_for(err: &SlideshowError) -> StatusCode {
    match err {
        SlideshowError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
        SlideshowError::InvalidApiVersion { .. } => StatusCode::NOT_IMPLEMENTED,
        SlideshowError::FailedToInitiateSearch => StatusCode::SERVICE_UNAVAILABLE,
        SlideshowError::SearchTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        SlideshowError::Transport(_) => StatusCode::BAD_GATEWAY,
        SlideshowError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SlideshowError::Cancelled => StatusCode::REQUEST_TIMEOUT,
    }
}

fn failure(operation: &str, err: SlideshowError) -> (StatusCode, String) {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("{} failed: {}", operation, err);
    } else {
        warn!("{} failed: {}", operation, err);
    }
    (status, err.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Replace the slideshow with a fresh random sample from the NAS.
///
/// Runs the whole refresh: login, search, download, unpack, optional convert,
/// logout, then returns the new slide list. Dropping the request cancels the run.
#[utoipa::path(
    get,
    path = "/download-photos",
    responses(
        (status = 200, description = "Photos refreshed", body = [SlideResponse]),
        (status = 401, description = "The NAS rejected the configured account"),
        (status = 501, description = "The NAS does not offer a required API version"),
        (status = 502, description = "The NAS could not be reached or answered badly"),
        (status = 503, description = "The NAS did not start the search"),
        (status = 504, description = "The search did not finish in time"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn download_photos_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = CancellationToken::new();
    let _cancel_on_drop = token.clone().drop_guard();

    // The run lives on its own task so cleanup finishes even if this request goes away.
    let task_state = app_state.clone();
    let run = tokio::spawn(async move {
        let _refreshing = task_state.refresh_lock.write().await;
        task_state.pipeline.refresh(&token).await
    });

    let slides = run
        .await
        .map_err(|e| {
            error!("Photo refresh task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Photo refresh task failed".to_string(),
            )
        })?
        .map_err(|e| failure("Photo refresh", e))?;

    info!("Photo refresh produced {} slides", slides.len());
    let body: Vec<SlideResponse> = slides.into_iter().map(SlideResponse::from).collect();
    Ok(Json(body))
}

/// List the slides currently on disk.
///
/// Waits for a running refresh or delete to finish first.
#[utoipa::path(
    get,
    path = "/slides",
    responses(
        (status = 200, description = "Current slides", body = [SlideResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_slides_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = CancellationToken::new();
    let _cancel_on_drop = token.clone().drop_guard();

    let _reading = app_state.refresh_lock.read().await;
    let slides = app_state
        .pipeline
        .catalog()
        .list_slides(&token)
        .await
        .map_err(|e| failure("Listing slides", e))?;

    let body: Vec<SlideResponse> = slides.into_iter().map(SlideResponse::from).collect();
    Ok(Json(body))
}

/// Delete slides from disk.
///
/// Ids that do not match a current slide are returned in `not_found`.
#[utoipa::path(
    delete,
    path = "/slides",
    request_body = DeleteSlidesRequest,
    responses(
        (status = 200, description = "Deletion outcome", body = DeleteSlidesResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_slides_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<DeleteSlidesRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = CancellationToken::new();
    let _cancel_on_drop = token.clone().drop_guard();

    let _refreshing = app_state.refresh_lock.write().await;
    let outcome = app_state
        .pipeline
        .catalog()
        .delete_slides(request.ids, &token)
        .await
        .map_err(|e| failure("Deleting slides", e))?;

    Ok(Json(DeleteSlidesResponse::from(outcome)))
}
