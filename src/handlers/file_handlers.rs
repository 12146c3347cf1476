//! HTTP handlers for the file routes.
//! Upload bodies are streamed through the pipeline, never buffered.

use crate::{errors::AppError, models::file_status::FileStatus, state::AppState};
use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use std::io;
use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

/// Query params accepted by `POST /`.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(rename = "socketId")]
    pub socket_id: Option<String>,
}

/// `GET /`: list every file in the storage directory.
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileStatus>>, AppError> {
    let files = state.lister.list_statuses(&state.storage_dir).await?;
    Ok(Json(files))
}

/// `POST /?socketId=<id>`: stream a multipart body to disk.
///
/// Progress events go to sockets subscribed under `socketId`. Without one the
/// upload runs under a throwaway id nobody listens to. An upload still running
/// at `upload_timeout` is dropped, which removes its partial file.
pub async fn upload_files(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let session_id = query
        .socket_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other))
        .boxed();

    let upload = state
        .uploader
        .upload(session_id.clone(), content_type, stream);
    match timeout(state.upload_timeout, upload).await {
        Ok(outcome) => {
            outcome?;
        }
        Err(_) => {
            return Err(AppError::internal(format!(
                "upload for session {} timed out after {:?}",
                session_id, state.upload_timeout
            )));
        }
    }

    info!(%session_id, "Request finished with success!");
    Ok((
        StatusCode::OK,
        Json(json!({ "result": "File uploaded with success!" })),
    ))
}

/// `OPTIONS *`: empty 204; the CORS header is added by the router layer.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Any method without a dedicated handler.
pub async fn default_route() -> impl IntoResponse {
    "hello world"
}
