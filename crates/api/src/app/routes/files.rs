use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use needlelog_core::FileId;

use crate::app::errors::result_error;
use crate::app::AppState;

/// Serve an uploaded file with its original MIME type.
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<FileId>() else {
        return result_error(StatusCode::NOT_FOUND, "File not found");
    };
    let Some(file) = state.sheet.file(id) else {
        return result_error(StatusCode::NOT_FOUND, "File not found");
    };

    let content_type = HeaderValue::from_str(&file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}\"", file.name.replace('"', "")))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    (
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        file.bytes,
    )
        .into_response()
}
