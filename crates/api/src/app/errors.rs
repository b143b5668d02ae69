use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use needlelog_core::SubmissionResult;

/// A `{success: false, message}` envelope with an explicit HTTP status.
pub fn result_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(SubmissionResult::failure(message))).into_response()
}

/// Failure envelope for a body that could not be parsed.
pub fn invalid_format() -> SubmissionResult {
    SubmissionResult::failure("Invalid request data format")
}

/// Failure envelope for a missing or unknown `action`.
pub fn invalid_action(action: Option<&str>) -> SubmissionResult {
    SubmissionResult::failure(format!("Invalid action: {}", action.unwrap_or("none provided")))
}
