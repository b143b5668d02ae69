//! `/api/submit`: the backend contract.
//!
//! Every answer is HTTP 200 with a `{success, message, data?}` envelope; only
//! the auth layer answers with another status.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Query, Request, State},
    http::{header, HeaderMap},
    Form, Json,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use needlelog_core::{
    iso_timestamp, Action, BackendRequest, EntryReceipt, Field, IncidentRecord, ServiceInfo,
    SubmissionResult, UploadReceipt,
};
use serde::Deserialize;
use serde_json::Value;

use crate::app::errors::{invalid_action, invalid_format};
use crate::app::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Form-encoded envelope: a single `data` field holding the JSON request.
#[derive(Debug, Deserialize)]
struct FormEnvelope {
    data: String,
}

/// `POST`: JSON body, or a form-encoded `data` field carrying the same JSON.
pub async fn post(State(state): State<AppState>, headers: HeaderMap, req: Request) -> Json<SubmissionResult> {
    let raw = match read_body(req).await {
        Some(raw) => raw,
        None => return Json(invalid_format()),
    };

    let request = match parse_request(raw) {
        Ok(request) => request,
        Err(failure) => return Json(failure),
    };

    let base_url = base_url(&state, &headers);
    Json(dispatch(&state, &base_url, request, false))
}

/// `GET ?action=…`: read actions only.
pub async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<SubmissionResult> {
    let action = params.get("action").map(String::as_str);
    let request = match action.map(str::parse::<Action>) {
        Some(Ok(Action::Test)) => BackendRequest::Test,
        Some(Ok(Action::GetSubmissions)) => match params.get("date") {
            Some(date) if !date.trim().is_empty() => BackendRequest::get_submissions(date.trim()),
            _ => return Json(SubmissionResult::failure("Date parameter is required")),
        },
        _ => return Json(invalid_action(action)),
    };

    let base_url = base_url(&state, &headers);
    Json(dispatch(&state, &base_url, request, true))
}

async fn read_body(req: Request) -> Option<Value> {
    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let Form(envelope) = Form::<FormEnvelope>::from_request(req, &()).await.ok()?;
        serde_json::from_str(&envelope.data).ok()
    } else {
        let body = Bytes::from_request(req, &()).await.ok()?;
        serde_json::from_slice(&body).ok()
    }
}

fn parse_request(raw: Value) -> Result<BackendRequest, SubmissionResult> {
    let action = raw.get("action").and_then(Value::as_str);
    match action.map(str::parse::<Action>) {
        Some(Ok(_)) => {}
        _ => {
            tracing::warn!(action = ?action, "rejected request with invalid action");
            return Err(invalid_action(action));
        }
    }

    serde_json::from_value(raw).map_err(|err| {
        tracing::warn!(error = %err, "rejected malformed request");
        invalid_format()
    })
}

fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.public_url {
        return url.to_string();
    }
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}"),
        None => String::new(),
    }
}

fn dispatch(state: &AppState, base_url: &str, request: BackendRequest, via_get: bool) -> SubmissionResult {
    match request {
        BackendRequest::SubmitEntry { data } => {
            let timestamp = data.get(Field::Timestamp).to_string();
            let appended = state.sheet.append(data);
            tracing::info!(row = appended.row_number, entries = appended.entry_count, "entry appended");
            SubmissionResult::ok("Entry submitted successfully").with_data(EntryReceipt {
                row_number: appended.row_number,
                timestamp,
                entry_count: appended.entry_count,
            })
        }
        BackendRequest::GetSubmissions { date } => {
            if state.sheet.is_empty() {
                return SubmissionResult::ok("No submissions found").with_data(Vec::<IncidentRecord>::new());
            }
            let rows = state.sheet.rows_for_date(&date);
            SubmissionResult::ok(format!("Found {} submissions for {}", rows.len(), date)).with_data(rows)
        }
        BackendRequest::UploadImage {
            file_name,
            file_data,
            mime_type,
        } => {
            let bytes = match STANDARD.decode(file_data.as_bytes()) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(error = %err, file = %file_name, "upload is not valid base64");
                    return SubmissionResult::failure(format!("Failed to upload image: {err}"));
                }
            };
            let size = bytes.len() as u64;
            let stored = state.sheet.store_file(file_name, mime_type, bytes);
            tracing::info!(file_id = %stored.id, size, "image stored");
            SubmissionResult::ok("Image uploaded successfully").with_data(UploadReceipt {
                file_id: stored.id.to_string(),
                file_url: format!("{base_url}/files/{}", stored.id),
                file_name: stored.name,
                size,
            })
        }
        BackendRequest::Test => {
            let message = if via_get { "GET test successful" } else { "Test successful" };
            SubmissionResult::ok(message).with_data(ServiceInfo {
                timestamp: iso_timestamp(Utc::now()),
                version: Some(VERSION.to_string()),
            })
        }
    }
}
