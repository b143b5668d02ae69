//! Multi-step entry form: navigation, validation, review and submission.
//!
//! One [`FormController`] per session. It owns the field values, talks to the
//! backend through the injected [`RequestClient`] and hands undeliverable
//! submissions to the [`OfflineQueue`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, Utc};
use needlelog_core::{
    BackendRequest, DomainError, EntryId, Field, IncidentRecord, SubmissionResult, UploadReceipt,
    FIELD_COUNT,
};
use thiserror::Error;

use crate::attachment::{AttachmentError, AttachmentLimits, ImageAttachment};
use crate::offline_queue::OfflineQueue;
use crate::request_client::{RequestClient, RequestError};

pub const NOT_SPECIFIED: &str = "Not specified";
pub const NO_IMAGE: &str = "No image uploaded";

/// The twelve steps of the form, one field each.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FormStep {
    Department,
    InchargeName,
    Date,
    Time,
    MachineNo,
    LineNo,
    MachineType,
    NeedleType,
    Supervisor,
    Operator,
    Image,
    Remarks,
}

impl FormStep {
    pub const ALL: [FormStep; 12] = [
        FormStep::Department,
        FormStep::InchargeName,
        FormStep::Date,
        FormStep::Time,
        FormStep::MachineNo,
        FormStep::LineNo,
        FormStep::MachineType,
        FormStep::NeedleType,
        FormStep::Supervisor,
        FormStep::Operator,
        FormStep::Image,
        FormStep::Remarks,
    ];

    /// 1-based position.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn from_number(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn label(self) -> &'static str {
        match self {
            FormStep::Department => "Department",
            FormStep::InchargeName => "Incharge Name",
            FormStep::Date => "Date",
            FormStep::Time => "Time",
            FormStep::MachineNo => "Machine No.",
            FormStep::LineNo => "Line Number",
            FormStep::MachineType => "Machine Type",
            FormStep::NeedleType => "Needle Type",
            FormStep::Supervisor => "Supervisor",
            FormStep::Operator => "Operator",
            FormStep::Image => "Image",
            FormStep::Remarks => "Remarks",
        }
    }

    pub fn is_required(self) -> bool {
        !matches!(self, FormStep::Image | FormStep::Remarks)
    }

    /// Record column this step fills.
    pub fn field(self) -> Field {
        match self {
            FormStep::Department => Field::Department,
            FormStep::InchargeName => Field::InchargeName,
            FormStep::Date => Field::Date,
            FormStep::Time => Field::Time,
            FormStep::MachineNo => Field::MachineNo,
            FormStep::LineNo => Field::LineNo,
            FormStep::MachineType => Field::MachineType,
            FormStep::NeedleType => Field::NeedleType,
            FormStep::Supervisor => Field::Supervisor,
            FormStep::Operator => Field::Operator,
            FormStep::Image => Field::ImageLink,
            FormStep::Remarks => Field::Remarks,
        }
    }
}

/// Where `next_step` landed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Navigation {
    Step(FormStep),
    /// Past the last step: show the review.
    Review,
}

/// One line of the review screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewLine {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// The backend stored the record.
    Delivered {
        record: IncidentRecord,
        result: SubmissionResult,
    },
    /// Delivery failed; the request waits in the offline queue.
    Queued {
        record: IncidentRecord,
        entry_id: EntryId,
        error: RequestError,
    },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("offline queue unavailable: {0:#}")]
    Queue(anyhow::Error),
}

#[derive(Debug)]
struct FormState {
    step: FormStep,
    values: [String; FIELD_COUNT],
    image: Option<ImageAttachment>,
}

impl FormState {
    fn fresh() -> Self {
        let mut values: [String; FIELD_COUNT] = Default::default();
        let now = Local::now();
        values[Field::Date.index()] = now.format("%Y-%m-%d").to_string();
        values[Field::Time.index()] = now.format("%H:%M").to_string();
        Self {
            step: FormStep::Department,
            values,
            image: None,
        }
    }

    fn value(&self, step: FormStep) -> &str {
        &self.values[step.field().index()]
    }

    fn missing_required(&self) -> Vec<&'static str> {
        FormStep::ALL
            .iter()
            .filter(|s| s.is_required() && self.value(**s).trim().is_empty())
            .map(|s| s.label())
            .collect()
    }
}

/// Clears the submitting flag when dropped.
struct SubmittingGuard<'a>(&'a AtomicBool);

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one session of the entry form.
#[derive(Debug)]
pub struct FormController {
    client: Arc<RequestClient>,
    queue: OfflineQueue,
    limits: AttachmentLimits,
    state: Mutex<FormState>,
    submitting: AtomicBool,
}

impl FormController {
    pub fn new(client: Arc<RequestClient>, queue: OfflineQueue) -> Self {
        Self {
            client,
            queue,
            limits: AttachmentLimits::default(),
            state: Mutex::new(FormState::fresh()),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn with_attachment_limits(mut self, limits: AttachmentLimits) -> Self {
        self.limits = limits;
        self
    }

    fn state(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current_step(&self) -> FormStep {
        self.state().step
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    pub fn value(&self, step: FormStep) -> String {
        self.state().value(step).to_string()
    }

    /// Set the text value of a step. The image step takes an attachment instead.
    pub fn set_value(&self, step: FormStep, value: impl Into<String>) -> Result<(), DomainError> {
        if step == FormStep::Image {
            return Err(DomainError::validation("the image step takes an attachment, not text"));
        }
        self.state().values[step.field().index()] = value.into();
        Ok(())
    }

    /// Advance if the current step's required field is filled in.
    pub fn next_step(&self) -> Result<Navigation, DomainError> {
        let mut state = self.state();
        let step = state.step;
        if step.is_required() && state.value(step).trim().is_empty() {
            return Err(DomainError::validation(format!("{} is required", step.label())));
        }
        match FormStep::from_number(step.number() + 1) {
            Some(next) => {
                state.step = next;
                Ok(Navigation::Step(next))
            }
            None => Ok(Navigation::Review),
        }
    }

    pub fn prev_step(&self) -> FormStep {
        let mut state = self.state();
        if let Some(prev) = FormStep::from_number(state.step.number() - 1) {
            state.step = prev;
        }
        state.step
    }

    /// Return to the first step with every value kept.
    pub fn edit(&self) -> FormStep {
        let mut state = self.state();
        state.step = FormStep::Department;
        state.step
    }

    pub fn review(&self) -> Vec<ReviewLine> {
        let state = self.state();
        FormStep::ALL
            .iter()
            .map(|&step| {
                let value = match step {
                    FormStep::Image => match &state.image {
                        Some(image) => format!("{} ({:.1} KB)", image.name(), image.size() as f64 / 1024.0),
                        None => NO_IMAGE.to_string(),
                    },
                    _ if state.value(step).is_empty() => NOT_SPECIFIED.to_string(),
                    _ => state.value(step).to_string(),
                };
                ReviewLine {
                    label: step.label(),
                    value,
                }
            })
            .collect()
    }

    /// Clear every value and restore today's date and the current time.
    pub fn reset(&self) {
        *self.state() = FormState::fresh();
    }

    /// Read an image from disk and attach it.
    pub async fn attach_image(&self, path: &Path) -> Result<(), AttachmentError> {
        let image = ImageAttachment::read(path, &self.limits).await?;
        tracing::debug!(name = image.name(), size = image.size(), "image attached");
        self.state().image = Some(image);
        Ok(())
    }

    pub fn attach_image_bytes(
        &self,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), AttachmentError> {
        let image = ImageAttachment::from_bytes(name, mime_type, bytes, &self.limits)?;
        self.state().image = Some(image);
        Ok(())
    }

    pub fn clear_image(&self) {
        self.state().image = None;
    }

    /// Validate, upload the image (if any), then submit the record.
    ///
    /// A request that cannot be delivered is queued and reported as
    /// [`SubmitOutcome::Queued`]; the form is reset in both outcomes. A
    /// backend rejection (`success: false`) keeps the form as it is.
    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::AlreadySubmitting);
        }
        let _guard = SubmittingGuard(&self.submitting);

        let (values, image) = {
            let state = self.state();
            let missing = state.missing_required();
            if !missing.is_empty() {
                return Err(DomainError::validation(format!(
                    "missing required fields: {}",
                    missing.join(", ")
                ))
                .into());
            }
            (state.values.clone(), state.image.clone())
        };

        let image_link = match &image {
            Some(image) => self.upload_image(image).await,
            None => String::new(),
        };

        let mut builder = IncidentRecord::builder().timestamp(Utc::now());
        for step in FormStep::ALL {
            if step != FormStep::Image {
                builder = builder.field(step.field(), values[step.field().index()].clone());
            }
        }
        let record = builder.field(Field::ImageLink, image_link).build();
        let request = BackendRequest::submit_entry(record.clone());

        match self.client.send(&request).await {
            Ok(result) if result.success => {
                tracing::info!(date = record.date(), "entry submitted");
                self.reset();
                Ok(SubmitOutcome::Delivered { record, result })
            }
            Ok(result) => {
                tracing::warn!(message = %result.message, "backend rejected entry");
                let message = if result.message.is_empty() {
                    "Submission failed".to_string()
                } else {
                    result.message
                };
                Err(SubmitError::Rejected(message))
            }
            Err(error) => {
                tracing::warn!(error = %error, "entry undeliverable; queueing for later");
                let queued = self
                    .queue
                    .enqueue(self.client.endpoint(), &request)
                    .await
                    .map_err(SubmitError::Queue)?;
                self.reset();
                Ok(SubmitOutcome::Queued {
                    record,
                    entry_id: queued.entry.id,
                    error,
                })
            }
        }
    }

    /// Upload an image and return the link to put in the record.
    ///
    /// Upload problems never block the entry: the link becomes a placeholder.
    /// An undeliverable upload is not queued on its own, since a later replay
    /// would store a file that no row links to.
    async fn upload_image(&self, image: &ImageAttachment) -> String {
        let request = image.upload_request(Utc::now().timestamp_millis());
        match self.client.send(&request).await {
            Ok(result) if result.success => match result.data_as::<UploadReceipt>() {
                Some(receipt) => receipt.file_url,
                None => {
                    tracing::warn!("upload succeeded without a file URL");
                    image.failure_placeholder()
                }
            },
            Ok(result) => {
                tracing::warn!(message = %result.message, "image upload rejected");
                image.failure_placeholder()
            }
            Err(error) => {
                tracing::warn!(error = %error, "image upload undeliverable; entry keeps a placeholder");
                image.failure_placeholder()
            }
        }
    }

    /// Entries recorded for `date` (`YYYY-MM-DD`).
    pub async fn load_submissions(&self, date: &str) -> Result<Vec<IncidentRecord>, SubmitError> {
        let result = self.client.send(&BackendRequest::get_submissions(date)).await?;
        if !result.success {
            return Err(SubmitError::Rejected(result.message));
        }
        match result.data {
            None => Ok(Vec::new()),
            Some(data) => serde_json::from_value(data)
                .map_err(|e| SubmitError::Request(RequestError::Format(format!("submissions payload: {e}")))),
        }
    }

    pub async fn test_connection(&self) -> Result<SubmissionResult, SubmitError> {
        Ok(self.client.send(&BackendRequest::Test).await?)
    }
}

/// User-facing text for a submission failure.
pub fn friendly_message(err: &SubmitError) -> String {
    match err {
        SubmitError::Validation(e) => format!("Please complete the form: {e}"),
        SubmitError::AlreadySubmitting => "A submission is already in progress. Please wait.".to_string(),
        SubmitError::Request(RequestError::Network(_)) => {
            "Network error. Please check your internet connection and try again.".to_string()
        }
        SubmitError::Request(RequestError::Auth) => {
            "Permission denied. Please ensure the backend is properly deployed and has the correct permissions."
                .to_string()
        }
        SubmitError::Request(RequestError::Deployment) => {
            "The backend returned a web page instead of data. Please check the deployment URL.".to_string()
        }
        SubmitError::Request(RequestError::Format(_)) => {
            "Data format error. There may be an issue with the service configuration.".to_string()
        }
        SubmitError::Request(e @ RequestError::Http { .. }) => message_for(&e.to_string()),
        SubmitError::Rejected(message) => message_for(message),
        SubmitError::Queue(e) => format!("Could not save the entry for later: {e:#}"),
    }
}

/// Map a free-form failure message to user-facing text.
pub fn message_for(message: &str) -> String {
    if message.contains("CORS") {
        return "Network connection issue. Please check your internet connection and try again.".to_string();
    }
    if message.contains("403") || message.contains("Authorization") {
        return "Permission denied. Please ensure the backend is properly deployed and has the correct permissions."
            .to_string();
    }
    if message.contains("404") || message.contains("Not Found") {
        return "Service not found. Please check that the backend URL is correct.".to_string();
    }
    if message.contains("fetch") {
        return "Network error. Please check your internet connection and try again.".to_string();
    }
    if message.contains("JSON") {
        return "Data format error. There may be an issue with the service configuration.".to_string();
    }
    format!("Submission failed: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_client::testing::{ok_body, status, ScriptedTransport};
    use crate::request_client::{RetryPolicy, Shape};
    use serde_json::json;

    const ENDPOINT: &str = "http://backend.test/api/submit";

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            base_delay: std::time::Duration::from_millis(1),
            ..RetryPolicy::default()
        }
    }

    fn controller(transport: Arc<ScriptedTransport>) -> FormController {
        let client = Arc::new(RequestClient::new(ENDPOINT, transport, quick_policy()));
        FormController::new(client, OfflineQueue::in_memory(10))
    }

    fn fill_required(form: &FormController) {
        for step in FormStep::ALL {
            if step.is_required() {
                form.set_value(step, format!("{} value", step.label())).unwrap();
            }
        }
        form.set_value(FormStep::Date, "2024-05-01").unwrap();
    }

    fn submitted_record(transport: &ScriptedTransport) -> IncidentRecord {
        let calls = transport.calls.lock().unwrap();
        calls
            .iter()
            .rev()
            .find_map(|(_, _, req)| match req {
                BackendRequest::SubmitEntry { data } => Some(data.clone()),
                _ => None,
            })
            .expect("no submitEntry sent")
    }

    #[test]
    fn required_steps_block_navigation() {
        let form = controller(Arc::new(ScriptedTransport::always(ok_body("ok"))));
        assert!(form.next_step().is_err());

        form.set_value(FormStep::Department, "   ").unwrap();
        assert!(form.next_step().is_err());

        form.set_value(FormStep::Department, "Sewing").unwrap();
        assert_eq!(form.next_step().unwrap(), Navigation::Step(FormStep::InchargeName));
        assert_eq!(form.prev_step(), FormStep::Department);
        assert_eq!(form.prev_step(), FormStep::Department);
    }

    #[test]
    fn optional_steps_reach_review() {
        let form = controller(Arc::new(ScriptedTransport::always(ok_body("ok"))));
        fill_required(&form);

        let mut last = Navigation::Step(FormStep::Department);
        for _ in 0..12 {
            last = form.next_step().unwrap();
        }
        assert_eq!(last, Navigation::Review);
        assert_eq!(form.current_step(), FormStep::Remarks);
        assert_eq!(form.edit(), FormStep::Department);
        assert_eq!(form.value(FormStep::Department), "Department value");
    }

    #[test]
    fn review_uses_placeholders() {
        let form = controller(Arc::new(ScriptedTransport::always(ok_body("ok"))));
        let review = form.review();
        assert_eq!(review.len(), 12);
        assert_eq!(review[0], ReviewLine { label: "Department", value: NOT_SPECIFIED.into() });
        assert_eq!(review[10].value, NO_IMAGE);
        assert_eq!(review[5].label, "Line Number");
    }

    #[test]
    fn reset_restores_date_and_time_defaults() {
        let form = controller(Arc::new(ScriptedTransport::always(ok_body("ok"))));
        form.set_value(FormStep::Department, "Sewing").unwrap();
        form.set_value(FormStep::Date, "1999-01-01").unwrap();
        form.reset();
        assert_eq!(form.value(FormStep::Department), "");
        assert_eq!(form.value(FormStep::Date).len(), 10);
        assert_ne!(form.value(FormStep::Date), "1999-01-01");
        assert_eq!(form.value(FormStep::Time).len(), 5);
    }

    #[test]
    fn image_step_rejects_text() {
        let form = controller(Arc::new(ScriptedTransport::always(ok_body("ok"))));
        assert!(form.set_value(FormStep::Image, "x").is_err());
    }

    #[tokio::test]
    async fn submit_validates_every_required_field() {
        let transport = Arc::new(ScriptedTransport::always(ok_body("ok")));
        let form = controller(transport.clone());
        form.set_value(FormStep::Department, "Sewing").unwrap();

        let err = form.submit().await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(_)));
        assert!(err.to_string().contains("Operator"));
        assert!(transport.calls.lock().unwrap().is_empty());
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn delivered_submission_resets_the_form() {
        let transport = Arc::new(ScriptedTransport::always(ok_body("Entry submitted successfully")));
        let form = controller(transport.clone());
        fill_required(&form);
        form.set_value(FormStep::Remarks, "bent tip").unwrap();

        let outcome = form.submit().await.unwrap();

        let record = match outcome {
            SubmitOutcome::Delivered { record, .. } => record,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(record.get(Field::Remarks), "bent tip");
        assert_eq!(record.get(Field::ImageLink), "");
        assert!(record.get(Field::Timestamp).ends_with('Z'));
        assert_eq!(submitted_record(&transport), record);
        assert_eq!(form.value(FormStep::Department), "");
    }

    #[tokio::test]
    async fn image_is_uploaded_before_the_entry() {
        let upload = status(
            200,
            &json!({
                "success": true,
                "message": "Image uploaded successfully",
                "data": {"fileId": "f1", "fileUrl": "http://backend.test/files/f1"}
            })
            .to_string(),
        );
        let transport = Arc::new(ScriptedTransport::new(vec![upload], ok_body("Entry submitted successfully")));
        let form = controller(transport.clone());
        fill_required(&form);
        form.attach_image_bytes("tip.png", "image/png", vec![1, 2, 3]).unwrap();

        form.submit().await.unwrap();

        let calls = transport.calls.lock().unwrap();
        match &calls[0].2 {
            BackendRequest::UploadImage { file_name, .. } => {
                assert!(file_name.starts_with("needle_break_"));
                assert!(file_name.ends_with("_tip.png"));
            }
            other => panic!("expected upload first, got {other:?}"),
        }
        drop(calls);
        assert_eq!(
            submitted_record(&transport).get(Field::ImageLink),
            "http://backend.test/files/f1"
        );
    }

    #[tokio::test]
    async fn rejected_upload_leaves_a_placeholder() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![status(200, r#"{"success":false,"message":"Drive full"}"#)],
            ok_body("Entry submitted successfully"),
        ));
        let form = controller(transport.clone());
        fill_required(&form);
        form.attach_image_bytes("tip.jpg", "image/jpeg", vec![9]).unwrap();

        form.submit().await.unwrap();

        assert_eq!(submitted_record(&transport).get(Field::ImageLink), "Upload failed - tip.jpg");
    }

    #[tokio::test]
    async fn undeliverable_upload_is_not_queued_on_its_own() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                Err("connection reset".into()),
                Err("connection reset".into()),
                Err("connection reset".into()),
            ],
            ok_body("Entry submitted successfully"),
        ));
        let client = Arc::new(RequestClient::new(ENDPOINT, transport.clone(), quick_policy()));
        let queue = OfflineQueue::in_memory(10);
        let form = FormController::new(client, queue.clone());
        fill_required(&form);
        form.attach_image_bytes("tip.png", "image/png", vec![1]).unwrap();

        let outcome = form.submit().await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Delivered { .. }));
        assert_eq!(submitted_record(&transport).get(Field::ImageLink), "Upload failed - tip.png");
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn undeliverable_entry_is_queued() {
        let transport = Arc::new(ScriptedTransport::always(Err("connection refused".into())));
        let client = Arc::new(RequestClient::new(ENDPOINT, transport.clone(), quick_policy()));
        let queue = OfflineQueue::in_memory(10);
        let form = FormController::new(client, queue.clone());
        fill_required(&form);

        let outcome = form.submit().await.unwrap();

        let entry_id = match outcome {
            SubmitOutcome::Queued { entry_id, error, .. } => {
                assert!(matches!(error, RequestError::Network(_)));
                entry_id
            }
            other => panic!("unexpected outcome {other:?}"),
        };
        let queued = queue.get(entry_id).await.unwrap().unwrap();
        assert_eq!(queued.endpoint, ENDPOINT);
        assert!(matches!(queued.request, BackendRequest::SubmitEntry { .. }));
        assert_eq!(transport.shapes(), vec![Shape::Json, Shape::Json, Shape::Form]);
    }

    #[tokio::test]
    async fn backend_rejection_keeps_the_form() {
        let transport = Arc::new(ScriptedTransport::always(status(
            200,
            r#"{"success":false,"message":"Failed to submit entry: sheet locked"}"#,
        )));
        let form = controller(transport);
        fill_required(&form);

        let err = form.submit().await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(ref m) if m.contains("sheet locked")));
        assert_eq!(form.value(FormStep::Department), "Department value");
    }

    #[tokio::test]
    async fn load_submissions_decodes_rows() {
        let body = json!({
            "success": true,
            "message": "Found 1 submissions for 2024-05-01",
            "data": [["t", "Sewing", "R", "2024-05-01", "08:15"]]
        });
        let transport = Arc::new(ScriptedTransport::always(status(200, &body.to_string())));
        let form = controller(transport);

        let rows = form.load_submissions("2024-05-01").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(Field::Department), "Sewing");
        assert_eq!(rows[0].get(Field::Remarks), "");
    }

    #[test]
    fn friendly_messages_follow_the_substring_rules() {
        assert!(message_for("blocked by CORS policy").starts_with("Network connection issue"));
        assert!(message_for("HTTP 403").starts_with("Permission denied"));
        assert!(message_for("Not Found").starts_with("Service not found"));
        assert!(message_for("Failed to fetch").starts_with("Network error"));
        assert!(message_for("Unexpected token in JSON").starts_with("Data format error"));
        assert_eq!(message_for("sheet locked"), "Submission failed: sheet locked");

        let http = SubmitError::Request(RequestError::Http { status: 404, body: String::new() });
        assert!(friendly_message(&http).starts_with("Service not found"));
        assert!(friendly_message(&SubmitError::Request(RequestError::Network("x".into())))
            .starts_with("Network error"));
    }
}
