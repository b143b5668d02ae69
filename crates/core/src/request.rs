//! Requests the backend understands, tagged by `action`.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::record::IncidentRecord;

/// A request to the backend.
///
/// Serialized as a JSON object with an `action` discriminator and camelCase
/// fields, e.g. `{"action":"getSubmissions","date":"2024-05-01"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BackendRequest {
    SubmitEntry {
        data: IncidentRecord,
    },
    GetSubmissions {
        date: String,
    },
    #[serde(rename_all = "camelCase")]
    UploadImage {
        file_name: String,
        /// Base64 (standard alphabet) encoded file contents.
        file_data: String,
        mime_type: String,
    },
    Test,
}

impl BackendRequest {
    pub fn submit_entry(record: IncidentRecord) -> Self {
        Self::SubmitEntry { data: record }
    }

    pub fn get_submissions(date: impl Into<String>) -> Self {
        Self::GetSubmissions { date: date.into() }
    }

    pub fn action(&self) -> Action {
        match self {
            BackendRequest::SubmitEntry { .. } => Action::SubmitEntry,
            BackendRequest::GetSubmissions { .. } => Action::GetSubmissions,
            BackendRequest::UploadImage { .. } => Action::UploadImage,
            BackendRequest::Test => Action::Test,
        }
    }

    /// Query parameters carrying this request over `GET`.
    ///
    /// Only read actions have a query form; writes return `None`.
    pub fn query_pairs(&self) -> Option<Vec<(&'static str, String)>> {
        match self {
            BackendRequest::Test => Some(vec![("action", Action::Test.as_str().to_string())]),
            BackendRequest::GetSubmissions { date } => Some(vec![
                ("action", Action::GetSubmissions.as_str().to_string()),
                ("date", date.clone()),
            ]),
            BackendRequest::SubmitEntry { .. } | BackendRequest::UploadImage { .. } => None,
        }
    }
}

/// The `action` discriminator on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    SubmitEntry,
    GetSubmissions,
    UploadImage,
    Test,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::SubmitEntry => "submitEntry",
            Action::GetSubmissions => "getSubmissions",
            Action::UploadImage => "uploadImage",
            Action::Test => "test",
        }
    }

    /// Read actions have no side effects and may travel as a `GET` query.
    pub fn is_read(self) -> bool {
        matches!(self, Action::Test | Action::GetSubmissions)
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitEntry" => Ok(Action::SubmitEntry),
            "getSubmissions" => Ok(Action::GetSubmissions),
            "uploadImage" => Ok(Action::UploadImage),
            "test" => Ok(Action::Test),
            other => Err(DomainError::unknown_action(other)),
        }
    }
}
