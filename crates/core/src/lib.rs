//! `needlelog-core`: record model and backend contract.
//!
//! This crate contains **pure domain** types (no I/O): the positional
//! incident record, the tagged request union and the uniform result envelope.

pub mod error;
pub mod id;
pub mod record;
pub mod request;
pub mod result;

pub use error::{DomainError, DomainResult};
pub use id::{EntryId, FileId};
pub use record::{iso_timestamp, Field, IncidentRecord, RecordBuilder, FIELD_COUNT};
pub use request::{Action, BackendRequest};
pub use result::{EntryReceipt, ServiceInfo, SubmissionResult, UploadReceipt};
