//! `needlelog-client`
//!
//! **Responsibility:** the submission pipeline of the needle-break logger.
//!
//! This crate provides:
//! - A request client with retry, backoff and a fallback transport
//! - A durable offline queue for requests that could not be delivered
//! - A background sync worker that replays the queue
//! - The multi-step form controller that ties them together

pub mod attachment;
pub mod config;
pub mod form;
pub mod offline;
pub mod offline_queue;
pub mod request_client;
pub mod sync_worker;
pub mod types;

pub use attachment::{AttachmentError, AttachmentLimits, ImageAttachment};
pub use config::{ClientConfig, ConfigError};
pub use form::{friendly_message, FormController, FormStep, Navigation, SubmitError, SubmitOutcome};
pub use offline::{ConnectivityState, OfflineMode};
pub use offline_queue::OfflineQueue;
pub use request_client::{HttpTransport, RequestClient, RequestError, RetryPolicy, Transport};
pub use sync_worker::SyncWorker;
pub use types::{QueuedRequest, SyncEvent, SyncReport};
