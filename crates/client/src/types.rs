//! Shared client types.

use chrono::{DateTime, Utc};
use needlelog_core::{Action, BackendRequest, EntryId};
use serde::{Deserialize, Serialize};

/// A request that could not be delivered and waits in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: EntryId,
    pub created_at: DateTime<Utc>,
    /// Endpoint the request was originally aimed at; replays go there too.
    pub endpoint: String,
    pub request: BackendRequest,
}

impl QueuedRequest {
    pub fn action(&self) -> Action {
        self.request.action()
    }
}

/// A queue row whose stored request could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptEntry {
    /// Raw id column; may itself be the unreadable part.
    pub id: String,
    pub error: String,
}

/// Every queue row in insertion order, split into decoded and undecodable.
#[derive(Debug, Clone, Default)]
pub struct QueueScan {
    pub entries: Vec<QueuedRequest>,
    pub corrupt: Vec<CorruptEntry>,
}

/// Result of enqueueing a request.
#[derive(Debug, Clone)]
pub struct Enqueued {
    pub entry: QueuedRequest,
    /// Oldest entries dropped to keep the queue within capacity.
    pub evicted: Vec<EntryId>,
}

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// The backend answered the last probe or request.
    Online,
    /// Network unreachable or backend unavailable.
    Offline,
}

/// Outcome of one pass over the offline queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    pub total: usize,
}

/// Events broadcast by the sync worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Completed(SyncReport),
    Failed { error: String },
    Connectivity { state: ConnectivityState },
}
