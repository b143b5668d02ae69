//! Connectivity tracking.

use chrono::{DateTime, Utc};

pub use crate::types::ConnectivityState;

/// Last known connectivity to the backend.
///
/// Starts online; the first failed probe or delivery flips it.
#[derive(Debug)]
pub struct OfflineMode {
    state: ConnectivityState,
    changed_at: Option<DateTime<Utc>>,
}

impl Default for OfflineMode {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineMode {
    pub fn new() -> Self {
        Self {
            state: ConnectivityState::Online,
            changed_at: None,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// When the state last flipped, if ever.
    pub fn changed_at(&self) -> Option<DateTime<Utc>> {
        self.changed_at
    }

    /// Mark the client as offline. Returns `true` if the state changed.
    pub fn set_offline(&mut self) -> bool {
        self.transition(ConnectivityState::Offline)
    }

    /// Mark the client as online. Returns `true` if the state changed.
    pub fn set_online(&mut self) -> bool {
        self.transition(ConnectivityState::Online)
    }

    pub fn is_offline(&self) -> bool {
        self.state == ConnectivityState::Offline
    }

    fn transition(&mut self, next: ConnectivityState) -> bool {
        if self.state == next {
            return false;
        }
        self.state = next;
        self.changed_at = Some(Utc::now());
        true
    }
}
