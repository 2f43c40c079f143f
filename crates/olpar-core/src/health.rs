//! Cloud health tracking.
//!
//! One [`CloudHealth`] is owned per [`crate::services::Persistence`] instance
//! and updated after every remote attempt. `NotFound` is sticky: once the
//! remote database is known to be missing, nothing moves the state away from
//! it for the lifetime of the tracker.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const NOT_PROVISIONED_MESSAGE: &str = "The remote database has not been created.";
const PERMISSION_DENIED_MESSAGE: &str = "Permission denied by the remote database.";

/// Remote store reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CloudState {
    /// No remote attempt has completed yet
    #[default]
    Loading,
    /// Last remote call succeeded
    Connected,
    /// Last classified failure was recoverable (permission denied)
    Error,
    /// Remote database is not provisioned
    NotFound,
}

impl CloudState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::NotFound => "not_found",
        }
    }
}

/// Snapshot for a connectivity indicator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CloudStatus {
    pub state: CloudState,
    pub message: String,
}

/// Shared, mutable cloud health state.
#[derive(Debug, Default)]
pub struct CloudHealth {
    inner: Mutex<CloudStatus>,
}

impl CloudHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current `{state, message}` snapshot.
    pub fn snapshot(&self) -> CloudStatus {
        self.lock().clone()
    }

    pub fn state(&self) -> CloudState {
        self.lock().state
    }

    pub fn is_not_found(&self) -> bool {
        self.state() == CloudState::NotFound
    }

    /// Record a successful remote call.
    pub fn mark_connected(&self) {
        let mut status = self.lock();
        if status.state == CloudState::NotFound {
            return;
        }
        status.state = CloudState::Connected;
        status.message.clear();
    }

    /// Classify a remote failure and update state accordingly.
    ///
    /// Transient failures are only logged.
    pub fn record_failure(&self, error: &StoreError) {
        let Some(class) = error.failure_class() else {
            tracing::warn!("Remote store issue (transient): {error}");
            return;
        };

        let mut status = self.lock();
        if status.state == CloudState::NotFound {
            return;
        }
        match class {
            CloudState::NotFound => {
                tracing::warn!("Remote database not provisioned, switching to local storage: {error}");
                status.state = CloudState::NotFound;
                status.message = NOT_PROVISIONED_MESSAGE.to_string();
            }
            CloudState::Error => {
                tracing::warn!("Remote permission denied: {error}");
                status.state = CloudState::Error;
                status.message = PERMISSION_DENIED_MESSAGE.to_string();
            }
            CloudState::Loading | CloudState::Connected => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CloudStatus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
