//! Types for DFU session tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::engine::TransferOptions;
use crate::orchestrator::DfuOutcome;

/// State of a DFU session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Admitted, transfer not yet reported anything.
    Idle,
    /// Connecting to the device.
    Connecting,
    /// DFU process starting.
    Starting,
    /// Switching the device into bootloader mode.
    EnablingDfuMode,
    /// Validating firmware on the device.
    Validating,
    /// Uploading firmware data.
    Uploading,
    /// Disconnecting from the device.
    Disconnecting,
    /// Transfer finished successfully. Terminal.
    Completed,
    /// Transfer aborted. Terminal.
    Aborted,
    /// Transfer failed. Terminal.
    Failed,
}

impl SessionState {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Starting => "starting",
            SessionState::EnablingDfuMode => "enabling_dfu_mode",
            SessionState::Validating => "validating",
            SessionState::Uploading => "uploading",
            SessionState::Disconnecting => "disconnecting",
            SessionState::Completed => "completed",
            SessionState::Aborted => "aborted",
            SessionState::Failed => "failed",
        }
    }

    /// Whether this state ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Aborted | SessionState::Failed
        )
    }
}

/// One in-flight firmware update, keyed by device address.
///
/// Owns the execution slot and the single-resolution completion sender. Not
/// cloneable: the completion must have exactly one owner.
#[derive(Debug)]
pub struct Session {
    /// Target device address; unique key, immutable for the session lifetime.
    pub device_address: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Execution slot owned by this session; released on terminal resolve.
    pub slot: usize,
    /// Last reported upload percentage, if any.
    pub percent: Option<i32>,
    /// When the session was admitted.
    pub started_at: DateTime<Utc>,
    /// Immutable snapshot of the options supplied at admission.
    pub options: TransferOptions,
    /// Taken exactly once, by the terminal resolve path.
    pub(crate) completion: Option<oneshot::Sender<DfuOutcome>>,
}

/// Read-only view of a session for API responses and lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub device_address: String,
    pub state: SessionState,
    pub slot: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<i32>,
    pub started_at: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            device_address: session.device_address.clone(),
            state: session.state,
            slot: session.slot,
            percent: session.percent,
            started_at: session.started_at,
        }
    }
}
