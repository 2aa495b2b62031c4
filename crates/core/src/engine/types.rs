//! Types for transfer engine backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::firmware::FirmwarePackage;
use crate::router::EventRouter;

/// Errors that can occur during transfer engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start transfer: {0}")]
    StartFailed(String),

    #[error("no transfer in progress for {0}")]
    NotFound(String),

    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Lifecycle callback emitted by a transfer engine for one session.
///
/// Events for the same device address arrive in emission order; no ordering
/// holds across addresses. `Completed`, `Aborted` and `Error` are terminal:
/// the engine emits exactly one of them per `begin` invocation, and nothing
/// after it.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Connecting,
    Connected,
    ProcessStarting,
    ProcessStarted,
    EnablingDfuMode,
    Validating,
    Progress {
        percent: i32,
        speed: f32,
        avg_speed: f32,
        current_part: i32,
        parts_total: i32,
    },
    Disconnecting,
    Disconnected,
    Completed,
    Aborted,
    Error {
        error: i32,
        error_type: i32,
        message: String,
    },
}

impl EngineEvent {
    /// Whether this event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineEvent::Completed | EngineEvent::Aborted | EngineEvent::Error { .. }
        )
    }

    /// Short name for logging and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Connecting => "connecting",
            EngineEvent::Connected => "connected",
            EngineEvent::ProcessStarting => "process_starting",
            EngineEvent::ProcessStarted => "process_started",
            EngineEvent::EnablingDfuMode => "enabling_dfu_mode",
            EngineEvent::Validating => "validating",
            EngineEvent::Progress { .. } => "progress",
            EngineEvent::Disconnecting => "disconnecting",
            EngineEvent::Disconnected => "disconnected",
            EngineEvent::Completed => "completed",
            EngineEvent::Aborted => "aborted",
            EngineEvent::Error { .. } => "error",
        }
    }
}

/// Tuning options passed through to the transfer engine unchanged.
///
/// The core validates nothing here beyond shape; which fields a given backend
/// honors is backend-defined. Field names follow the engine wire convention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferOptions {
    /// Device display name used during the transfer.
    pub name: Option<String>,
    /// Force DFU mode even if the device advertises an application.
    pub force_dfu: Option<bool>,
    pub enable_unsafe_experimental_buttonless_service_in_secure_dfu: Option<bool>,
    pub disable_notification: Option<bool>,
    pub start_as_foreground_service: Option<bool>,
    pub keep_bond: Option<bool>,
    pub restore_bond: Option<bool>,
    pub packet_receipt_notifications_enabled: Option<bool>,
    /// Packet receipt notification value, in packets.
    pub number_of_packets: Option<u32>,
    /// Delay before sending each data object, in milliseconds.
    pub data_delay: Option<u32>,
    pub number_of_retries: Option<u32>,
    /// Time to wait for the device to reboot into bootloader mode, ms.
    pub reboot_time: Option<u64>,
    /// MBR size hint for the target memory layout, bytes.
    pub mbr_size: Option<u32>,
    /// Firmware scope selector (system components / application / all).
    pub scope: Option<u32>,
    /// MTU the connection is currently using.
    pub current_mtu: Option<u32>,
}

/// Everything a backend needs to run one transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Target device address; tags every event the engine emits back.
    pub address: String,
    /// Firmware package to upload.
    pub firmware: FirmwarePackage,
    /// Pass-through tuning options.
    pub options: TransferOptions,
}

/// Trait for firmware transfer engine backends.
///
/// A backend performs the actual transfer protocol for one session at a time
/// per address and reports lifecycle through the router it was handed at
/// `begin`. The orchestration core never looks inside the transfer itself.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Whether `abort` can target a single session. Backends built on a
    /// global abort line return false; `abort_all` is used instead and
    /// co-running sessions are aborted as a side effect.
    fn supports_per_session_abort(&self) -> bool;

    /// Start a transfer. Returns once the transfer is underway; progress and
    /// the terminal outcome arrive through `events`.
    async fn begin(
        &self,
        request: TransferRequest,
        events: Arc<EventRouter>,
    ) -> Result<(), EngineError>;

    /// Request cooperative abort of the transfer for `address`. The session
    /// terminates later, via an `Aborted` or `Error` event.
    async fn abort(&self, address: &str) -> Result<(), EngineError>;

    /// Request cooperative abort of every in-flight transfer.
    async fn abort_all(&self) -> Result<(), EngineError>;
}
