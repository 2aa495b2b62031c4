//! Types for the DFU orchestrator.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::engine::TransferOptions;

/// Errors produced by the orchestration core.
///
/// The first five variants are synchronous admission/abort rejections and are
/// returned directly from `start`/`abort`. `Aborted` and `Engine` are
/// asynchronous terminal outcomes, delivered exactly once through the
/// session's completion handle and never raised from the synchronous calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DfuError {
    /// Required request field missing or malformed.
    #[error("abnormal parameter: {0}")]
    AbnormalParameter(String),

    /// The execution slot pool is exhausted.
    #[error("no available DFU execution slots")]
    ParallelLimitReached,

    /// A session already exists for the requested address.
    #[error("DFU already in progress for {0}")]
    AlreadyActive(String),

    /// Firmware package could not be opened.
    #[error("firmware invalid: {0}")]
    FirmwareInvalid(String),

    /// Abort requested with no live sessions.
    #[error("no active DFU sessions to abort")]
    NoActiveSessions,

    /// Abort requested for an address with no live session.
    #[error("no DFU session found for address {0}")]
    UnknownAddress(String),

    /// The session was aborted before completing.
    #[error("DFU aborted")]
    Aborted,

    /// The engine reported a transfer failure. Code and type are opaque
    /// engine-defined values, preserved verbatim.
    #[error("DFU failed ({error}/{error_type}): {message}")]
    Engine {
        error: i32,
        error_type: i32,
        message: String,
    },
}

impl DfuError {
    /// Stable machine-readable code for API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            DfuError::AbnormalParameter(_) => "ABNORMAL_PARAMETER",
            DfuError::ParallelLimitReached => "PARALLEL_LIMIT_REACHED",
            DfuError::AlreadyActive(_) => "ALREADY_ACTIVE",
            DfuError::FirmwareInvalid(_) => "FIRMWARE_INVALID",
            DfuError::NoActiveSessions => "NO_ACTIVE_DFU",
            DfuError::UnknownAddress(_) => "INVALID_ADDRESS",
            DfuError::Aborted => "DFU_ABORTED",
            DfuError::Engine { .. } => "DFU_FAILED",
        }
    }
}

/// Terminal outcome of one session: the device address on success, a
/// structured error on failure or abort.
pub type DfuOutcome = Result<String, DfuError>;

/// Request to start a firmware update for one device.
///
/// `address` and `file_path` are required; everything else passes through to
/// the engine untouched. Wire field names follow the engine convention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DfuRequest {
    /// Target device address. Unique key for the session.
    #[serde(default)]
    pub address: String,
    /// Resolved, readable path to the firmware package. Asset staging is the
    /// caller's job; by the time a request lands here the path must be real.
    #[serde(default)]
    pub file_path: PathBuf,
    /// Engine tuning options, passed through unchanged.
    #[serde(flatten)]
    pub options: TransferOptions,
}

impl DfuRequest {
    /// Build a request with required fields only.
    pub fn new(address: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            address: address.into(),
            file_path: file_path.into(),
            options: TransferOptions::default(),
        }
    }

    /// Check required fields. Runs before any slot or table state is touched.
    pub fn validate(&self) -> Result<(), DfuError> {
        if self.address.trim().is_empty() {
            return Err(DfuError::AbnormalParameter(
                "address is required".to_string(),
            ));
        }
        if self.file_path.as_os_str().is_empty() {
            return Err(DfuError::AbnormalParameter(
                "filePath is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Single-resolution completion handle returned by `start`.
///
/// Resolves exactly once with the terminal outcome of the session. Dropping
/// the handle does not cancel the transfer; the session runs to its terminal
/// event regardless.
#[derive(Debug)]
pub struct DfuCompletion {
    rx: oneshot::Receiver<DfuOutcome>,
}

impl DfuCompletion {
    pub(crate) fn new(rx: oneshot::Receiver<DfuOutcome>) -> Self {
        Self { rx }
    }
}

impl Future for DfuCompletion {
    type Output = DfuOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A closed channel means the core was torn down with the session
        // still live; surface that as an abort.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(DfuError::Aborted)))
    }
}
