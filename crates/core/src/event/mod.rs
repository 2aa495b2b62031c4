//! Outbound DFU event stream.
//!
//! Every session's lifecycle is republished on a process-wide broadcast
//! stream as `DfuEvent` values. The wire shape is one externally-tagged map
//! per event: scalar device address for plain lifecycle events, a structured
//! payload for progress and errors.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Progress payload for `onProgressChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub device_address: String,
    pub percent: i32,
    pub speed: f32,
    pub avg_speed: f32,
    pub current_part: i32,
    pub parts_total: i32,
}

/// Error payload for `onError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub device_address: String,
    pub error: i32,
    pub error_type: i32,
    pub message: String,
}

/// Event published on the process-wide stream.
///
/// Serializes to `{"onDeviceConnecting": "AA:BB:..."}` style maps, matching
/// the callback names transfer engines conventionally expose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DfuEvent {
    #[serde(rename = "onDeviceConnecting")]
    DeviceConnecting(String),
    #[serde(rename = "onDeviceConnected")]
    DeviceConnected(String),
    #[serde(rename = "onDfuProcessStarting")]
    DfuProcessStarting(String),
    #[serde(rename = "onDfuProcessStarted")]
    DfuProcessStarted(String),
    #[serde(rename = "onEnablingDfuMode")]
    EnablingDfuMode(String),
    #[serde(rename = "onFirmwareValidating")]
    FirmwareValidating(String),
    #[serde(rename = "onProgressChanged")]
    ProgressChanged(ProgressUpdate),
    #[serde(rename = "onDeviceDisconnecting")]
    DeviceDisconnecting(String),
    #[serde(rename = "onDeviceDisconnected")]
    DeviceDisconnected(String),
    #[serde(rename = "onDfuCompleted")]
    DfuCompleted(String),
    #[serde(rename = "onDfuAborted")]
    DfuAborted(String),
    #[serde(rename = "onError")]
    Error(ErrorDetail),
}

impl DfuEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            DfuEvent::DeviceConnecting(_) => "onDeviceConnecting",
            DfuEvent::DeviceConnected(_) => "onDeviceConnected",
            DfuEvent::DfuProcessStarting(_) => "onDfuProcessStarting",
            DfuEvent::DfuProcessStarted(_) => "onDfuProcessStarted",
            DfuEvent::EnablingDfuMode(_) => "onEnablingDfuMode",
            DfuEvent::FirmwareValidating(_) => "onFirmwareValidating",
            DfuEvent::ProgressChanged(_) => "onProgressChanged",
            DfuEvent::DeviceDisconnecting(_) => "onDeviceDisconnecting",
            DfuEvent::DeviceDisconnected(_) => "onDeviceDisconnected",
            DfuEvent::DfuCompleted(_) => "onDfuCompleted",
            DfuEvent::DfuAborted(_) => "onDfuAborted",
            DfuEvent::Error(_) => "onError",
        }
    }

    /// Device address the event concerns.
    pub fn device_address(&self) -> &str {
        match self {
            DfuEvent::DeviceConnecting(addr)
            | DfuEvent::DeviceConnected(addr)
            | DfuEvent::DfuProcessStarting(addr)
            | DfuEvent::DfuProcessStarted(addr)
            | DfuEvent::EnablingDfuMode(addr)
            | DfuEvent::FirmwareValidating(addr)
            | DfuEvent::DeviceDisconnecting(addr)
            | DfuEvent::DeviceDisconnected(addr)
            | DfuEvent::DfuCompleted(addr)
            | DfuEvent::DfuAborted(addr) => addr,
            DfuEvent::ProgressChanged(p) => &p.device_address,
            DfuEvent::Error(e) => &e.device_address,
        }
    }
}

/// Broadcaster for DFU events using a tokio broadcast channel.
///
/// Cheaply cloneable; tolerates concurrent writers across sessions. Slow
/// subscribers lag rather than blocking the router.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<DfuEvent>,
}

impl EventBroadcaster {
    /// Create a broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn broadcast(&self, event: DfuEvent) {
        // Send errors just mean no one is listening.
        let _ = self.sender.send(event);
    }

    /// Subscribe to the stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DfuEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
