//! HTTP/WebSocket surface for the DFU orchestration core.

pub mod api;
pub mod metrics;
pub mod state;
