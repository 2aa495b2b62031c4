//! Transfer engine abstraction.
//!
//! This module provides a `TransferEngine` trait for running firmware
//! transfers against a device, plus a simulated backend for development.
//! Real radio-backed engines plug in behind the same trait.

mod simulated;
mod types;

pub use simulated::{SimulatedEngine, SimulatedEngineConfig};
pub use types::*;
