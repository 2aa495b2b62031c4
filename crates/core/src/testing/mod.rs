//! Test doubles for the orchestration core.
//!
//! Available outside `cfg(test)` so integration tests and downstream crates
//! can drive the core without real hardware.

mod mock_engine;

pub use mock_engine::{MockTransferEngine, RecordedBegin};
