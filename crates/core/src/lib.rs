//! Multi-session firmware update orchestration.
//!
//! The core admits DFU requests against a bounded pool of execution slots,
//! tracks one session per device address, routes asynchronous engine
//! callbacks back to the owning session, resolves each session's completion
//! exactly once, and republishes every lifecycle on a unified event stream.
//! The transfer protocol itself lives behind the [`engine::TransferEngine`]
//! trait.

pub mod config;
pub mod engine;
pub mod event;
pub mod firmware;
pub mod metrics;
pub mod orchestrator;
pub mod router;
pub mod session;
pub mod slots;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EngineBackend,
    EngineConfig, ServerConfig,
};
pub use engine::{
    EngineError, EngineEvent, SimulatedEngine, SimulatedEngineConfig, TransferEngine,
    TransferOptions, TransferRequest,
};
pub use event::{DfuEvent, ErrorDetail, EventBroadcaster, ProgressUpdate};
pub use firmware::{FirmwareError, FirmwarePackage};
pub use orchestrator::{
    DfuCompletion, DfuError, DfuOrchestrator, DfuOutcome, DfuRequest, OrchestratorConfig,
};
pub use router::EventRouter;
pub use session::{SessionInfo, SessionState, SessionTable};
pub use slots::SlotAllocator;
