//! DFU orchestrator: the façade over slots, sessions, engine and router.
//!
//! `start` and `abort` are non-blocking admission/ack calls. The transfer
//! outcome never comes back through them: it arrives later, exactly once,
//! through the completion handle `start` returns, and is mirrored on the
//! event stream.

mod config;
mod types;

pub use config::OrchestratorConfig;
pub use types::{DfuCompletion, DfuError, DfuOutcome, DfuRequest};

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};

use crate::engine::{TransferEngine, TransferRequest};
use crate::event::{DfuEvent, EventBroadcaster};
use crate::firmware::FirmwarePackage;
use crate::metrics;
use crate::router::EventRouter;
use crate::session::{SessionInfo, SessionTable};

/// Multi-session DFU orchestrator.
///
/// Admits update requests against a bounded slot pool, tracks one session
/// per device address, and hands engine callbacks to the router. Safe to
/// share across tasks behind an `Arc`.
pub struct DfuOrchestrator {
    engine: Arc<dyn TransferEngine>,
    table: Arc<SessionTable>,
    router: Arc<EventRouter>,
    broadcaster: EventBroadcaster,
}

impl DfuOrchestrator {
    /// Create an orchestrator driving the given engine.
    pub fn new(config: OrchestratorConfig, engine: Arc<dyn TransferEngine>) -> Self {
        let table = Arc::new(SessionTable::new(config.max_parallel));
        let broadcaster = EventBroadcaster::new(config.event_buffer);
        let router = Arc::new(EventRouter::new(
            Arc::clone(&table),
            broadcaster.clone(),
        ));

        info!(
            "DFU orchestrator ready: engine={}, max_parallel={}",
            engine.name(),
            config.max_parallel
        );

        Self {
            engine,
            table,
            router,
            broadcaster,
        }
    }

    /// Subscribe to the unified event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DfuEvent> {
        self.broadcaster.subscribe()
    }

    /// The broadcaster backing the event stream.
    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Start a firmware update for one device.
    ///
    /// Synchronously validates the request, opens the firmware package,
    /// claims a slot and registers the session, then hands off to the
    /// engine. Returns as soon as the transfer is underway; the outcome
    /// arrives through the returned completion handle.
    pub async fn start(&self, request: DfuRequest) -> Result<DfuCompletion, DfuError> {
        request.validate()?;

        let firmware = FirmwarePackage::open(&request.file_path).map_err(|e| {
            metrics::ADMISSIONS_REJECTED
                .with_label_values(&["firmware_invalid"])
                .inc();
            DfuError::FirmwareInvalid(e.to_string())
        })?;

        let address = request.address.clone();
        let (tx, rx) = oneshot::channel();

        // Already-active check and slot claim happen atomically in the table.
        let slot = self
            .table
            .register(&address, request.options.clone(), tx)
            .map_err(|e| {
                let reason = match &e {
                    DfuError::AlreadyActive(_) => "already_active",
                    DfuError::ParallelLimitReached => "parallel_limit",
                    _ => "other",
                };
                metrics::ADMISSIONS_REJECTED.with_label_values(&[reason]).inc();
                e
            })?;

        let transfer = TransferRequest {
            address: address.clone(),
            firmware,
            options: request.options,
        };

        if let Err(e) = self
            .engine
            .begin(transfer, Arc::clone(&self.router))
            .await
        {
            // Unwind the admission; the caller gets the failure synchronously
            // and the completion channel is never resolved.
            self.table.discard(&address);
            metrics::ADMISSIONS_REJECTED
                .with_label_values(&["engine_start"])
                .inc();
            warn!("engine failed to start transfer for {}: {}", address, e);
            return Err(DfuError::Engine {
                error: 0,
                error_type: 0,
                message: e.to_string(),
            });
        }

        metrics::SESSIONS_STARTED.inc();
        metrics::ACTIVE_SESSIONS.set(self.table.len() as i64);
        info!("DFU started for {} on slot {}", address, slot);

        Ok(DfuCompletion::new(rx))
    }

    /// Request abort of one session, or of every live session when `address`
    /// is `None`. Returns the addresses an abort was signalled for.
    ///
    /// The ack is immediate; each session stays live until the engine emits
    /// its terminal `aborted` (or `error`) event, which resolves the
    /// completion through the normal router path.
    pub async fn abort(&self, address: Option<&str>) -> Result<Vec<String>, DfuError> {
        match address {
            None => {
                let addresses = self.table.active_addresses();
                if addresses.is_empty() {
                    return Err(DfuError::NoActiveSessions);
                }

                if self.engine.supports_per_session_abort() {
                    for addr in &addresses {
                        if let Err(e) = self.engine.abort(addr).await {
                            warn!("engine abort for {} failed: {}", addr, e);
                        }
                    }
                } else if let Err(e) = self.engine.abort_all().await {
                    warn!("engine abort-all failed: {}", e);
                }

                info!("abort requested for all {} sessions", addresses.len());
                Ok(addresses)
            }
            Some(addr) => {
                if !self.table.contains(addr) {
                    return Err(DfuError::UnknownAddress(addr.to_string()));
                }

                if self.engine.supports_per_session_abort() {
                    if let Err(e) = self.engine.abort(addr).await {
                        warn!("engine abort for {} failed: {}", addr, e);
                    }
                } else {
                    // The engine only has a global abort line. The requested
                    // session is the one whose completion the caller awaits,
                    // but every co-running session gets aborted with it.
                    let collateral: Vec<String> = self
                        .table
                        .active_addresses()
                        .into_iter()
                        .filter(|a| a != addr)
                        .collect();
                    if !collateral.is_empty() {
                        warn!(
                            "engine {} only supports global abort; aborting {} will also abort {:?}",
                            self.engine.name(),
                            addr,
                            collateral
                        );
                    }
                    if let Err(e) = self.engine.abort_all().await {
                        warn!("engine abort-all failed: {}", e);
                    }
                }

                info!("abort requested for {}", addr);
                Ok(vec![addr.to_string()])
            }
        }
    }

    /// Current view of one session.
    pub fn lookup(&self, address: &str) -> Option<SessionInfo> {
        self.table.lookup(address)
    }

    /// Views of all live sessions.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.table.list()
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.table.len()
    }
}
