//! Simulated transfer engine.
//!
//! Walks each session through the full transfer lifecycle on timers instead
//! of talking to real hardware. Used for development, demos and soak-testing
//! the orchestration layer without a radio in reach.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::{EngineError, EngineEvent, TransferEngine, TransferRequest};
use crate::router::EventRouter;

/// Configuration for the simulated engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedEngineConfig {
    /// Delay between lifecycle steps, in milliseconds.
    pub step_delay_ms: u64,
    /// Progress increment per step, percent.
    pub progress_step: i32,
    /// Number of firmware parts the simulated upload walks through.
    pub parts_total: i32,
    /// Reported transfer speed, kB/s.
    pub speed_kbps: f32,
}

impl Default for SimulatedEngineConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 50,
            progress_step: 10,
            parts_total: 1,
            speed_kbps: 12.5,
        }
    }
}

/// Transfer engine that simulates a device-side bootloader.
///
/// Supports per-session abort: each transfer task polls its own cancellation
/// flag between lifecycle steps.
pub struct SimulatedEngine {
    config: SimulatedEngineConfig,
    cancels: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedEngineConfig) -> Self {
        Self {
            config,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl TransferEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    fn supports_per_session_abort(&self) -> bool {
        true
    }

    async fn begin(
        &self,
        request: TransferRequest,
        events: Arc<EventRouter>,
    ) -> Result<(), EngineError> {
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut cancels = self
                .cancels
                .lock()
                .map_err(|_| EngineError::Internal("cancellation map poisoned".into()))?;
            if cancels.contains_key(&request.address) {
                return Err(EngineError::StartFailed(format!(
                    "simulated transfer already running for {}",
                    request.address
                )));
            }
            cancels.insert(request.address.clone(), Arc::clone(&cancel));
        }

        info!(
            "simulated transfer starting for {} ({} bytes)",
            request.address,
            request.firmware.size_bytes()
        );

        let config = self.config.clone();
        let address = request.address.clone();
        let cancels = Arc::clone(&self.cancels);
        tokio::spawn(async move {
            run_transfer(&address, config, cancel, events).await;
            if let Ok(mut cancels) = cancels.lock() {
                cancels.remove(&address);
            }
        });

        Ok(())
    }

    async fn abort(&self, address: &str) -> Result<(), EngineError> {
        let cancels = self
            .cancels
            .lock()
            .map_err(|_| EngineError::Internal("cancellation map poisoned".into()))?;
        match cancels.get(address) {
            Some(cancel) => {
                debug!("abort requested for simulated transfer {}", address);
                cancel.store(true, Ordering::SeqCst);
                Ok(())
            }
            None => Err(EngineError::NotFound(address.to_string())),
        }
    }

    async fn abort_all(&self) -> Result<(), EngineError> {
        let cancels = self
            .cancels
            .lock()
            .map_err(|_| EngineError::Internal("cancellation map poisoned".into()))?;
        for cancel in cancels.values() {
            cancel.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Drive one simulated transfer to its terminal event.
async fn run_transfer(
    address: &str,
    config: SimulatedEngineConfig,
    cancel: Arc<AtomicBool>,
    events: Arc<EventRouter>,
) {
    let delay = Duration::from_millis(config.step_delay_ms);
    let aborted = |events: &Arc<EventRouter>| {
        events.dispatch(address, EngineEvent::Disconnecting);
        events.dispatch(address, EngineEvent::Disconnected);
        events.dispatch(address, EngineEvent::Aborted);
    };

    let preamble = [
        EngineEvent::Connecting,
        EngineEvent::Connected,
        EngineEvent::ProcessStarting,
        EngineEvent::ProcessStarted,
        EngineEvent::EnablingDfuMode,
        EngineEvent::Validating,
    ];

    for event in preamble {
        if cancel.load(Ordering::SeqCst) {
            aborted(&events);
            return;
        }
        events.dispatch(address, event);
        tokio::time::sleep(delay).await;
    }

    let step = config.progress_step.max(1);
    for part in 1..=config.parts_total.max(1) {
        let mut percent = 0;
        while percent <= 100 {
            if cancel.load(Ordering::SeqCst) {
                aborted(&events);
                return;
            }
            events.dispatch(
                address,
                EngineEvent::Progress {
                    percent,
                    speed: config.speed_kbps,
                    avg_speed: config.speed_kbps,
                    current_part: part,
                    parts_total: config.parts_total.max(1),
                },
            );
            percent += step;
            tokio::time::sleep(delay).await;
        }
    }

    events.dispatch(address, EngineEvent::Disconnecting);
    events.dispatch(address, EngineEvent::Disconnected);
    events.dispatch(address, EngineEvent::Completed);
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        // Cancel any transfers still in flight so spawned tasks wind down.
        if let Ok(cancels) = self.cancels.lock() {
            for cancel in cancels.values() {
                cancel.store(true, Ordering::SeqCst);
            }
        }
    }
}
