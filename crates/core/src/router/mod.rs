//! Event router: the single point where engine callbacks re-enter the core.
//!
//! Engine backends deliver events from their own tasks, interleaved across
//! devices. `dispatch` tags each event with its device address, applies the
//! session-state transition, republishes it on the broadcast stream, and for
//! terminal events resolves the session's completion exactly once before
//! returning. Events for addresses with no live session are forwarded to the
//! stream (observers may still care about the device) but skip the
//! completion path, which has already run.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::EngineEvent;
use crate::event::{DfuEvent, ErrorDetail, EventBroadcaster, ProgressUpdate};
use crate::metrics;
use crate::orchestrator::DfuError;
use crate::session::{SessionState, SessionTable};

/// Translates tagged engine events into session transitions and stream
/// events. One instance serves all sessions.
pub struct EventRouter {
    table: Arc<SessionTable>,
    broadcaster: EventBroadcaster,
}

impl EventRouter {
    pub fn new(table: Arc<SessionTable>, broadcaster: EventBroadcaster) -> Self {
        Self { table, broadcaster }
    }

    /// Apply one engine event for `address`.
    ///
    /// Same-address calls must not be reordered by the caller; the engine
    /// contract is in-order delivery per session. Calls for different
    /// addresses may race freely.
    pub fn dispatch(&self, address: &str, event: EngineEvent) {
        metrics::ENGINE_EVENTS.with_label_values(&[event.kind()]).inc();

        let addr = address.to_string();
        match event {
            EngineEvent::Connecting => {
                self.table.transition(address, SessionState::Connecting);
                self.broadcaster.broadcast(DfuEvent::DeviceConnecting(addr));
            }
            EngineEvent::Connected => {
                self.broadcaster.broadcast(DfuEvent::DeviceConnected(addr));
            }
            EngineEvent::ProcessStarting => {
                self.table.transition(address, SessionState::Starting);
                self.broadcaster
                    .broadcast(DfuEvent::DfuProcessStarting(addr));
            }
            EngineEvent::ProcessStarted => {
                self.broadcaster.broadcast(DfuEvent::DfuProcessStarted(addr));
            }
            EngineEvent::EnablingDfuMode => {
                self.table
                    .transition(address, SessionState::EnablingDfuMode);
                self.broadcaster.broadcast(DfuEvent::EnablingDfuMode(addr));
            }
            EngineEvent::Validating => {
                self.table.transition(address, SessionState::Validating);
                self.broadcaster
                    .broadcast(DfuEvent::FirmwareValidating(addr));
            }
            EngineEvent::Progress {
                percent,
                speed,
                avg_speed,
                current_part,
                parts_total,
            } => {
                // Percent monotonicity is the engine's contract; decreasing
                // values are forwarded as-is, not rejected.
                self.table.record_progress(address, percent);
                self.broadcaster
                    .broadcast(DfuEvent::ProgressChanged(ProgressUpdate {
                        device_address: addr,
                        percent,
                        speed,
                        avg_speed,
                        current_part,
                        parts_total,
                    }));
            }
            EngineEvent::Disconnecting => {
                self.table.transition(address, SessionState::Disconnecting);
                self.broadcaster
                    .broadcast(DfuEvent::DeviceDisconnecting(addr));
            }
            EngineEvent::Disconnected => {
                self.broadcaster
                    .broadcast(DfuEvent::DeviceDisconnected(addr));
            }
            EngineEvent::Completed => {
                self.broadcaster
                    .broadcast(DfuEvent::DfuCompleted(addr.clone()));
                if self.table.resolve_and_remove(address, Ok(addr)) {
                    info!("DFU completed for {}", address);
                    metrics::SESSIONS_COMPLETED.inc();
                }
                metrics::ACTIVE_SESSIONS.set(self.table.len() as i64);
            }
            EngineEvent::Aborted => {
                self.broadcaster.broadcast(DfuEvent::DfuAborted(addr));
                if self.table.resolve_and_remove(address, Err(DfuError::Aborted)) {
                    info!("DFU aborted for {}", address);
                    metrics::SESSIONS_ABORTED.inc();
                }
                metrics::ACTIVE_SESSIONS.set(self.table.len() as i64);
            }
            EngineEvent::Error {
                error,
                error_type,
                message,
            } => {
                warn!(
                    "DFU failed for {} ({}/{}): {}",
                    address, error, error_type, message
                );
                self.broadcaster.broadcast(DfuEvent::Error(ErrorDetail {
                    device_address: addr,
                    error,
                    error_type,
                    message: message.clone(),
                }));
                let outcome = Err(DfuError::Engine {
                    error,
                    error_type,
                    message,
                });
                if self.table.resolve_and_remove(address, outcome) {
                    metrics::SESSIONS_FAILED.inc();
                } else {
                    debug!("error event for {} after session already resolved", address);
                }
                metrics::ACTIVE_SESSIONS.set(self.table.len() as i64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TransferOptions;
    use crate::orchestrator::DfuOutcome;
    use tokio::sync::oneshot;

    fn setup() -> (Arc<SessionTable>, Arc<EventRouter>, EventBroadcaster) {
        let table = Arc::new(SessionTable::new(4));
        let broadcaster = EventBroadcaster::new(64);
        let router = Arc::new(EventRouter::new(
            Arc::clone(&table),
            broadcaster.clone(),
        ));
        (table, router, broadcaster)
    }

    fn register(table: &SessionTable, address: &str) -> oneshot::Receiver<DfuOutcome> {
        let (tx, rx) = oneshot::channel();
        table
            .register(address, TransferOptions::default(), tx)
            .unwrap();
        rx
    }

    #[tokio::test]
    async fn test_non_terminal_events_update_state_and_forward() {
        let (table, router, broadcaster) = setup();
        let mut events = broadcaster.subscribe();
        let _rx = register(&table, "AA:BB");

        router.dispatch("AA:BB", EngineEvent::Connecting);
        assert_eq!(
            table.lookup("AA:BB").unwrap().state,
            SessionState::Connecting
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DfuEvent::DeviceConnecting("AA:BB".to_string())
        );

        router.dispatch("AA:BB", EngineEvent::Validating);
        assert_eq!(
            table.lookup("AA:BB").unwrap().state,
            SessionState::Validating
        );
    }

    #[tokio::test]
    async fn test_connected_forwards_without_state_change() {
        let (table, router, broadcaster) = setup();
        let mut events = broadcaster.subscribe();
        let _rx = register(&table, "AA:BB");
        router.dispatch("AA:BB", EngineEvent::Connecting);

        router.dispatch("AA:BB", EngineEvent::Connected);
        assert_eq!(
            table.lookup("AA:BB").unwrap().state,
            SessionState::Connecting
        );

        events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            DfuEvent::DeviceConnected("AA:BB".to_string())
        );
    }

    #[tokio::test]
    async fn test_completed_resolves_and_removes() {
        let (table, router, _broadcaster) = setup();
        let rx = register(&table, "AA:BB");

        router.dispatch("AA:BB", EngineEvent::Completed);

        assert_eq!(rx.await.unwrap(), Ok("AA:BB".to_string()));
        assert!(table.lookup("AA:BB").is_none());
        assert_eq!(table.available_slots(), 4);
    }

    #[tokio::test]
    async fn test_error_resolves_with_engine_error() {
        let (table, router, broadcaster) = setup();
        let mut events = broadcaster.subscribe();
        let rx = register(&table, "AA:BB");

        router.dispatch(
            "AA:BB",
            EngineEvent::Error {
                error: 4,
                error_type: 1,
                message: "timeout".to_string(),
            },
        );

        assert_eq!(
            rx.await.unwrap(),
            Err(DfuError::Engine {
                error: 4,
                error_type: 1,
                message: "timeout".to_string()
            })
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DfuEvent::Error(ErrorDetail {
                device_address: "AA:BB".to_string(),
                error: 4,
                error_type: 1,
                message: "timeout".to_string()
            })
        );
        assert!(table.lookup("AA:BB").is_none());
    }

    #[tokio::test]
    async fn test_aborted_resolves_with_abort_error() {
        let (table, router, _broadcaster) = setup();
        let rx = register(&table, "AA:BB");

        router.dispatch("AA:BB", EngineEvent::Aborted);

        assert_eq!(rx.await.unwrap(), Err(DfuError::Aborted));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_address_forwards_to_stream_only() {
        let (table, router, broadcaster) = setup();
        let mut events = broadcaster.subscribe();

        router.dispatch("00:00", EngineEvent::Completed);

        assert_eq!(
            events.recv().await.unwrap(),
            DfuEvent::DfuCompleted("00:00".to_string())
        );
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_terminal_event_is_safe() {
        let (table, router, _broadcaster) = setup();
        let rx = register(&table, "AA:BB");

        router.dispatch("AA:BB", EngineEvent::Completed);
        router.dispatch("AA:BB", EngineEvent::Completed);
        router.dispatch("AA:BB", EngineEvent::Aborted);

        // First terminal wins; later ones are no-ops.
        assert_eq!(rx.await.unwrap(), Ok("AA:BB".to_string()));
        assert_eq!(table.available_slots(), 4);
    }

    #[tokio::test]
    async fn test_progress_updates_percent() {
        let (table, router, broadcaster) = setup();
        let mut events = broadcaster.subscribe();
        let _rx = register(&table, "AA:BB");

        router.dispatch(
            "AA:BB",
            EngineEvent::Progress {
                percent: 73,
                speed: 11.0,
                avg_speed: 10.0,
                current_part: 1,
                parts_total: 1,
            },
        );

        let info = table.lookup("AA:BB").unwrap();
        assert_eq!(info.state, SessionState::Uploading);
        assert_eq!(info.percent, Some(73));

        match events.recv().await.unwrap() {
            DfuEvent::ProgressChanged(update) => {
                assert_eq!(update.percent, 73);
                assert_eq!(update.device_address, "AA:BB");
            }
            other => panic!("expected progress event, got {:?}", other),
        }
    }
}
