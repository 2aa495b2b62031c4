//! Mock transfer engine for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::engine::{EngineError, EngineEvent, TransferEngine, TransferRequest};
use crate::router::EventRouter;

/// A recorded `begin` call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedBegin {
    pub address: String,
    pub firmware_path: std::path::PathBuf,
}

/// Mock implementation of the `TransferEngine` trait.
///
/// Provides controllable behavior for testing:
/// - Record `begin`/`abort` calls for assertions
/// - Emit engine events by hand, in any order
/// - Simulate start failures
/// - Toggle the per-session-abort capability
///
/// # Example
///
/// ```rust,ignore
/// let engine = Arc::new(MockTransferEngine::new());
/// let orchestrator = DfuOrchestrator::new(config, engine.clone());
///
/// let completion = orchestrator.start(request).await?;
///
/// // Drive the session from the test
/// engine.emit("AA:BB", EngineEvent::Connecting);
/// engine.emit("AA:BB", EngineEvent::Completed);
/// assert_eq!(completion.await, Ok("AA:BB".to_string()));
/// ```
#[derive(Default)]
pub struct MockTransferEngine {
    /// Recorded begin calls.
    begun: Mutex<Vec<RecordedBegin>>,
    /// Routers handed over at begin, keyed by address.
    routers: Mutex<HashMap<String, Arc<EventRouter>>>,
    /// Addresses abort was called for.
    aborted: Mutex<Vec<String>>,
    /// Number of abort_all calls.
    abort_all_calls: AtomicUsize,
    /// If set, the next begin fails with this message.
    next_begin_error: Mutex<Option<String>>,
    /// Per-session abort capability flag.
    global_abort_only: AtomicBool,
}

impl MockTransferEngine {
    /// Create a mock engine with per-session abort support.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock engine that only exposes a global abort line.
    pub fn with_global_abort_only() -> Self {
        let engine = Self::default();
        engine.global_abort_only.store(true, Ordering::SeqCst);
        engine
    }

    /// Emit an engine event for `address` through the router captured at
    /// `begin`. Panics if no transfer was begun for the address.
    pub fn emit(&self, address: &str, event: EngineEvent) {
        let router = {
            let routers = self.routers.lock().unwrap();
            routers
                .get(address)
                .cloned()
                .unwrap_or_else(|| panic!("no transfer begun for {}", address))
        };
        router.dispatch(address, event);
    }

    /// All recorded begin calls.
    pub fn begun(&self) -> Vec<RecordedBegin> {
        self.begun.lock().unwrap().clone()
    }

    /// Addresses begin was called for, in order.
    pub fn begun_addresses(&self) -> Vec<String> {
        self.begun
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.address.clone())
            .collect()
    }

    /// Addresses abort was called for, in order.
    pub fn aborted_addresses(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }

    /// Number of times abort_all was called.
    pub fn abort_all_count(&self) -> usize {
        self.abort_all_calls.load(Ordering::SeqCst)
    }

    /// Make the next begin call fail.
    pub fn fail_next_begin(&self, message: impl Into<String>) {
        *self.next_begin_error.lock().unwrap() = Some(message.into());
    }
}

#[async_trait]
impl TransferEngine for MockTransferEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_per_session_abort(&self) -> bool {
        !self.global_abort_only.load(Ordering::SeqCst)
    }

    async fn begin(
        &self,
        request: TransferRequest,
        events: Arc<EventRouter>,
    ) -> Result<(), EngineError> {
        if let Some(message) = self.next_begin_error.lock().unwrap().take() {
            return Err(EngineError::StartFailed(message));
        }

        self.begun.lock().unwrap().push(RecordedBegin {
            address: request.address.clone(),
            firmware_path: request.firmware.path().to_path_buf(),
        });
        self.routers
            .lock()
            .unwrap()
            .insert(request.address, events);
        Ok(())
    }

    async fn abort(&self, address: &str) -> Result<(), EngineError> {
        self.aborted.lock().unwrap().push(address.to_string());
        Ok(())
    }

    async fn abort_all(&self) -> Result<(), EngineError> {
        self.abort_all_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBroadcaster;
    use crate::firmware::FirmwarePackage;
    use crate::session::SessionTable;
    use std::io::Write;

    fn firmware_fixture(dir: &tempfile::TempDir) -> FirmwarePackage {
        let path = dir.path().join("fw.zip");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x50, 0x4b, 0x03, 0x04]).unwrap();
        FirmwarePackage::open(&path).unwrap()
    }

    fn router() -> Arc<EventRouter> {
        Arc::new(EventRouter::new(
            Arc::new(SessionTable::new(2)),
            EventBroadcaster::new(16),
        ))
    }

    #[tokio::test]
    async fn test_begin_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockTransferEngine::new();

        engine
            .begin(
                TransferRequest {
                    address: "AA:BB".to_string(),
                    firmware: firmware_fixture(&dir),
                    options: Default::default(),
                },
                router(),
            )
            .await
            .unwrap();

        assert_eq!(engine.begun_addresses(), vec!["AA:BB".to_string()]);
    }

    #[tokio::test]
    async fn test_fail_next_begin() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockTransferEngine::new();
        engine.fail_next_begin("no radio");

        let result = engine
            .begin(
                TransferRequest {
                    address: "AA:BB".to_string(),
                    firmware: firmware_fixture(&dir),
                    options: Default::default(),
                },
                router(),
            )
            .await;

        assert!(matches!(result, Err(EngineError::StartFailed(_))));
        assert!(engine.begun_addresses().is_empty());
    }

    #[tokio::test]
    async fn test_abort_tracking() {
        let engine = MockTransferEngine::new();
        engine.abort("AA:01").await.unwrap();
        engine.abort("AA:02").await.unwrap();
        engine.abort_all().await.unwrap();

        assert_eq!(
            engine.aborted_addresses(),
            vec!["AA:01".to_string(), "AA:02".to_string()]
        );
        assert_eq!(engine.abort_all_count(), 1);
    }

    #[test]
    fn test_capability_flag() {
        assert!(MockTransferEngine::new().supports_per_session_abort());
        assert!(!MockTransferEngine::with_global_abort_only().supports_per_session_abort());
    }
}
