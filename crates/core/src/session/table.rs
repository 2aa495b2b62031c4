//! Keyed registry of in-flight sessions.
//!
//! The table is the single serialization boundary of the core: the session
//! map and the slot pool live behind one mutex, so "address not active" and
//! "slot free" are checked and claimed in the same critical section. Engine
//! callbacks and orchestrator calls race against each other; every critical
//! section here is O(1)-ish and lock-held-briefly.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::types::{Session, SessionInfo, SessionState};
use crate::engine::TransferOptions;
use crate::orchestrator::{DfuError, DfuOutcome};
use crate::slots::SlotAllocator;

struct TableInner {
    sessions: HashMap<String, Session>,
    slots: SlotAllocator,
}

/// Registry of live sessions, at most one per device address.
pub struct SessionTable {
    inner: Mutex<TableInner>,
}

impl SessionTable {
    /// Create a table with `max_parallel` execution slots.
    pub fn new(max_parallel: usize) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                sessions: HashMap::new(),
                slots: SlotAllocator::new(max_parallel),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TableInner> {
        // A poisoned table means a panic inside one of these short critical
        // sections; the state is still consistent enough to keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit a session: claim a slot and register the address in one step.
    ///
    /// Fails with `AlreadyActive` if the address has a live session, or
    /// `ParallelLimitReached` if the pool is exhausted. On success the session
    /// starts in `Idle` and the claimed slot index is returned.
    pub fn register(
        &self,
        address: &str,
        options: TransferOptions,
        completion: oneshot::Sender<DfuOutcome>,
    ) -> Result<usize, DfuError> {
        let mut inner = self.lock();

        if inner.sessions.contains_key(address) {
            return Err(DfuError::AlreadyActive(address.to_string()));
        }

        let slot = inner
            .slots
            .acquire()
            .ok_or(DfuError::ParallelLimitReached)?;

        inner.sessions.insert(
            address.to_string(),
            Session {
                device_address: address.to_string(),
                state: SessionState::Idle,
                slot,
                percent: None,
                started_at: Utc::now(),
                options,
                completion: Some(completion),
            },
        );

        debug!("registered session for {} on slot {}", address, slot);
        Ok(slot)
    }

    /// Move a session to `state`. Returns false (and logs) when no session
    /// exists for the address; stray events are dropped, never fatal.
    pub fn transition(&self, address: &str, state: SessionState) -> bool {
        let mut inner = self.lock();
        match inner.sessions.get_mut(address) {
            Some(session) => {
                session.state = state;
                true
            }
            None => {
                debug!(
                    "dropping state transition to {:?} for unknown address {}",
                    state, address
                );
                false
            }
        }
    }

    /// Record an upload progress update, moving the session to `Uploading`.
    pub fn record_progress(&self, address: &str, percent: i32) -> bool {
        let mut inner = self.lock();
        match inner.sessions.get_mut(address) {
            Some(session) => {
                session.state = SessionState::Uploading;
                session.percent = Some(percent);
                true
            }
            None => {
                debug!("dropping progress for unknown address {}", address);
                false
            }
        }
    }

    /// Resolve the session's completion with `outcome`, release its slot and
    /// remove it from the table. Idempotent: a second call for the same
    /// address is a no-op returning false, so duplicate terminal events from
    /// the engine cannot double-resolve or double-release.
    pub fn resolve_and_remove(&self, address: &str, outcome: DfuOutcome) -> bool {
        let completion = {
            let mut inner = self.lock();
            let Some(mut session) = inner.sessions.remove(address) else {
                debug!("duplicate terminal event for {}, already resolved", address);
                return false;
            };
            inner.slots.release(session.slot);
            session.completion.take()
        };

        // Send outside the lock; the receiver side may run arbitrary code.
        match completion {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    debug!("completion receiver for {} was dropped", address);
                }
            }
            None => warn!("session for {} had no completion sender", address),
        }
        true
    }

    /// Remove a session admitted moments ago whose engine start failed,
    /// without resolving its completion. The caller still holds the admission
    /// error to surface synchronously.
    pub fn discard(&self, address: &str) -> bool {
        let mut inner = self.lock();
        match inner.sessions.remove(address) {
            Some(session) => {
                inner.slots.release(session.slot);
                true
            }
            None => false,
        }
    }

    /// Look up the current view of a session.
    pub fn lookup(&self, address: &str) -> Option<SessionInfo> {
        self.lock().sessions.get(address).map(SessionInfo::from)
    }

    /// Whether a session exists for the address.
    pub fn contains(&self, address: &str) -> bool {
        self.lock().sessions.contains_key(address)
    }

    /// Addresses of all live sessions.
    pub fn active_addresses(&self) -> Vec<String> {
        self.lock().sessions.keys().cloned().collect()
    }

    /// Views of all live sessions, ordered by slot index.
    pub fn list(&self) -> Vec<SessionInfo> {
        let inner = self.lock();
        let mut sessions: Vec<SessionInfo> =
            inner.sessions.values().map(SessionInfo::from).collect();
        sessions.sort_by_key(|s| s.slot);
        sessions
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    /// True when no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    /// Number of free execution slots.
    pub fn available_slots(&self) -> usize {
        self.lock().slots.available()
    }
}
