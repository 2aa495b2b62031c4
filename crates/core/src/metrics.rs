//! Prometheus metrics for the orchestration core.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

/// Sessions admitted and handed to the engine.
pub static SESSIONS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("dfufleet_sessions_started_total", "Total DFU sessions started").unwrap()
});

/// Sessions that reached the completed terminal state.
pub static SESSIONS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dfufleet_sessions_completed_total",
        "Total DFU sessions completed successfully",
    )
    .unwrap()
});

/// Sessions that reached the aborted terminal state.
pub static SESSIONS_ABORTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dfufleet_sessions_aborted_total",
        "Total DFU sessions aborted",
    )
    .unwrap()
});

/// Sessions that reached the failed terminal state.
pub static SESSIONS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dfufleet_sessions_failed_total",
        "Total DFU sessions failed with an engine error",
    )
    .unwrap()
});

/// Admission rejections by reason.
pub static ADMISSIONS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dfufleet_admissions_rejected_total",
            "DFU start requests rejected at admission",
        ),
        &["reason"], // "already_active", "parallel_limit", "firmware_invalid", "engine_start"
    )
    .unwrap()
});

/// Currently live sessions.
pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dfufleet_active_sessions",
        "Number of currently live DFU sessions",
    )
    .unwrap()
});

/// Engine events routed, by kind.
pub static ENGINE_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dfufleet_engine_events_total",
            "Engine events routed through the event router",
        ),
        &["kind"],
    )
    .unwrap()
});

/// All core metrics, for registration into an external registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SESSIONS_STARTED.clone()),
        Box::new(SESSIONS_COMPLETED.clone()),
        Box::new(SESSIONS_ABORTED.clone()),
        Box::new(SESSIONS_FAILED.clone()),
        Box::new(ADMISSIONS_REJECTED.clone()),
        Box::new(ACTIVE_SESSIONS.clone()),
        Box::new(ENGINE_EVENTS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
    }

    #[test]
    fn test_counters_increment() {
        let before = SESSIONS_STARTED.get();
        SESSIONS_STARTED.inc();
        assert_eq!(SESSIONS_STARTED.get(), before + 1);
    }
}
