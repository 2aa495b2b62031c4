//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the DFU orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of concurrent DFU sessions. Mirrors the ceiling the
    /// underlying transfer platform imposes on simultaneous executors.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Capacity of the outbound event broadcast channel. Subscribers slower
    /// than this many events start lagging.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_parallel() -> usize {
    8
}

fn default_event_buffer() -> usize {
    256
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_parallel, 8);
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            max_parallel = 2
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_parallel, 2);
        assert_eq!(config.event_buffer, 256);
    }
}
