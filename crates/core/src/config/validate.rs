use super::{Config, ConfigError};

/// Validate a loaded configuration before wiring components from it.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.orchestrator.max_parallel == 0 {
        return Err(ConfigError::Invalid(
            "orchestrator.max_parallel must be at least 1".to_string(),
        ));
    }

    if config.orchestrator.event_buffer == 0 {
        return Err(ConfigError::Invalid(
            "orchestrator.event_buffer must be at least 1".to_string(),
        ));
    }

    if config.engine.simulated.progress_step <= 0 {
        return Err(ConfigError::Invalid(
            "engine.simulated.progress_step must be positive".to_string(),
        ));
    }

    Ok(())
}
