//! Event loop configuration
//!
//! Configuration is plain JSON:
//!
//! ```json
//! { "max_tasks_per_tick": 512, "max_iterations": 100000 }
//! ```
//!
//! Missing fields take their defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Default number of queued tasks drained per tick
pub const DEFAULT_MAX_TASKS_PER_TICK: usize = 10_000;

/// Event loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Maximum queued tasks drained before a due timer gets a chance to fire
    pub max_tasks_per_tick: usize,
    /// Upper bound on `run_to_completion` iterations (None = unlimited)
    pub max_iterations: Option<u64>,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_tick: DEFAULT_MAX_TASKS_PER_TICK,
            max_iterations: None,
        }
    }
}

impl EventLoopConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: EventLoopConfig =
            serde_json::from_str(source).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&source)?;
        info!(
            path = %path.display(),
            max_tasks_per_tick = config.max_tasks_per_tick,
            max_iterations = ?config.max_iterations,
            "event loop configuration loaded"
        );
        Ok(config)
    }

    /// Check the configuration for values the event loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_tasks_per_tick == 0 {
            return Err(Error::ConfigError(
                "max_tasks_per_tick must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EventLoopConfig::default();
        assert_eq!(config.max_tasks_per_tick, 10_000);
        assert_eq!(config.max_iterations, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EventLoopConfig::from_json_str(r#"{ "max_iterations": 5 }"#).unwrap();
        assert_eq!(config.max_tasks_per_tick, DEFAULT_MAX_TASKS_PER_TICK);
        assert_eq!(config.max_iterations, Some(5));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let err = EventLoopConfig::from_json_str(r#"{ "max_tasks_per_tick": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = EventLoopConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
