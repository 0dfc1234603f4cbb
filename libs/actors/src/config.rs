//! Actor System Configuration
//!
//! TOML configuration for the scheduler and the default supervisor:
//!
//! ```toml
//! scheduler_interval_ms = 5
//!
//! [supervisor]
//! strategy = "retry"
//! max_retries = 3
//! ```
//!
//! Files loaded with [`SystemConfig::load`] can be overridden by environment
//! variables prefixed with `REWIND_`, using `__` for nesting
//! (`REWIND_SUPERVISOR__MAX_RETRIES=5`).

use crate::supervisor::{BoundedRetry, DropSupervisor, Supervisor};
use crate::{ActorError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Longest accepted scheduler interval
pub const MAX_SCHEDULER_INTERVAL_MS: u64 = 60_000;

const ENV_PREFIX: &str = "REWIND";

/// Actor system settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Milliseconds between scheduler ticks; 0 ticks continuously
    pub scheduler_interval_ms: u64,

    /// Supervisor installed when none is given explicitly
    pub supervisor: SupervisorPolicy,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            scheduler_interval_ms: 0,
            supervisor: SupervisorPolicy::Drop,
        }
    }
}

/// Declarative supervisor choice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SupervisorPolicy {
    #[default]
    Drop,
    Retry { max_retries: u32 },
}

impl SupervisorPolicy {
    pub fn build(&self) -> Arc<dyn Supervisor> {
        match self {
            Self::Drop => Arc::new(DropSupervisor),
            Self::Retry { max_retries } => Arc::new(BoundedRetry::new(*max_retries)),
        }
    }
}

impl SystemConfig {
    /// Load from a TOML file, then apply `REWIND_` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading actor system configuration");

        let config: Self = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ActorError::configuration(&e.to_string(), None))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text without environment overrides
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ActorError::configuration(&e.to_string(), None))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler_interval_ms > MAX_SCHEDULER_INTERVAL_MS {
            return Err(ActorError::configuration(
                &format!(
                    "scheduler_interval_ms must be <= {}",
                    MAX_SCHEDULER_INTERVAL_MS
                ),
                Some("scheduler_interval_ms"),
            ));
        }

        if let SupervisorPolicy::Retry { max_retries: 0 } = self.supervisor {
            return Err(ActorError::configuration(
                "max_retries must be > 0",
                Some("supervisor.max_retries"),
            ));
        }

        Ok(())
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SystemConfig::from_toml_str("").unwrap();
        assert_eq!(config, SystemConfig::default());
        assert_eq!(config.scheduler_interval(), Duration::ZERO);
    }

    #[test]
    fn test_retry_policy() {
        let config = SystemConfig::from_toml_str(
            r#"
            scheduler_interval_ms = 5

            [supervisor]
            strategy = "retry"
            max_retries = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler_interval(), Duration::from_millis(5));
        assert_eq!(config.supervisor, SupervisorPolicy::Retry { max_retries: 3 });
    }

    #[test]
    fn test_validation() {
        let err = SystemConfig::from_toml_str("scheduler_interval_ms = 60001").unwrap_err();
        assert!(matches!(
            err,
            ActorError::Config { field: Some(ref f), .. } if f == "scheduler_interval_ms"
        ));

        let err = SystemConfig::from_toml_str("[supervisor]\nstrategy = \"retry\"\nmax_retries = 0")
            .unwrap_err();
        assert_eq!(err.category(), "config");

        assert!(SystemConfig::from_toml_str("[supervisor]\nstrategy = \"restart\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "scheduler_interval_ms = 25").unwrap();
        writeln!(file, "[supervisor]").unwrap();
        writeln!(file, "strategy = \"drop\"").unwrap();

        let config = SystemConfig::load(file.path()).unwrap();

        assert_eq!(config.scheduler_interval_ms, 25);
        assert_eq!(config.supervisor, SupervisorPolicy::Drop);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SystemConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ActorError::Config { .. }));
    }
}
