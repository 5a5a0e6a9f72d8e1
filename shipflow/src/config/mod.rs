//! Deployment configuration.
//!
//! One immutable object constructed up front and passed through every
//! component. No component reads ambient process state.

use crate::errors::{ConfigurationError, DeployError};
use crate::health::HealthCheckConfig;
use crate::retry::RetryPolicy;
use crate::rollback::RollbackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_operator() -> String {
    "unknown".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_poll_timeout_ms() -> u64 {
    60_000
}

/// Resolved configuration for one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Name of the remote function to deploy to.
    pub function_name: String,
    /// Bucket holding versioned artifacts.
    pub bucket: String,
    /// Remote region identifier.
    pub region: String,
    /// Authentication mode handed to the credential collaborator.
    #[serde(default)]
    pub auth_mode: Option<String>,
    /// Target environment name.
    pub environment: String,
    /// Project root probed by the version resolver.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Operator identity recorded in publish descriptions and tags.
    #[serde(default = "default_operator")]
    pub operator: String,
    /// Bypass conflict checks.
    #[serde(default)]
    pub force: bool,
    /// Retry policy for transient remote errors.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Interval between readiness polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Total readiness wait budget, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Post-deploy health check, if configured.
    #[serde(default)]
    pub health: Option<HealthCheckConfig>,
    /// Auto-rollback configuration.
    #[serde(default)]
    pub rollback: RollbackConfig,
}

impl DeployConfig {
    /// Loads and validates configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, DeployError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            DeployError::Configuration(ConfigurationError::missing_fields(vec![format!(
                "invalid config file {}: {e}",
                path.display()
            )]))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Fails fast if any required field is absent.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut missing = Vec::new();
        if self.function_name.trim().is_empty() {
            missing.push("function_name".to_string());
        }
        if self.bucket.trim().is_empty() {
            missing.push("bucket".to_string());
        }
        if self.region.trim().is_empty() {
            missing.push("region".to_string());
        }
        if self.environment.trim().is_empty() {
            missing.push("environment".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::missing_fields(missing))
        }
    }

    /// Interval between readiness polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Total readiness wait budget.
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_json() -> &'static str {
        r#"{
            "function_name": "checkout",
            "bucket": "artifacts",
            "region": "eu-west-1",
            "environment": "prod"
        }"#
    }

    #[test]
    fn test_minimal_config_loads_with_defaults() {
        let config: DeployConfig = serde_json::from_str(minimal_json()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.function_name, "checkout");
        assert!(!config.force);
        assert_eq!(config.operator, "unknown");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.poll_interval(), Duration::from_millis(2_000));
        assert!(config.health.is_none());
        assert!(!config.rollback.enabled);
    }

    #[test]
    fn test_validate_lists_all_missing_fields() {
        let config: DeployConfig = serde_json::from_str(
            r#"{"function_name": "", "bucket": "", "region": "x", "environment": "prod"}"#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert_eq!(err.missing, vec!["function_name", "bucket"]);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        std::fs::write(&path, minimal_json()).unwrap();

        let config = DeployConfig::from_json_file(&path).unwrap();
        assert_eq!(config.bucket, "artifacts");
    }

    #[test]
    fn test_rollback_config_round_trips() {
        let json = r#"{
            "function_name": "fn",
            "bucket": "b",
            "region": "r",
            "environment": "prod",
            "rollback": {
                "enabled": true,
                "on_deploy_failure": true,
                "strategy": "previous_stable"
            }
        }"#;
        let config: DeployConfig = serde_json::from_str(json).unwrap();
        assert!(config.rollback.enabled);
        assert!(config.rollback.on_deploy_failure);
        assert!(!config.rollback.on_health_failure);
    }
}
