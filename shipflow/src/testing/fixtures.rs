//! Configuration fixtures tuned for fast tests.

use crate::config::DeployConfig;
use crate::retry::{JitterStrategy, RetryPolicy};

/// A retry policy with millisecond delays and no jitter.
#[must_use]
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new()
        .with_base_delay_ms(1)
        .with_max_delay_ms(5)
        .with_jitter(JitterStrategy::None)
}

/// A valid configuration for the given environment, with polling and
/// retry delays collapsed to milliseconds.
#[must_use]
pub fn test_config(environment: &str) -> DeployConfig {
    DeployConfig {
        function_name: "checkout".to_string(),
        bucket: "artifacts".to_string(),
        region: "eu-west-1".to_string(),
        auth_mode: None,
        environment: environment.to_string(),
        project_root: std::path::PathBuf::from("."),
        operator: "tester".to_string(),
        force: false,
        retry: fast_retry(),
        poll_interval_ms: 1,
        poll_timeout_ms: 200,
        health: None,
        rollback: crate::rollback::RollbackConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        test_config("prod").validate().unwrap();
    }
}
