//! Rollback target selection and auto-rollback gating.
//!
//! Selection failure is fatal and distinct from "rollback not needed":
//! automatic rollback cannot proceed without a concrete target.

use crate::deploy::tags;
use crate::environment::EnvironmentPolicy;
use crate::errors::{DeployError, FailureKind, RollbackTargetError};
use crate::remote::FunctionService;
use crate::store::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a rollback target is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStrategy {
    /// Last version recorded as successfully deployed (remote tags).
    #[default]
    LastSuccessful,
    /// Operator/config-supplied fixed target.
    SpecificVersion,
    /// The version immediately preceding the current one in the
    /// artifact store's ordering.
    PreviousStable,
}

impl fmt::Display for RollbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LastSuccessful => "last_successful",
            Self::SpecificVersion => "specific_version",
            Self::PreviousStable => "previous_stable",
        };
        f.write_str(s)
    }
}

/// Auto-rollback configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RollbackConfig {
    /// Master switch for the rollback feature.
    #[serde(default)]
    pub enabled: bool,
    /// Trigger on deployment failure.
    #[serde(default)]
    pub on_deploy_failure: bool,
    /// Trigger on health-check failure.
    #[serde(default)]
    pub on_health_failure: bool,
    /// Target selection strategy.
    #[serde(default)]
    pub strategy: RollbackStrategy,
    /// Configured fallback target for `specific_version`.
    #[serde(default)]
    pub fallback_version: Option<String>,
}

/// Whether an observed failure should trigger an automatic rollback.
///
/// All three gates must pass: the feature is enabled, the failure
/// category is configured as a trigger, and the environment supports
/// rollback at all.
#[must_use]
pub fn should_trigger(
    kind: FailureKind,
    config: &RollbackConfig,
    policy: &EnvironmentPolicy,
) -> bool {
    if !config.enabled || !policy.supports_rollback() {
        return false;
    }
    match kind {
        FailureKind::Deployment => config.on_deploy_failure,
        FailureKind::HealthCheck => config.on_health_failure,
    }
}

/// Selects the version to roll back to.
///
/// An explicit target always wins. Otherwise the configured strategy
/// runs; no candidate is a fatal [`RollbackTargetError`].
pub async fn select_target(
    config: &RollbackConfig,
    explicit: Option<&str>,
    current_version: Option<&str>,
    policy: &EnvironmentPolicy,
    store: &ArtifactStore,
    service: &dyn FunctionService,
    function: &str,
) -> Result<String, DeployError> {
    if !policy.supports_rollback() {
        return Err(DeployError::RollbackUnsupported {
            environment: policy.name.clone(),
        });
    }

    if let Some(target) = explicit {
        let trimmed = target.trim();
        if !trimmed.is_empty() {
            return Ok(crate::version::normalize(trimmed));
        }
    }

    match config.strategy {
        RollbackStrategy::SpecificVersion => config
            .fallback_version
            .as_deref()
            .map(crate::version::normalize)
            .ok_or_else(|| {
                RollbackTargetError::new(
                    "specific_version",
                    "no explicit target and no configured fallback version",
                )
                .into()
            }),
        RollbackStrategy::LastSuccessful => {
            last_successful(service, function, policy, current_version).await
        }
        RollbackStrategy::PreviousStable => {
            previous_stable(store, policy, current_version).await
        }
    }
}

async fn last_successful(
    service: &dyn FunctionService,
    function: &str,
    policy: &EnvironmentPolicy,
    current_version: Option<&str>,
) -> Result<String, DeployError> {
    let tags = service
        .get_tags(function)
        .await
        .map_err(|source| DeployError::Remote {
            stage: "rollback-select",
            source,
        })?;

    let key = tags::version_key(&policy.name);
    match tags.get(&key) {
        Some(version) if Some(version.as_str()) != current_version => Ok(version.clone()),
        // The main tag already records the version being rolled back
        // (it was tagged before its health check failed); fall back to
        // the preserved previous version.
        Some(version) => match tags.get(&tags::previous_key(&policy.name)) {
            Some(previous) if Some(previous.as_str()) != current_version => Ok(previous.clone()),
            _ => Err(RollbackTargetError::new(
                "last_successful",
                format!(
                    "last recorded version '{version}' is the version being rolled back and no earlier version is recorded"
                ),
            )
            .into()),
        },
        None => Err(RollbackTargetError::new(
            "last_successful",
            format!("function '{function}' carries no '{key}' tag"),
        )
        .into()),
    }
}

async fn previous_stable(
    store: &ArtifactStore,
    policy: &EnvironmentPolicy,
    current_version: Option<&str>,
) -> Result<String, DeployError> {
    let versions = store
        .list_versions(policy)
        .await
        .map_err(|source| DeployError::Store {
            stage: "rollback-select",
            source,
        })?;

    let candidate = match current_version {
        Some(current) => match versions.iter().position(|v| v == current) {
            Some(0) | None => None,
            Some(pos) => versions.get(pos - 1).cloned(),
        },
        // No known current version: take the newest stored artifact.
        None => versions.last().cloned(),
    };

    candidate.ok_or_else(|| {
        RollbackTargetError::new(
            "previous_stable",
            format!(
                "no version precedes '{}' in '{}'",
                current_version.unwrap_or("<unknown>"),
                policy.name
            ),
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::policy_for;
    use crate::store::MemoryObjectStore;
    use crate::testing::MockFunctionService;
    use std::sync::Arc;

    fn store() -> ArtifactStore {
        ArtifactStore::new(Arc::new(MemoryObjectStore::new()), "artifacts", "fn")
    }

    #[test]
    fn test_trigger_gates() {
        let policy = policy_for("prod");
        let config = RollbackConfig {
            enabled: true,
            on_deploy_failure: true,
            on_health_failure: false,
            ..Default::default()
        };

        assert!(should_trigger(FailureKind::Deployment, &config, &policy));
        assert!(!should_trigger(FailureKind::HealthCheck, &config, &policy));

        let disabled = RollbackConfig {
            enabled: false,
            ..config.clone()
        };
        assert!(!should_trigger(FailureKind::Deployment, &disabled, &policy));
    }

    #[test]
    fn test_timestamp_environments_never_trigger() {
        let config = RollbackConfig {
            enabled: true,
            on_deploy_failure: true,
            on_health_failure: true,
            ..Default::default()
        };
        let dev = policy_for("dev");
        assert!(!should_trigger(FailureKind::Deployment, &config, &dev));
    }

    #[tokio::test]
    async fn test_timestamp_environment_rejects_selection() {
        let service = MockFunctionService::new();
        let err = select_target(
            &RollbackConfig::default(),
            Some("1.0.0"),
            None,
            &policy_for("dev"),
            &store(),
            &service,
            "fn",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::RollbackUnsupported { .. }));
    }

    #[tokio::test]
    async fn test_explicit_target_wins() {
        let service = MockFunctionService::new();
        let target = select_target(
            &RollbackConfig {
                strategy: RollbackStrategy::LastSuccessful,
                ..Default::default()
            },
            Some("v1.2.3"),
            None,
            &policy_for("prod"),
            &store(),
            &service,
            "fn",
        )
        .await
        .unwrap();

        assert_eq!(target, "1.2.3");
    }

    #[tokio::test]
    async fn test_last_successful_reads_tags() {
        let service = MockFunctionService::new();
        service.set_tag(tags::version_key("prod"), "1.4.0");

        let target = select_target(
            &RollbackConfig {
                strategy: RollbackStrategy::LastSuccessful,
                ..Default::default()
            },
            None,
            Some("1.5.0"),
            &policy_for("prod"),
            &store(),
            &service,
            "fn",
        )
        .await
        .unwrap();

        assert_eq!(target, "1.4.0");
    }

    #[tokio::test]
    async fn test_last_successful_falls_back_to_previous_tag() {
        // The main tag already carries the version being rolled back;
        // the preserved previous version is the usable target.
        let service = MockFunctionService::new();
        service.set_tag(tags::version_key("prod"), "1.5.0");
        service.set_tag(tags::previous_key("prod"), "1.4.0");

        let target = select_target(
            &RollbackConfig {
                strategy: RollbackStrategy::LastSuccessful,
                ..Default::default()
            },
            None,
            Some("1.5.0"),
            &policy_for("prod"),
            &store(),
            &service,
            "fn",
        )
        .await
        .unwrap();

        assert_eq!(target, "1.4.0");
    }

    #[tokio::test]
    async fn test_last_successful_without_earlier_version_is_fatal() {
        let service = MockFunctionService::new();
        service.set_tag(tags::version_key("prod"), "1.5.0");

        let err = select_target(
            &RollbackConfig {
                strategy: RollbackStrategy::LastSuccessful,
                ..Default::default()
            },
            None,
            Some("1.5.0"),
            &policy_for("prod"),
            &store(),
            &service,
            "fn",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::RollbackTarget(_)));
    }

    #[tokio::test]
    async fn test_last_successful_without_tags_is_fatal() {
        let service = MockFunctionService::new();
        let err = select_target(
            &RollbackConfig {
                strategy: RollbackStrategy::LastSuccessful,
                ..Default::default()
            },
            None,
            None,
            &policy_for("prod"),
            &store(),
            &service,
            "fn",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::RollbackTarget(_)));
    }

    #[tokio::test]
    async fn test_previous_stable_walks_store_ordering() {
        let service = MockFunctionService::new();
        let store = store();
        let policy = policy_for("prod");
        store.put(vec![1], &policy, "1.0.0").await.unwrap();
        store.put(vec![2], &policy, "1.1.0").await.unwrap();
        store.put(vec![3], &policy, "1.2.0").await.unwrap();

        let target = select_target(
            &RollbackConfig {
                strategy: RollbackStrategy::PreviousStable,
                ..Default::default()
            },
            None,
            Some("1.2.0"),
            &policy,
            &store,
            &service,
            "fn",
        )
        .await
        .unwrap();

        assert_eq!(target, "1.1.0");
    }

    #[tokio::test]
    async fn test_previous_stable_nothing_before_first() {
        let service = MockFunctionService::new();
        let store = store();
        let policy = policy_for("prod");
        store.put(vec![1], &policy, "1.0.0").await.unwrap();

        let err = select_target(
            &RollbackConfig {
                strategy: RollbackStrategy::PreviousStable,
                ..Default::default()
            },
            None,
            Some("1.0.0"),
            &policy,
            &store,
            &service,
            "fn",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::RollbackTarget(_)));
    }

    #[tokio::test]
    async fn test_specific_version_requires_fallback() {
        let service = MockFunctionService::new();
        let err = select_target(
            &RollbackConfig {
                strategy: RollbackStrategy::SpecificVersion,
                fallback_version: None,
                ..Default::default()
            },
            None,
            None,
            &policy_for("prod"),
            &store(),
            &service,
            "fn",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::RollbackTarget(_)));
    }
}
