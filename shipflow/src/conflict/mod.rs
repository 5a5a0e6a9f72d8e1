//! Conflict detection: decides whether a deploy may proceed given the
//! environment's conflict policy and the artifact store's contents.

use crate::environment::{ConflictPolicy, EnvironmentPolicy};
use crate::errors::{ConflictError, DeployError};
use crate::store::ArtifactStore;

/// The gate's verdict for an allowed deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDecision {
    /// Which rule allowed the deploy.
    pub strategy: &'static str,
    /// Whether an existing artifact will be overwritten.
    pub overwrites: bool,
}

/// Checks whether deploying `version` to the environment may proceed.
///
/// Returns the decision on success; a `block` policy violation comes
/// back as [`DeployError::Conflict`] with remediation. Only the exact
/// computed key counts as a conflict; no prefix matching.
pub async fn check(
    policy: &EnvironmentPolicy,
    version: &str,
    store: &ArtifactStore,
    force: bool,
) -> Result<ConflictDecision, DeployError> {
    if force {
        tracing::warn!(
            environment = %policy.name,
            version,
            "Force flag set: bypassing all conflict checks"
        );
        return Ok(ConflictDecision {
            strategy: "forced",
            overwrites: true,
        });
    }

    if policy.conflict_policy == ConflictPolicy::AlwaysAllow {
        // Timestamp-keyed environments never collide on version; skip
        // the existence probe entirely.
        return Ok(ConflictDecision {
            strategy: "always-allow",
            overwrites: false,
        });
    }

    let exists = store
        .exists(policy, version)
        .await
        .map_err(|source| DeployError::Store {
            stage: "conflict-check",
            source,
        })?;

    match (policy.conflict_policy, exists) {
        (_, false) => Ok(ConflictDecision {
            strategy: "clear",
            overwrites: false,
        }),
        (ConflictPolicy::WarnAndAllow, true) => {
            tracing::warn!(
                environment = %policy.name,
                version,
                "Version already deployed; overwriting. Consider a pre-release suffix (e.g. {version}-rc.1)"
            );
            Ok(ConflictDecision {
                strategy: "overwrite-warned",
                overwrites: true,
            })
        }
        (ConflictPolicy::Block, true) => {
            Err(ConflictError::new(version, policy.name.clone()).into())
        }
        (ConflictPolicy::AlwaysAllow, true) => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::policy_for;
    use crate::store::MemoryObjectStore;
    use std::sync::Arc;

    fn store() -> ArtifactStore {
        ArtifactStore::new(Arc::new(MemoryObjectStore::new()), "artifacts", "fn")
    }

    #[tokio::test]
    async fn test_force_bypasses_block() {
        let store = store();
        let policy = policy_for("prod");
        store.put(vec![1], &policy, "1.0.0").await.unwrap();

        let decision = check(&policy, "1.0.0", &store, true).await.unwrap();
        assert_eq!(decision.strategy, "forced");
        assert!(decision.overwrites);
    }

    #[tokio::test]
    async fn test_block_policy_rejects_existing_version() {
        let store = store();
        let policy = policy_for("prod");
        store.put(vec![1], &policy, "1.0.0").await.unwrap();

        let err = check(&policy, "1.0.0", &store, false).await.unwrap_err();
        match err {
            DeployError::Conflict(conflict) => {
                assert_eq!(conflict.version, "1.0.0");
                let suggestions = conflict.remediation.suggestions.join(" ");
                assert!(suggestions.contains("1.0.1"));
                assert!(suggestions.contains("force"));
            }
            other => panic!("expected conflict, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_block_policy_allows_new_version() {
        let store = store();
        let policy = policy_for("prod");
        store.put(vec![1], &policy, "1.0.0").await.unwrap();

        let decision = check(&policy, "1.0.1", &store, false).await.unwrap();
        assert_eq!(decision.strategy, "clear");
    }

    #[tokio::test]
    async fn test_exact_match_only_no_prefix_conflicts() {
        let store = store();
        let policy = policy_for("prod");
        store.put(vec![1], &policy, "1.0.0").await.unwrap();

        // "1.0" shares a prefix with "1.0.0" but is a different key.
        let decision = check(&policy, "1.0", &store, false).await.unwrap();
        assert_eq!(decision.strategy, "clear");
    }

    #[tokio::test]
    async fn test_warn_and_allow_permits_overwrite() {
        let store = store();
        let policy = policy_for("pre");
        store.put(vec![1], &policy, "1.0.0").await.unwrap();

        let decision = check(&policy, "1.0.0", &store, false).await.unwrap();
        assert_eq!(decision.strategy, "overwrite-warned");
        assert!(decision.overwrites);
    }

    #[tokio::test]
    async fn test_always_allow_never_conflicts() {
        let store = store();
        let policy = policy_for("dev");

        for _ in 0..3 {
            store.put(vec![1], &policy, "1.0.0").await.unwrap();
            let decision = check(&policy, "1.0.0", &store, false).await.unwrap();
            assert_eq!(decision.strategy, "always-allow");
        }
    }
}
