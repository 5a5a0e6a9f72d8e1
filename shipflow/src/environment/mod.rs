//! Environment policy: per-environment conflict tolerance and
//! artifact path layout.
//!
//! The policy is looked up once per run and carried through every
//! component, so no stage re-derives behavior from the raw name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of deployment environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Development: iterative deploys keyed by timestamp.
    Dev,
    /// Staging: version-keyed, overwrite allowed with a warning.
    Pre,
    /// Production: version-keyed, overwrite blocked.
    Prod,
}

impl Environment {
    /// Canonical short name used in keys, aliases and tags.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Pre => "pre",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" | "development" => Ok(Self::Dev),
            "pre" | "staging" => Ok(Self::Pre),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(UnknownEnvironment(other.to_string())),
        }
    }
}

/// Marker error for names outside the closed environment set.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown environment name: {0}")]
pub struct UnknownEnvironment(pub String);

/// What happens when the target version already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Existence never blocks (iterative workflows).
    AlwaysAllow,
    /// Existence allowed but warned about.
    WarnAndAllow,
    /// Existence blocks the deploy.
    Block,
}

/// How artifact key identifiers are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStrategy {
    /// Identifier is a compact upload timestamp.
    Timestamp,
    /// Identifier is the normalized version string.
    Version,
}

/// The resolved per-environment policy carried through a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentPolicy {
    /// The environment name as supplied by the caller.
    pub name: String,
    /// The matched environment, if the name was recognized.
    pub environment: Option<Environment>,
    /// Conflict tolerance for this environment.
    pub conflict_policy: ConflictPolicy,
    /// Artifact key layout for this environment.
    pub path_strategy: PathStrategy,
}

impl EnvironmentPolicy {
    /// The alias this environment's traffic points at.
    #[must_use]
    pub fn alias_name(&self) -> String {
        format!("{}-current", self.name)
    }

    /// Whether this environment can be rolled back by version.
    ///
    /// Timestamp-keyed environments have no version-addressable
    /// artifacts, so rollback by version is impossible.
    #[must_use]
    pub fn supports_rollback(&self) -> bool {
        self.path_strategy == PathStrategy::Version
    }
}

/// Looks up the policy for an environment name.
///
/// Unknown names default to the strictest policy (block + version
/// keys) and emit a warning, never a silently permissive fallback.
#[must_use]
pub fn policy_for(name: &str) -> EnvironmentPolicy {
    match name.parse::<Environment>() {
        Ok(env) => {
            let (conflict_policy, path_strategy) = match env {
                Environment::Dev => (ConflictPolicy::AlwaysAllow, PathStrategy::Timestamp),
                Environment::Pre => (ConflictPolicy::WarnAndAllow, PathStrategy::Version),
                Environment::Prod => (ConflictPolicy::Block, PathStrategy::Version),
            };
            EnvironmentPolicy {
                name: env.as_str().to_string(),
                environment: Some(env),
                conflict_policy,
                path_strategy,
            }
        }
        Err(_) => {
            tracing::warn!(
                environment = name,
                "Unknown environment name; defaulting to the strictest (block) policy"
            );
            EnvironmentPolicy {
                name: name.to_string(),
                environment: None,
                conflict_policy: ConflictPolicy::Block,
                path_strategy: PathStrategy::Version,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_environment_parse_aliases() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("staging".parse::<Environment>().unwrap(), Environment::Pre);
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_dev_policy() {
        let policy = policy_for("dev");
        assert_eq!(policy.conflict_policy, ConflictPolicy::AlwaysAllow);
        assert_eq!(policy.path_strategy, PathStrategy::Timestamp);
        assert!(!policy.supports_rollback());
    }

    #[test]
    fn test_pre_policy() {
        let policy = policy_for("pre");
        assert_eq!(policy.conflict_policy, ConflictPolicy::WarnAndAllow);
        assert_eq!(policy.path_strategy, PathStrategy::Version);
        assert!(policy.supports_rollback());
    }

    #[test]
    fn test_prod_policy() {
        let policy = policy_for("prod");
        assert_eq!(policy.conflict_policy, ConflictPolicy::Block);
        assert_eq!(policy.path_strategy, PathStrategy::Version);
    }

    #[test]
    fn test_unknown_name_defaults_to_block() {
        let policy = policy_for("qa");
        assert_eq!(policy.environment, None);
        assert_eq!(policy.conflict_policy, ConflictPolicy::Block);
        assert_eq!(policy.name, "qa");
    }

    #[test]
    fn test_alias_name() {
        assert_eq!(policy_for("prod").alias_name(), "prod-current");
        assert_eq!(policy_for("dev").alias_name(), "dev-current");
    }
}
