//! Artifact key conventions.
//!
//! Pure string functions defining the canonical object layout:
//! `<function>/<env>/<identifier>.zip`, one level per environment so
//! keys can never collide across environments and existence checks
//! stay exact-match.

use crate::environment::{EnvironmentPolicy, PathStrategy};
use crate::errors::StoreError;

/// File extension for packaged artifacts.
pub const ARTIFACT_EXT: &str = "zip";

/// Name of the per-environment latest pointer object.
pub const LATEST_NAME: &str = "latest";

/// Derives the key for a versioned (or timestamped) artifact.
///
/// `identifier` is the normalized version for the `version` strategy,
/// or a compact upload timestamp for the `timestamp` strategy.
pub fn artifact_key(
    function_name: &str,
    policy: &EnvironmentPolicy,
    identifier: &str,
) -> Result<String, StoreError> {
    let key = format!(
        "{function_name}/{env}/{identifier}.{ARTIFACT_EXT}",
        env = policy.name
    );
    validate_key(&key)?;
    Ok(key)
}

/// Derives the identifier for the configured path strategy.
#[must_use]
pub fn identifier_for(policy: &EnvironmentPolicy, version: &str) -> String {
    match policy.path_strategy {
        PathStrategy::Timestamp => crate::utils::compact_timestamp(),
        PathStrategy::Version => version.to_string(),
    }
}

/// Derives the key of the environment's latest pointer.
pub fn latest_key(
    function_name: &str,
    policy: &EnvironmentPolicy,
) -> Result<String, StoreError> {
    artifact_key(function_name, policy, LATEST_NAME)
}

/// Derives the listing prefix for an environment's artifacts.
#[must_use]
pub fn environment_prefix(function_name: &str, policy: &EnvironmentPolicy) -> String {
    format!("{function_name}/{}/", policy.name)
}

/// Extracts the identifier from a full artifact key, skipping the
/// latest pointer.
#[must_use]
pub fn identifier_from_key(key: &str) -> Option<String> {
    let file = key.rsplit('/').next()?;
    let identifier = file.strip_suffix(&format!(".{ARTIFACT_EXT}"))?;
    if identifier == LATEST_NAME || identifier.is_empty() {
        None
    } else {
        Some(identifier.to_string())
    }
}

/// Validates that a key is a single-line, path-safe string.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.chars().any(char::is_control)
        || key.chars().any(char::is_whitespace)
        || key.split('/').any(|segment| segment.is_empty() || segment == "..");

    if bad {
        return Err(StoreError::Transport(format!(
            "derived key is not path-safe: {key:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::policy_for;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_version_key_layout() {
        let policy = policy_for("prod");
        let key = artifact_key("checkout", &policy, "1.2.3").unwrap();
        assert_eq!(key, "checkout/prod/1.2.3.zip");
    }

    #[test]
    fn test_keys_are_environment_namespaced() {
        let prod = artifact_key("fn", &policy_for("prod"), "1.0.0").unwrap();
        let pre = artifact_key("fn", &policy_for("pre"), "1.0.0").unwrap();
        assert_ne!(prod, pre);
    }

    #[test]
    fn test_latest_key() {
        let policy = policy_for("dev");
        assert_eq!(
            latest_key("fn", &policy).unwrap(),
            "fn/dev/latest.zip"
        );
    }

    #[test]
    fn test_identifier_for_version_strategy() {
        let policy = policy_for("prod");
        assert_eq!(identifier_for(&policy, "1.2.3"), "1.2.3");
    }

    #[test]
    fn test_identifier_for_timestamp_strategy() {
        let policy = policy_for("dev");
        let id = identifier_for(&policy, "1.2.3");
        assert_ne!(id, "1.2.3");
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_identifier_from_key() {
        assert_eq!(
            identifier_from_key("fn/prod/1.2.3.zip"),
            Some("1.2.3".to_string())
        );
        assert_eq!(identifier_from_key("fn/prod/latest.zip"), None);
        assert_eq!(identifier_from_key("fn/prod/notes.txt"), None);
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("fn/../prod/1.0.0.zip").is_err());
        assert!(validate_key("fn/prod/1.0.0.zip\n").is_err());
        assert!(validate_key("fn//1.0.0.zip").is_err());
        assert!(validate_key("fn/prod/1 0 0.zip").is_err());
        assert!(validate_key("fn/prod/1.0.0.zip").is_ok());
    }

    #[test]
    fn test_malformed_version_cannot_escape_namespace() {
        let policy = policy_for("prod");
        assert!(artifact_key("fn", &policy, "../pre/1.0.0").is_err());
    }
}
