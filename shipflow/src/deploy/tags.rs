//! Audit tag conventions on the remote function resource.
//!
//! Tags are the only durable record a run leaves behind; the rollback
//! manager reads them back to find the last successful version.

/// Tag key for the last successfully deployed version, per environment.
#[must_use]
pub fn version_key(environment: &str) -> String {
    format!("shipflow:{environment}:version")
}

/// Tag key for the version recorded before the last run, per
/// environment. Written so a rollback can still find the prior good
/// version after the main version tag has been overwritten.
#[must_use]
pub fn previous_key(environment: &str) -> String {
    format!("shipflow:{environment}:previous")
}

/// Tag key for the mode of the last run, per environment.
#[must_use]
pub fn mode_key(environment: &str) -> String {
    format!("shipflow:{environment}:mode")
}

/// Tag key for the actor of the last run, per environment.
#[must_use]
pub fn actor_key(environment: &str) -> String {
    format!("shipflow:{environment}:actor")
}

/// Tag key for the timestamp of the last run, per environment.
#[must_use]
pub fn timestamp_key(environment: &str) -> String {
    format!("shipflow:{environment}:timestamp")
}

/// Tag key for the rollback reason, per environment.
#[must_use]
pub fn reason_key(environment: &str) -> String {
    format!("shipflow:{environment}:reason")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_environment_scoped() {
        assert_eq!(version_key("prod"), "shipflow:prod:version");
        assert_eq!(previous_key("prod"), "shipflow:prod:previous");
        assert_ne!(version_key("prod"), version_key("pre"));
    }
}
