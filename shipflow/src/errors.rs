//! Error types for the shipflow deployment engine.
//!
//! The taxonomy separates configuration errors (fatal, no retry),
//! conflict errors (fatal, with remediation), transient remote errors
//! (retried with backoff), definitive remote failures (fatal, never
//! retried) and advisory failures (warnings recorded on the outcome).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for deployment operations.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Required configuration is missing or invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A version conflict blocked the deploy.
    #[error("{0}")]
    Conflict(#[from] ConflictError),

    /// The artifact store failed during a stage.
    #[error("store error at stage '{stage}': {source}")]
    Store {
        /// The stage that was executing.
        stage: &'static str,
        /// The underlying store error.
        source: StoreError,
    },

    /// A requested artifact version does not exist in the store.
    #[error(
        "version '{version}' not found in '{environment}' (available: {})",
        if available.is_empty() { "none".to_string() } else { available.join(", ") }
    )]
    VersionNotFound {
        /// The requested version.
        version: String,
        /// The environment that was searched.
        environment: String,
        /// Versions currently present for that environment.
        available: Vec<String>,
    },

    /// Transient remote errors exhausted the retry budget.
    #[error("stage '{stage}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// The stage that was executing.
        stage: &'static str,
        /// Number of attempts made.
        attempts: usize,
        /// The last error observed.
        source: RemoteError,
    },

    /// The remote side reported a definitive failure for this update.
    #[error("remote function reported failure at stage '{stage}': {reason}")]
    RemoteFailed {
        /// The stage that was executing.
        stage: &'static str,
        /// The failure reason reported by the remote side.
        reason: String,
    },

    /// A non-retryable remote error outside the retry path.
    #[error("remote error at stage '{stage}': {source}")]
    Remote {
        /// The stage that was executing.
        stage: &'static str,
        /// The underlying remote error.
        source: RemoteError,
    },

    /// No rollback target could be resolved.
    #[error("{0}")]
    RollbackTarget(#[from] RollbackTargetError),

    /// The environment cannot be rolled back by version.
    #[error(
        "environment '{environment}' uses timestamp artifact keys and cannot be rolled back by version"
    )]
    RollbackUnsupported {
        /// The environment name.
        environment: String,
    },

    /// The run was cancelled at a stage boundary.
    #[error("run cancelled at stage '{stage}': {reason}")]
    Cancelled {
        /// The stage boundary where cancellation was observed.
        stage: &'static str,
        /// The cancellation reason.
        reason: String,
    },

    /// IO error (reading artifacts or config from disk).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Category of failure, used by the rollback trigger gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The deployment state machine itself failed.
    Deployment,
    /// The post-deploy health check did not pass.
    HealthCheck,
}

/// Structured remediation attached to conflict and rollback errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemediationInfo {
    /// Error code (e.g., "DEPLOY-001-CONFLICT").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Concrete next steps for the operator.
    pub suggestions: Vec<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl RemediationInfo {
    /// Creates a new remediation info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            suggestions: Vec::new(),
            context: HashMap::new(),
        }
    }

    /// Adds a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when required configuration is missing.
#[derive(Debug, Clone, Error)]
#[error("missing required configuration: {}", missing.join(", "))]
pub struct ConfigurationError {
    /// The missing field names.
    pub missing: Vec<String>,
}

impl ConfigurationError {
    /// Creates a configuration error for the given missing fields.
    #[must_use]
    pub fn missing_fields(missing: Vec<String>) -> Self {
        Self { missing }
    }
}

/// Error raised when a `block` conflict policy rejects a deploy.
#[derive(Debug, Clone, Error)]
#[error(
    "version '{version}' already exists in '{environment}' and the environment blocks overwrites"
)]
pub struct ConflictError {
    /// The conflicting version.
    pub version: String,
    /// The environment where the conflict occurred.
    pub environment: String,
    /// Remediation with concrete next steps.
    pub remediation: RemediationInfo,
}

impl ConflictError {
    /// Creates a conflict error with the standard remediations
    /// (bump the version, or force the deploy).
    #[must_use]
    pub fn new(version: impl Into<String>, environment: impl Into<String>) -> Self {
        let version = version.into();
        let environment = environment.into();
        let remediation = RemediationInfo::new(
            "DEPLOY-001-CONFLICT",
            format!("version '{version}' already deployed to '{environment}'"),
        )
        .with_suggestion(match crate::version::bump_patch(&version) {
            Some(next) => format!("bump the version (e.g. {next}) and redeploy"),
            None => "bump the version and redeploy".to_string(),
        })
        .with_suggestion("re-run with force enabled to overwrite the existing artifact")
        .with_context_entry("version", version.clone())
        .with_context_entry("environment", environment.clone());

        Self {
            version,
            environment,
            remediation,
        }
    }
}

/// Error raised when rollback target selection produces no candidate.
///
/// Distinct from "rollback not needed": this fires only when a rollback
/// was requested or triggered and no concrete target version exists.
#[derive(Debug, Clone, Error)]
#[error("no rollback target could be resolved via '{strategy}': {detail}")]
pub struct RollbackTargetError {
    /// The strategy that was attempted.
    pub strategy: String,
    /// Why no candidate was found.
    pub detail: String,
    /// Remediation with concrete next steps.
    pub remediation: RemediationInfo,
}

impl RollbackTargetError {
    /// Creates a rollback target error.
    #[must_use]
    pub fn new(strategy: impl Into<String>, detail: impl Into<String>) -> Self {
        let strategy = strategy.into();
        let detail = detail.into();
        let remediation = RemediationInfo::new(
            "DEPLOY-002-NO-ROLLBACK-TARGET",
            format!("rollback strategy '{strategy}' found no candidate"),
        )
        .with_suggestion("pass an explicit target version for the rollback")
        .with_suggestion("check that a previous deploy tagged the function with its version");

        Self {
            strategy,
            detail,
            remediation,
        }
    }
}

/// Errors from the blob store collaborator.
///
/// `NotFound` is a normal, non-retryable outcome (an existence probe
/// coming back empty); transport and auth failures are a different
/// class and may be retried.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The object does not exist.
    #[error("object not found: {key}")]
    NotFound {
        /// The key that was requested.
        key: String,
    },

    /// Network-level failure talking to the store.
    #[error("store transport error: {0}")]
    Transport(String),

    /// The store rejected the credentials.
    #[error("store access denied: {0}")]
    AccessDenied(String),
}

impl StoreError {
    /// Whether this error may succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Errors from the function execution service collaborator.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// A concurrent update is in progress on the function.
    #[error("resource busy: {0}")]
    Busy(String),

    /// The control plane is throttling requests.
    #[error("throttled: {0}")]
    Throttled(String),

    /// Network-level failure talking to the control plane.
    #[error("transport error: {0}")]
    Transport(String),

    /// The function (or alias) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote side reported the code update as failed.
    /// Definitive: retrying without a new artifact is meaningless.
    #[error("update failed: {0}")]
    UpdateFailed(String),

    /// Synchronous invocation failed before the function ran.
    #[error("invocation error: {0}")]
    Invocation(String),
}

impl RemoteError {
    /// Whether this error may succeed on retry.
    ///
    /// Busy counts as retryable (the remote side serializes updates),
    /// but the retry engine still caps attempts.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Throttled(_) | Self::Transport(_))
    }
}
