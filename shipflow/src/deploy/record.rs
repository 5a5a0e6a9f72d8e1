//! Per-run deployment record and outcome.
//!
//! The record is ephemeral: it lives for one orchestration run and is
//! persisted externally only as remote-side tags.

use super::DeployStage;
use crate::remote::RemoteVersionId;
use crate::store::ArtifactLocation;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Whether this run deploys forward or rolls back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// Normal forward deploy.
    Deploy,
    /// Redeploy of a previously stored version.
    Rollback {
        /// Why the rollback was triggered.
        reason: String,
    },
}

impl DeployMode {
    /// Short mode name for tags and notices.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Rollback { .. } => "rollback",
        }
    }
}

/// Mutable state of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// The remote function being mutated.
    pub function: String,
    /// The logical version being deployed.
    pub version: String,
    /// The target environment name.
    pub environment: String,
    /// Deploy or rollback.
    pub mode: DeployMode,
    /// Current stage.
    pub stage: DeployStage,
    /// Where the artifact lives, once known.
    pub artifact: Option<ArtifactLocation>,
    /// The published remote version id, once known.
    pub remote_version_id: Option<RemoteVersionId>,
    /// Advisory warnings accumulated during the run.
    pub warnings: Vec<String>,
    /// True when version publishing never succeeded (code updated,
    /// no snapshot).
    pub degraded: bool,
    /// Health check verdict, when one ran.
    pub health_passed: Option<bool>,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run reached a terminal stage.
    pub finished_at: Option<Timestamp>,
}

impl DeploymentRecord {
    /// Creates a record at `Idle`.
    #[must_use]
    pub fn new(
        function: impl Into<String>,
        version: impl Into<String>,
        environment: impl Into<String>,
        mode: DeployMode,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            function: function.into(),
            version: version.into(),
            environment: environment.into(),
            mode,
            stage: DeployStage::Idle,
            artifact: None,
            remote_version_id: None,
            warnings: Vec::new(),
            degraded: false,
            health_passed: None,
            started_at: now_utc(),
            finished_at: None,
        }
    }

    /// Moves to the next stage.
    pub fn transition(&mut self, stage: DeployStage) {
        tracing::info!(
            run_id = %self.run_id,
            from = %self.stage,
            to = %stage,
            "Stage transition"
        );
        self.stage = stage;
        if stage.is_terminal() {
            self.finished_at = Some(now_utc());
        }
    }

    /// Records an advisory warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(run_id = %self.run_id, "{message}");
        self.warnings.push(message);
    }
}

/// Final status of a run that reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    /// Everything succeeded.
    Success,
    /// Succeeded with advisory warnings.
    SuccessWithWarnings,
    /// Code updated but no version snapshot was published.
    Degraded,
    /// The run failed.
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::SuccessWithWarnings => "success-with-warnings",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    /// The run's record.
    pub record: DeploymentRecord,
    /// Overall status.
    pub status: OutcomeStatus,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl DeployOutcome {
    /// Derives the status from a record that reached `Done`.
    #[must_use]
    pub fn from_record(record: DeploymentRecord, duration: Duration) -> Self {
        let status = if record.degraded {
            OutcomeStatus::Degraded
        } else if record.warnings.is_empty() {
            OutcomeStatus::Success
        } else {
            OutcomeStatus::SuccessWithWarnings
        };
        Self {
            record,
            status,
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transition_records_finish_time() {
        let mut record = DeploymentRecord::new("fn", "1.0.0", "prod", DeployMode::Deploy);
        assert!(record.finished_at.is_none());

        record.transition(DeployStage::Uploading);
        assert!(record.finished_at.is_none());

        record.transition(DeployStage::Done);
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_outcome_status_derivation() {
        let clean = DeploymentRecord::new("fn", "1.0.0", "prod", DeployMode::Deploy);
        let outcome = DeployOutcome::from_record(clean, Duration::from_secs(1));
        assert_eq!(outcome.status, OutcomeStatus::Success);

        let mut warned = DeploymentRecord::new("fn", "1.0.0", "prod", DeployMode::Deploy);
        warned.warnings.push("alias failed".to_string());
        let outcome = DeployOutcome::from_record(warned, Duration::from_secs(1));
        assert_eq!(outcome.status, OutcomeStatus::SuccessWithWarnings);

        let mut degraded = DeploymentRecord::new("fn", "1.0.0", "prod", DeployMode::Deploy);
        degraded.degraded = true;
        let outcome = DeployOutcome::from_record(degraded, Duration::from_secs(1));
        assert_eq!(outcome.status, OutcomeStatus::Degraded);
    }

    #[test]
    fn test_mode_as_str() {
        assert_eq!(DeployMode::Deploy.as_str(), "deploy");
        assert_eq!(
            DeployMode::Rollback {
                reason: "health".into()
            }
            .as_str(),
            "rollback"
        );
    }
}
