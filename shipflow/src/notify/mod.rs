//! Deployment outcome notification.
//!
//! Delivery is best-effort: the orchestrator never blocks on, or fails
//! because of, a notifier.

use crate::deploy::{DeployMode, DeployOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structured outcome record handed to notifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentNotice {
    /// The function that was deployed.
    pub function: String,
    /// The logical version.
    pub version: String,
    /// The target environment.
    pub environment: String,
    /// Deploy or rollback.
    pub mode: String,
    /// Final status of the run.
    pub status: String,
    /// Remote version id, when publishing succeeded.
    pub remote_version_id: Option<String>,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
    /// Warnings accumulated during the run.
    pub warnings: Vec<String>,
}

impl DeploymentNotice {
    /// Builds a notice from a finished outcome.
    #[must_use]
    pub fn from_outcome(outcome: &DeployOutcome) -> Self {
        let record = &outcome.record;
        Self {
            function: record.function.clone(),
            version: record.version.clone(),
            environment: record.environment.clone(),
            mode: match &record.mode {
                DeployMode::Deploy => "deploy".to_string(),
                DeployMode::Rollback { .. } => "rollback".to_string(),
            },
            status: outcome.status.to_string(),
            remote_version_id: record.remote_version_id.as_ref().map(|id| id.0.clone()),
            duration_ms: outcome.duration.as_millis() as u64,
            warnings: record.warnings.clone(),
        }
    }
}

/// Best-effort notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a notice. Errors are the implementation's to report;
    /// callers ignore them.
    async fn notify(&self, notice: &DeploymentNotice);
}

/// Default notifier: writes the notice to the tracing log.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: &DeploymentNotice) {
        tracing::info!(
            function = %notice.function,
            version = %notice.version,
            environment = %notice.environment,
            mode = %notice.mode,
            status = %notice.status,
            remote_version_id = notice.remote_version_id.as_deref().unwrap_or("-"),
            duration_ms = notice.duration_ms,
            warnings = notice.warnings.len(),
            "Deployment outcome"
        );
    }
}
