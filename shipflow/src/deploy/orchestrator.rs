//! The deployment orchestrator.
//!
//! Drives the remote function through upload, code update, readiness
//! polling, version publish, alias switch and tagging, or through the
//! mirrored rollback sequence starting from the code update.
//!
//! The machine is deliberately NOT transactional: a fatal error aborts
//! at the current stage boundary and leaves already-applied remote
//! mutations in place. The rollback subsystem is the only sanctioned
//! recovery path; the remote API cannot support atomic compensation.

use super::{tags, DeployMode, DeployOutcome, DeployStage, DeploymentRecord, OutcomeStatus};
use crate::cancellation::CancellationToken;
use crate::config::DeployConfig;
use crate::conflict;
use crate::environment::{policy_for, EnvironmentPolicy};
use crate::errors::{DeployError, FailureKind, RemoteError};
use crate::health;
use crate::notify::{DeploymentNotice, Notifier};
use crate::remote::{FunctionService, LastUpdateStatus};
use crate::retry::{poll_until, with_retry, PollOutcome, Probe};
use crate::rollback;
use crate::store::{ArtifactLocation, ArtifactStore};
use crate::utils::iso_timestamp;
use crate::version::ResolvedVersion;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Version publishing gets its own small fixed retry bound.
const PUBLISH_MAX_ATTEMPTS: usize = 3;

/// Result of a deploy that may have triggered automatic recovery.
#[derive(Debug)]
pub struct RecoveredOutcome {
    /// The original deploy result.
    pub deploy: Result<DeployOutcome, DeployError>,
    /// The rollback result, when one was triggered.
    pub rollback: Option<Result<DeployOutcome, DeployError>>,
}

/// Drives one logical workflow per invocation, strictly sequentially.
///
/// The remote function is externally owned and may be mutated by other
/// agents; busy-retry and readiness polling exist for exactly that
/// reason.
pub struct Orchestrator {
    service: Arc<dyn FunctionService>,
    store: ArtifactStore,
    config: DeployConfig,
    policy: EnvironmentPolicy,
    cancel: Arc<CancellationToken>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Orchestrator {
    /// Creates an orchestrator, failing fast on invalid configuration.
    pub fn new(
        service: Arc<dyn FunctionService>,
        store: ArtifactStore,
        config: DeployConfig,
    ) -> Result<Self, DeployError> {
        config.validate()?;
        let policy = policy_for(&config.environment);
        Ok(Self {
            service,
            store,
            config,
            policy,
            cancel: Arc::new(CancellationToken::new()),
            notifier: None,
        })
    }

    /// Uses an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Attaches a best-effort outcome notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The resolved environment policy for this run.
    #[must_use]
    pub fn policy(&self) -> &EnvironmentPolicy {
        &self.policy
    }

    /// Deploys an artifact: conflict gate, upload, then the state
    /// machine from `UpdatingCode` onward, plus an advisory health
    /// check when configured.
    pub async fn deploy(
        &self,
        artifact: Vec<u8>,
        version: &ResolvedVersion,
    ) -> Result<DeployOutcome, DeployError> {
        let started = Instant::now();
        let mut record = DeploymentRecord::new(
            &self.config.function_name,
            &version.version,
            &self.policy.name,
            DeployMode::Deploy,
        );
        tracing::info!(
            run_id = %record.run_id,
            function = %record.function,
            version = %record.version,
            environment = %record.environment,
            source = %version.source,
            "Starting deploy"
        );

        let result = self.run_deploy(&mut record, artifact, version).await;
        self.finish(record, started, result).await
    }

    /// Rolls back to a previously stored version.
    ///
    /// The artifact is fetched from the store (never re-built, never
    /// re-uploaded) and the machine runs from `UpdatingCode` onward.
    pub async fn rollback(
        &self,
        explicit_target: Option<&str>,
        reason: &str,
    ) -> Result<DeployOutcome, DeployError> {
        let current = self.current_tagged_version().await;
        self.rollback_from(explicit_target, current.as_deref(), reason)
            .await
    }

    /// Rollback with a known "version being replaced". The target
    /// selector uses it to refuse rolling back onto itself.
    async fn rollback_from(
        &self,
        explicit_target: Option<&str>,
        current: Option<&str>,
        reason: &str,
    ) -> Result<DeployOutcome, DeployError> {
        let started = Instant::now();

        let target = rollback::select_target(
            &self.config.rollback,
            explicit_target,
            current,
            &self.policy,
            &self.store,
            self.service.as_ref(),
            &self.config.function_name,
        )
        .await?;

        // Fail loudly here if the target's artifact is gone; get()
        // reports the available versions for the operator.
        let (location, _bytes) = self.store.get(&self.policy, &target).await?;

        let mut record = DeploymentRecord::new(
            &self.config.function_name,
            &target,
            &self.policy.name,
            DeployMode::Rollback {
                reason: reason.to_string(),
            },
        );
        record.artifact = Some(location.clone());
        tracing::info!(
            run_id = %record.run_id,
            target = %target,
            reason,
            "Starting rollback"
        );

        // The store's latest pointer follows the deployed artifact.
        if let Err(err) = self.store.update_latest_pointer(&self.policy, &target).await {
            record.warn(format!("latest pointer refresh failed: {err}"));
        }

        let result = self.run_machine(&mut record, &location).await;
        self.finish(record, started, result).await
    }

    /// Deploys, then applies the configured auto-rollback triggers on
    /// deployment failure or on an advisory health-check failure.
    pub async fn deploy_with_recovery(
        &self,
        artifact: Vec<u8>,
        version: &ResolvedVersion,
    ) -> RecoveredOutcome {
        let deploy = self.deploy(artifact, version).await;

        let rollback = match &deploy {
            Err(err)
                if rollback::should_trigger(
                    FailureKind::Deployment,
                    &self.config.rollback,
                    &self.policy,
                ) =>
            {
                let reason = format!("deployment failed: {err}");
                Some(
                    self.rollback_from(None, Some(&version.version), &reason)
                        .await,
                )
            }
            Ok(outcome)
                if outcome.record.health_passed == Some(false)
                    && rollback::should_trigger(
                        FailureKind::HealthCheck,
                        &self.config.rollback,
                        &self.policy,
                    ) =>
            {
                Some(
                    self.rollback_from(None, Some(&version.version), "health check failed")
                        .await,
                )
            }
            _ => None,
        };

        RecoveredOutcome { deploy, rollback }
    }

    async fn run_deploy(
        &self,
        record: &mut DeploymentRecord,
        artifact: Vec<u8>,
        version: &ResolvedVersion,
    ) -> Result<(), DeployError> {
        let decision =
            conflict::check(&self.policy, &version.version, &self.store, self.config.force)
                .await?;
        tracing::info!(
            strategy = decision.strategy,
            overwrites = decision.overwrites,
            "Conflict gate passed"
        );

        self.check_cancelled("uploading")?;
        record.transition(DeployStage::Uploading);
        let location = self
            .store
            .put(artifact, &self.policy, &version.version)
            .await
            .map_err(|source| DeployError::Store {
                stage: "uploading",
                source,
            })?;
        record.artifact = Some(location.clone());

        self.run_machine(record, &location).await?;

        if let Some(check) = &self.config.health {
            match health::validate(self.service.as_ref(), &self.config.function_name, check).await
            {
                Ok(report) => {
                    record.health_passed = Some(report.passed);
                    for failed in report.checks.iter().filter(|c| !c.passed) {
                        record.warn(format!(
                            "health check '{}' failed: {}",
                            failed.check, failed.detail
                        ));
                    }
                }
                Err(err) => {
                    record.health_passed = Some(false);
                    record.warn(format!("health check invocation failed: {err}"));
                }
            }
        }

        Ok(())
    }

    /// The shared stage sequence from `UpdatingCode` to `Done`.
    async fn run_machine(
        &self,
        record: &mut DeploymentRecord,
        location: &ArtifactLocation,
    ) -> Result<(), DeployError> {
        let function = self.config.function_name.clone();

        // UpdatingCode: retried on transient errors; "busy" counts as
        // transient because the remote side serializes updates.
        self.check_cancelled("updating-code")?;
        record.transition(DeployStage::UpdatingCode);
        with_retry(
            &self.config.retry,
            "update-code",
            RemoteError::is_retryable,
            || {
                let service = Arc::clone(&self.service);
                let function = function.clone();
                let location = location.clone();
                async move { service.update_code(&function, &location).await }
            },
        )
        .await
        .map_err(|(source, attempts)| {
            if attempts > 1 {
                DeployError::RetriesExhausted {
                    stage: "updating-code",
                    attempts,
                    source,
                }
            } else {
                DeployError::Remote {
                    stage: "updating-code",
                    source,
                }
            }
        })?;

        // AwaitingReady: a reported update failure aborts; a timeout
        // does not (remote updates commonly outlive local budgets).
        self.check_cancelled("awaiting-ready")?;
        record.transition(DeployStage::AwaitingReady);
        let readiness = poll_until(self.config.poll_interval(), self.config.poll_timeout(), || {
            let service = Arc::clone(&self.service);
            let function = function.clone();
            async move {
                match service.get_state(&function).await {
                    Ok(state) if state.last_update == LastUpdateStatus::Failed => Probe::Abort(
                        "remote reported the code update as failed".to_string(),
                    ),
                    Ok(state) if state.is_ready() => Probe::Ready(()),
                    Ok(_) => Probe::Pending,
                    Err(err) => {
                        tracing::debug!(error = %err, "State poll failed; polling again");
                        Probe::Pending
                    }
                }
            }
        })
        .await;
        match readiness {
            PollOutcome::Ready(()) => {}
            PollOutcome::Aborted(reason) => {
                return Err(DeployError::RemoteFailed {
                    stage: "awaiting-ready",
                    reason,
                });
            }
            PollOutcome::TimedOut => {
                record.warn("readiness wait budget exceeded; proceeding while the remote update settles");
            }
        }

        // PublishingVersion: bounded retries; exhaustion degrades the
        // run instead of failing it (the code update stands).
        self.check_cancelled("publishing-version")?;
        record.transition(DeployStage::PublishingVersion);
        let description = self.publish_description(record);
        let publish_retry = self
            .config
            .retry
            .clone()
            .with_max_attempts(PUBLISH_MAX_ATTEMPTS);
        let published = with_retry(
            &publish_retry,
            "publish-version",
            RemoteError::is_retryable,
            || {
                let service = Arc::clone(&self.service);
                let function = function.clone();
                let description = description.clone();
                async move { service.publish_version(&function, &description).await }
            },
        )
        .await;
        match published {
            Ok(id) => record.remote_version_id = Some(id),
            Err((source, attempts)) => {
                record.degraded = true;
                record.warn(format!(
                    "version publish failed after {attempts} attempt(s): {source}; code update stands but no snapshot exists"
                ));
            }
        }

        // UpdatingAlias: idempotent delete-then-create; non-fatal.
        self.check_cancelled("updating-alias")?;
        record.transition(DeployStage::UpdatingAlias);
        if let Some(version_id) = record.remote_version_id.clone() {
            let alias = self.policy.alias_name();
            match self.service.delete_alias(&function, &alias).await {
                Ok(()) | Err(RemoteError::NotFound(_)) => {}
                Err(err) => record.warn(format!("alias delete failed: {err}")),
            }
            if let Err(err) = self.service.create_alias(&function, &alias, &version_id).await {
                record.warn(format!(
                    "alias update failed: {err}; invokers still reach the previous version"
                ));
            }
        } else {
            record.warn("skipping alias update: no published version id");
        }

        // Tagging: best-effort audit metadata. The version recorded so
        // far is preserved under the previous-version key so a later
        // rollback can still find it after this overwrite.
        self.check_cancelled("tagging")?;
        record.transition(DeployStage::Tagging);
        let previous = self.current_tagged_version().await;
        if let Err(err) = self
            .service
            .tag_resource(&function, self.audit_tags(record, previous))
            .await
        {
            record.warn(format!("audit tagging failed: {err}"));
        }

        record.transition(DeployStage::Done);
        Ok(())
    }

    fn audit_tags(
        &self,
        record: &DeploymentRecord,
        previous: Option<String>,
    ) -> HashMap<String, String> {
        let env = &record.environment;
        let mut map = HashMap::new();
        map.insert(tags::version_key(env), record.version.clone());
        if let Some(previous) = previous {
            if previous != record.version {
                map.insert(tags::previous_key(env), previous);
            }
        }
        map.insert(tags::mode_key(env), record.mode.as_str().to_string());
        map.insert(tags::actor_key(env), self.config.operator.clone());
        map.insert(tags::timestamp_key(env), iso_timestamp());
        if let DeployMode::Rollback { reason } = &record.mode {
            map.insert(tags::reason_key(env), reason.clone());
        }
        map
    }

    fn publish_description(&self, record: &DeploymentRecord) -> String {
        let digest = record
            .artifact
            .as_ref()
            .map_or_else(|| "unknown".to_string(), |a| a.sha256.clone());
        let base = format!(
            "{mode} {function} {env} version={version} sha256={digest} by={operator} at={ts}",
            mode = record.mode.as_str(),
            function = record.function,
            env = record.environment,
            version = record.version,
            operator = self.config.operator,
            ts = iso_timestamp(),
        );
        match &record.mode {
            DeployMode::Rollback { reason } => format!("{base} reason={reason}"),
            DeployMode::Deploy => base,
        }
    }

    async fn current_tagged_version(&self) -> Option<String> {
        let tags_map = self
            .service
            .get_tags(&self.config.function_name)
            .await
            .ok()?;
        tags_map.get(&tags::version_key(&self.policy.name)).cloned()
    }

    fn check_cancelled(&self, stage: &'static str) -> Result<(), DeployError> {
        if self.cancel.is_cancelled() {
            return Err(DeployError::Cancelled {
                stage,
                reason: self
                    .cancel
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string()),
            });
        }
        Ok(())
    }

    async fn finish(
        &self,
        mut record: DeploymentRecord,
        started: Instant,
        result: Result<(), DeployError>,
    ) -> Result<DeployOutcome, DeployError> {
        let duration = started.elapsed();
        match result {
            Ok(()) => {
                let outcome = DeployOutcome::from_record(record, duration);
                tracing::info!(
                    run_id = %outcome.record.run_id,
                    status = %outcome.status,
                    duration_ms = duration.as_millis() as u64,
                    "Run finished"
                );
                self.notify(&outcome).await;
                Ok(outcome)
            }
            Err(err) => {
                tracing::error!(
                    run_id = %record.run_id,
                    stage = %record.stage,
                    error = %err,
                    "Run failed"
                );
                record.transition(DeployStage::Failed);
                let outcome = DeployOutcome {
                    record,
                    status: OutcomeStatus::Failed,
                    duration,
                };
                self.notify(&outcome).await;
                Err(err)
            }
        }
    }

    async fn notify(&self, outcome: &DeployOutcome) {
        if let Some(notifier) = &self.notifier {
            notifier
                .notify(&DeploymentNotice::from_outcome(outcome))
                .await;
        }
    }
}
