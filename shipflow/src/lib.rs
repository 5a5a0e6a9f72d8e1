//! # Shipflow
//!
//! A deployment orchestration engine for versioned serverless functions.
//!
//! Shipflow drives a function deployment end to end with support for:
//!
//! - **Version resolution**: Explicit versions, project manifests and
//!   source-control fallbacks
//! - **Environment policy**: Per-environment conflict handling and
//!   artifact key strategies
//! - **Staged execution**: Upload, code update, readiness wait, version
//!   publish, alias switch and audit tagging as discrete stages
//! - **Retry and health validation**: Predicate-gated retries for
//!   transient remote errors and advisory post-deploy checks
//! - **Rollback**: Explicit or automatic redeployment of a previously
//!   stored version
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipflow::prelude::*;
//!
//! // Resolve configuration and collaborators
//! let config = DeployConfig::from_json_file(Path::new("deploy.json"))?;
//! let store = ArtifactStore::new(object_store, &config.bucket, &config.function_name);
//!
//! // Run a deploy
//! let orchestrator = Orchestrator::new(service, store, config)?;
//! let outcome = orchestrator.deploy(artifact_bytes, &version).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod conflict;
pub mod deploy;
pub mod environment;
pub mod errors;
pub mod health;
pub mod notify;
pub mod observability;
pub mod remote;
pub mod retry;
pub mod rollback;
pub mod store;
pub mod testing;
pub mod utils;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::DeployConfig;
    pub use crate::deploy::{
        DeployMode, DeployOutcome, DeployStage, DeploymentRecord, Orchestrator, OutcomeStatus,
        RecoveredOutcome,
    };
    pub use crate::environment::{
        policy_for, ConflictPolicy, Environment, EnvironmentPolicy, PathStrategy,
    };
    pub use crate::errors::{
        ConfigurationError, ConflictError, DeployError, FailureKind, RemoteError,
        RollbackTargetError, StoreError,
    };
    pub use crate::health::{HealthCheckConfig, HealthReport};
    pub use crate::notify::{DeploymentNotice, Notifier, TracingNotifier};
    pub use crate::remote::{
        FunctionService, InvokeResponse, LastUpdateStatus, LifecycleState, RemoteFunctionState,
        RemoteVersionId,
    };
    pub use crate::retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
    pub use crate::rollback::{RollbackConfig, RollbackStrategy};
    pub use crate::store::{ArtifactLocation, ArtifactStore, MemoryObjectStore, ObjectStore};
    pub use crate::version::{ResolvedVersion, VersionSource};
}
