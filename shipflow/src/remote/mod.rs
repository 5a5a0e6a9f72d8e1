//! Seam to the function execution service.
//!
//! The orchestrator treats the remote function as externally owned:
//! state is read-only and refreshed by polling, and other agents may
//! mutate the function concurrently.

use crate::errors::RemoteError;
use crate::store::ArtifactLocation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle state of the remote function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum LifecycleState {
    /// Provisioning in progress.
    Pending,
    /// Ready to serve.
    Active,
    /// The function is broken.
    Failed,
}

/// Status of the most recent code/configuration update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum LastUpdateStatus {
    /// Update still being applied.
    InProgress,
    /// Update applied successfully.
    Successful,
    /// Update definitively failed.
    Failed,
}

/// Polled view of the remote function. Read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFunctionState {
    /// Current lifecycle state.
    pub lifecycle: LifecycleState,
    /// Status of the last update.
    pub last_update: LastUpdateStatus,
}

impl RemoteFunctionState {
    /// Whether the function is ready for the next mutation.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.lifecycle == LifecycleState::Active
            && self.last_update == LastUpdateStatus::Successful
    }
}

/// Identifier of an immutable published remote version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteVersionId(pub String);

impl fmt::Display for RemoteVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw result of a synchronous invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    /// Error signal from the payload envelope, if the function errored.
    pub function_error: Option<String>,
    /// The response payload (a structured envelope on success).
    pub payload: serde_json::Value,
}

/// Seam to the function execution service.
///
/// `update_code` and `publish_version` are the only non-idempotent,
/// order-sensitive calls; everything else may be repeated safely.
#[async_trait]
pub trait FunctionService: Send + Sync {
    /// Reads the function's current state.
    async fn get_state(&self, function: &str) -> Result<RemoteFunctionState, RemoteError>;

    /// Points the function's code at an uploaded artifact.
    async fn update_code(
        &self,
        function: &str,
        artifact: &ArtifactLocation,
    ) -> Result<(), RemoteError>;

    /// Creates an immutable version snapshot with a description.
    async fn publish_version(
        &self,
        function: &str,
        description: &str,
    ) -> Result<RemoteVersionId, RemoteError>;

    /// Creates an alias pointing at a published version.
    async fn create_alias(
        &self,
        function: &str,
        alias: &str,
        version_id: &RemoteVersionId,
    ) -> Result<(), RemoteError>;

    /// Deletes an alias. Missing aliases come back as `NotFound`.
    async fn delete_alias(&self, function: &str, alias: &str) -> Result<(), RemoteError>;

    /// Attaches audit tags to the function resource.
    async fn tag_resource(
        &self,
        function: &str,
        tags: HashMap<String, String>,
    ) -> Result<(), RemoteError>;

    /// Reads back the function's current tags.
    async fn get_tags(&self, function: &str) -> Result<HashMap<String, String>, RemoteError>;

    /// Invokes the function synchronously with a JSON payload.
    async fn invoke(
        &self,
        function: &str,
        payload: serde_json::Value,
    ) -> Result<InvokeResponse, RemoteError>;
}
