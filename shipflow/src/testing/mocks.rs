//! Scriptable mock of the function execution service.

use crate::errors::RemoteError;
use crate::remote::{
    FunctionService, InvokeResponse, LastUpdateStatus, LifecycleState, RemoteFunctionState,
    RemoteVersionId,
};
use crate::store::ArtifactLocation;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
struct MockState {
    state_sequence: VecDeque<Result<RemoteFunctionState, RemoteError>>,
    steady_state: Option<RemoteFunctionState>,
    update_code_errors: VecDeque<RemoteError>,
    publish_errors: VecDeque<RemoteError>,
    create_alias_errors: VecDeque<RemoteError>,
    invoke_response: Option<InvokeResponse>,
    tags: HashMap<String, String>,
    aliases: HashMap<String, RemoteVersionId>,
    publish_descriptions: Vec<String>,
    update_code_calls: usize,
    invoke_calls: usize,
    published: u64,
    last_artifact: Option<ArtifactLocation>,
}

/// In-process [`FunctionService`] with scriptable failures.
///
/// Every call succeeds by default; queued errors are consumed in FIFO
/// order, one per call, before the default behavior resumes. State
/// probes walk a queued sequence first, then report the steady state
/// (ready unless overridden).
#[derive(Default)]
pub struct MockFunctionService {
    state: Mutex<MockState>,
}

impl MockFunctionService {
    /// Creates a mock that answers every call successfully.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a tag, as a previous deploy's tagging stage would have.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.lock().tags.insert(key.into(), value.into());
    }

    /// Queues one state probe result.
    pub fn queue_state(&self, state: RemoteFunctionState) {
        self.state.lock().state_sequence.push_back(Ok(state));
    }

    /// Queues one state probe failure.
    pub fn queue_state_error(&self, error: RemoteError) {
        self.state.lock().state_sequence.push_back(Err(error));
    }

    /// Sets the state reported once the queued sequence is exhausted.
    pub fn set_steady_state(&self, state: RemoteFunctionState) {
        self.state.lock().steady_state = Some(state);
    }

    /// Queues one `update_code` failure.
    pub fn queue_update_code_error(&self, error: RemoteError) {
        self.state.lock().update_code_errors.push_back(error);
    }

    /// Queues one `publish_version` failure.
    pub fn queue_publish_error(&self, error: RemoteError) {
        self.state.lock().publish_errors.push_back(error);
    }

    /// Queues one `create_alias` failure.
    pub fn queue_create_alias_error(&self, error: RemoteError) {
        self.state.lock().create_alias_errors.push_back(error);
    }

    /// Sets the response returned by `invoke`.
    pub fn set_invoke_response(&self, response: InvokeResponse) {
        self.state.lock().invoke_response = Some(response);
    }

    /// Number of `update_code` calls observed, including failed ones.
    #[must_use]
    pub fn update_code_calls(&self) -> usize {
        self.state.lock().update_code_calls
    }

    /// Number of `invoke` calls observed.
    #[must_use]
    pub fn invoke_calls(&self) -> usize {
        self.state.lock().invoke_calls
    }

    /// Descriptions passed to successful `publish_version` calls.
    #[must_use]
    pub fn publish_descriptions(&self) -> Vec<String> {
        self.state.lock().publish_descriptions.clone()
    }

    /// Current alias map.
    #[must_use]
    pub fn aliases(&self) -> HashMap<String, RemoteVersionId> {
        self.state.lock().aliases.clone()
    }

    /// Current tag map.
    #[must_use]
    pub fn tags(&self) -> HashMap<String, String> {
        self.state.lock().tags.clone()
    }

    /// The artifact from the most recent successful `update_code`.
    #[must_use]
    pub fn last_artifact(&self) -> Option<ArtifactLocation> {
        self.state.lock().last_artifact.clone()
    }

    fn ready_state() -> RemoteFunctionState {
        RemoteFunctionState {
            lifecycle: LifecycleState::Active,
            last_update: LastUpdateStatus::Successful,
        }
    }

    fn default_invoke_response() -> InvokeResponse {
        InvokeResponse {
            function_error: None,
            payload: serde_json::json!({ "statusCode": 200, "body": "ok" }),
        }
    }
}

#[async_trait]
impl FunctionService for MockFunctionService {
    async fn get_state(&self, _function: &str) -> Result<RemoteFunctionState, RemoteError> {
        let mut state = self.state.lock();
        if let Some(next) = state.state_sequence.pop_front() {
            return next;
        }
        Ok(state.steady_state.unwrap_or_else(Self::ready_state))
    }

    async fn update_code(
        &self,
        _function: &str,
        artifact: &ArtifactLocation,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.update_code_calls += 1;
        if let Some(error) = state.update_code_errors.pop_front() {
            return Err(error);
        }
        state.last_artifact = Some(artifact.clone());
        Ok(())
    }

    async fn publish_version(
        &self,
        _function: &str,
        description: &str,
    ) -> Result<RemoteVersionId, RemoteError> {
        let mut state = self.state.lock();
        if let Some(error) = state.publish_errors.pop_front() {
            return Err(error);
        }
        state.published += 1;
        state.publish_descriptions.push(description.to_string());
        Ok(RemoteVersionId(state.published.to_string()))
    }

    async fn create_alias(
        &self,
        _function: &str,
        alias: &str,
        version_id: &RemoteVersionId,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        if let Some(error) = state.create_alias_errors.pop_front() {
            return Err(error);
        }
        state.aliases.insert(alias.to_string(), version_id.clone());
        Ok(())
    }

    async fn delete_alias(&self, _function: &str, alias: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        match state.aliases.remove(alias) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(alias.to_string())),
        }
    }

    async fn tag_resource(
        &self,
        _function: &str,
        tags: HashMap<String, String>,
    ) -> Result<(), RemoteError> {
        self.state.lock().tags.extend(tags);
        Ok(())
    }

    async fn get_tags(&self, _function: &str) -> Result<HashMap<String, String>, RemoteError> {
        Ok(self.state.lock().tags.clone())
    }

    async fn invoke(
        &self,
        _function: &str,
        _payload: serde_json::Value,
    ) -> Result<InvokeResponse, RemoteError> {
        let mut state = self.state.lock();
        state.invoke_calls += 1;
        Ok(state
            .invoke_response
            .clone()
            .unwrap_or_else(Self::default_invoke_response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_errors_drain_in_order() {
        let mock = MockFunctionService::new();
        mock.queue_update_code_error(RemoteError::Busy("update in progress".into()));

        let artifact = ArtifactLocation {
            bucket: "b".into(),
            key: "fn/prod/1.0.0.zip".into(),
            identifier: "1.0.0".into(),
            sha256: "00".into(),
            size: 1,
        };

        assert!(mock.update_code("fn", &artifact).await.is_err());
        assert!(mock.update_code("fn", &artifact).await.is_ok());
        assert_eq!(mock.update_code_calls(), 2);
        assert_eq!(mock.last_artifact().unwrap().identifier, "1.0.0");
    }

    #[tokio::test]
    async fn test_delete_missing_alias_is_not_found() {
        let mock = MockFunctionService::new();
        assert!(matches!(
            mock.delete_alias("fn", "checkout-current").await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_version_ids_are_sequential() {
        let mock = MockFunctionService::new();
        let first = mock.publish_version("fn", "a").await.unwrap();
        let second = mock.publish_version("fn", "b").await.unwrap();
        assert_eq!(first.0, "1");
        assert_eq!(second.0, "2");
        assert_eq!(mock.publish_descriptions(), vec!["a", "b"]);
    }
}
